//! Engine configuration for deepeye.
//!
//! A single TOML file, by default at `<config dir>/deepeye/engine.toml`,
//! sets the device, analyzer, sidechain and initial control positions.
//! Command-line flags override file values.
//!
//! # Example
//!
//! ```rust
//! use deepeye_config::EngineConfig;
//!
//! let config = EngineConfig::from_toml_str(
//!     r#"
//!     [audio]
//!     buffer_frames = 256
//!
//!     [sidechain]
//!     enabled = true
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.ring_capacity(), 256 * 2048);
//! assert!(config.sidechain_config().enabled);
//! ```

mod engine;
mod error;

/// Platform-specific configuration paths.
pub mod paths;

pub use engine::{AnalysisSection, AudioSection, ControlsSection, EngineConfig, SidechainSection};
pub use error::{ConfigError, FileOp};
pub use paths::{CONFIG_FILE_NAME, default_config_path, ensure_user_config_dir, user_config_dir};
