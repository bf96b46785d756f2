//! Audio I/O and the live engine for deepeye.
//!
//! This crate provides:
//!
//! - **Backends**: the [`AudioBackend`] trait and its cpal implementation
//! - **Capture**: [`DeviceInput`] binds a capture device to the signal graph,
//!   [`CaptureLevelSource`] meters a second device for sidechain ducking
//! - **Export**: [`RingRecorder`] drains the ring into a WAV file, [`read_wav`]
//!   loads files for offline runs
//! - **Engine**: [`Engine`] wires graph, ring, analyzer and sidechain together
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use deepeye_config::EngineConfig;
//! use deepeye_io::Engine;
//!
//! let engine = Engine::start(EngineConfig::default())?;
//! engine.set_filter_knob(0.25);
//! let frame = engine.latest_spectrum();
//! println!("{:?}", frame.bands);
//! ```

pub mod backend;
pub mod cpal_backend;
mod devices;
mod engine;
mod input;
mod wav;

pub use backend::{
    AudioBackend, BackendStreamConfig, ErrorCallback, InputCallback, StreamHandle,
};
pub use cpal_backend::CpalBackend;
pub use devices::{AudioDevice, default_input_device, list_input_devices};
pub use engine::Engine;
pub use input::{CaptureLevelSource, DeviceInput, RenderWiring};
pub use wav::{RingRecorder, WavSpec, read_wav};

/// Error types for audio I/O and engine operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Audio stream setup or runtime error.
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// No audio device available on the system.
    #[error("No audio device available")]
    NoDevice,

    /// The requested audio device was not found.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Topology change rejected by the signal graph.
    #[error(transparent)]
    Graph(#[from] deepeye_core::GraphError),

    /// Spectrum analyzer could not start.
    #[error(transparent)]
    Analysis(#[from] deepeye_analysis::AnalysisError),

    /// Sidechain worker could not start.
    #[error(transparent)]
    Sidechain(#[from] deepeye_core::SidechainError),

    /// Engine configuration rejected.
    #[error(transparent)]
    Config(#[from] deepeye_config::ConfigError),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for audio I/O operations.
pub type Result<T> = std::result::Result<T, Error>;
