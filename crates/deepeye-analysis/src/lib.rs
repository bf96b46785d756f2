//! DeepEye Analysis - the visualizer's view of the signal path
//!
//! Consumers of the engine's [`RingBuffer`](deepeye_core::RingBuffer) that
//! run off the render thread:
//!
//! - [`fft`] - windowed power spectrum on a preplanned FFT
//! - [`spectrum`] - banded display frames from the ring's trailing window
//! - [`monitor`] - periodic worker publishing frames atomically
//! - [`level`] - average-power meter usable as a sidechain level source
//!
//! ## Example
//!
//! ```rust
//! use deepeye_analysis::{SpectrumAnalyzer, SpectrumConfig};
//! use deepeye_core::RingBuffer;
//!
//! let ring = RingBuffer::new(2, 8192);
//! let tone: Vec<f32> = (0..4096).map(|i| (i as f32 * 0.3).sin()).collect();
//! ring.write(&[tone.clone(), tone], 0, 4096).unwrap();
//!
//! let mut analyzer = SpectrumAnalyzer::new(SpectrumConfig::default()).unwrap();
//! let frame = analyzer.tick(&ring).unwrap();
//! assert_eq!(frame.bands.len(), 64);
//! assert!(frame.bands.iter().all(|b| (0.0..=1.0).contains(b)));
//! ```

pub mod fft;
pub mod level;
pub mod monitor;
pub mod spectrum;

pub use fft::{PowerSpectrum, Window};
pub use level::{DEFAULT_MAX_FRAMES, RingLevelMeter};
pub use monitor::{FrameSlot, SpectrumMonitor};
pub use spectrum::{AnalysisError, ChannelSelect, SpectrumAnalyzer, SpectrumConfig, SpectrumFrame};
