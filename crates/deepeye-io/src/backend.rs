//! Pluggable capture backend.
//!
//! The engine only captures: the processed signal feeds the ring buffer and
//! is never played back. [`AudioBackend`] therefore covers device lookup and
//! input streams only. [`CpalBackend`](crate::CpalBackend) is the desktop
//! implementation; tests substitute a backend whose callbacks they drive by
//! hand.
//!
//! Callbacks are boxed closures so the trait stays object-safe, and streams
//! come back as a type-erased [`StreamHandle`] that stops capture on drop.

use crate::{AudioDevice, Result};

/// A concrete capture configuration.
///
/// Passed to [`AudioBackend::resolve_input`] as a request and returned with
/// the device's actual name, rate and channel count filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendStreamConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Preferred buffer size in frames.
    pub buffer_size: u32,
    /// Interleaved channel count delivered to the callback.
    pub channels: u16,
    /// Device name (system default if `None`).
    pub device_name: Option<String>,
}

impl Default for BackendStreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            buffer_size: 512,
            channels: 2,
            device_name: None,
        }
    }
}

/// Type-erased audio stream handle.
///
/// The stream is active while this handle exists; dropping it stops capture.
pub struct StreamHandle {
    _inner: Box<dyn Send>,
}

impl StreamHandle {
    /// Wrap a backend-specific stream object, keeping it alive until drop.
    pub fn new<T: Send + 'static>(stream: T) -> Self {
        Self {
            _inner: Box::new(stream),
        }
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle").finish_non_exhaustive()
    }
}

/// Capture callback: interleaved f32 samples, `[L0, R0, L1, R1, ...]`.
///
/// Runs on the device's real-time thread. Must not allocate, lock, or
/// perform I/O.
pub type InputCallback = Box<dyn FnMut(&[f32]) + Send>;

/// Called with a human-readable message when the stream reports an error.
pub type ErrorCallback = Box<dyn FnMut(&str) + Send>;

/// Platform capture API.
pub trait AudioBackend: Send + Sync {
    /// Human-readable name of this backend (e.g. "cpal").
    fn name(&self) -> &str;

    /// List capture devices.
    fn list_devices(&self) -> Result<Vec<AudioDevice>>;

    /// The default capture device, if any.
    fn default_input_device(&self) -> Result<Option<AudioDevice>>;

    /// Look up `device` (default input if `None`) and return the
    /// configuration a stream on it would use with `buffer_size` frames.
    fn resolve_input(&self, device: Option<&str>, buffer_size: u32) -> Result<BackendStreamConfig>;

    /// Start capturing with `config`. Capture runs until the handle drops.
    fn build_input_stream(
        &self,
        config: &BackendStreamConfig,
        callback: InputCallback,
        error_callback: ErrorCallback,
    ) -> Result<StreamHandle>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = BackendStreamConfig::default();
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.buffer_size, 512);
        assert_eq!(config.channels, 2);
        assert!(config.device_name.is_none());
    }

    #[test]
    fn stream_handle_debug() {
        let handle = StreamHandle::new(42u32);
        assert!(format!("{:?}", handle).contains("StreamHandle"));
    }

    #[test]
    fn stream_handle_drops_inner() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        struct Flag(Arc<AtomicBool>);
        impl Drop for Flag {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let handle = StreamHandle::new(Flag(Arc::clone(&dropped)));
        assert!(!dropped.load(Ordering::SeqCst));
        drop(handle);
        assert!(dropped.load(Ordering::SeqCst));
    }
}
