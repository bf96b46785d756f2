//! cpal-based capture backend.
//!
//! Covers ALSA (Linux), CoreAudio (macOS) and WASAPI (Windows).

use crate::backend::{AudioBackend, BackendStreamConfig, ErrorCallback, InputCallback, StreamHandle};
use crate::devices::{device_name, find_input_device, list_on};
use crate::{AudioDevice, Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Host, HostId};

/// cpal capture backend on one host API.
///
/// Stores the host id rather than the host so the backend can be shared
/// across threads; the host is reopened per call.
#[derive(Debug, Clone, Copy)]
pub struct CpalBackend {
    host_id: HostId,
}

impl CpalBackend {
    /// Use the platform's default audio host.
    pub fn new() -> Self {
        let host_id = cpal::default_host().id();
        tracing::info!(host = host_id.name(), "cpal backend initialized");
        Self { host_id }
    }

    fn host(&self) -> Result<Host> {
        cpal::host_from_id(self.host_id).map_err(|e| Error::Stream(e.to_string()))
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn list_devices(&self) -> Result<Vec<AudioDevice>> {
        list_on(&self.host()?)
    }

    fn default_input_device(&self) -> Result<Option<AudioDevice>> {
        let devices = self.list_devices()?;
        Ok(devices.into_iter().find(|d| d.is_default))
    }

    fn resolve_input(&self, device: Option<&str>, buffer_size: u32) -> Result<BackendStreamConfig> {
        let host = self.host()?;
        let device = find_input_device(&host, device)?;
        let name = device_name(&device).map_err(|e| Error::Stream(e.to_string()))?;
        let native = device
            .default_input_config()
            .map_err(|e| Error::Stream(e.to_string()))?;
        Ok(BackendStreamConfig {
            sample_rate: native.sample_rate(),
            buffer_size,
            channels: native.channels(),
            device_name: Some(name),
        })
    }

    fn build_input_stream(
        &self,
        config: &BackendStreamConfig,
        mut callback: InputCallback,
        mut error_callback: ErrorCallback,
    ) -> Result<StreamHandle> {
        let host = self.host()?;
        let device = find_input_device(&host, config.device_name.as_deref())?;

        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: config.sample_rate,
            buffer_size: cpal::BufferSize::Fixed(config.buffer_size),
        };

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    callback(data);
                },
                move |err| {
                    error_callback(&err.to_string());
                },
                None,
            )
            .map_err(|e| Error::Stream(e.to_string()))?;

        stream.play().map_err(|e| Error::Stream(e.to_string()))?;
        tracing::info!(
            device = config.device_name.as_deref().unwrap_or("default"),
            channels = config.channels,
            sample_rate = config.sample_rate,
            buffer_frames = config.buffer_size,
            "input stream started"
        );

        Ok(StreamHandle::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_name() {
        assert_eq!(CpalBackend::new().name(), "cpal");
    }

    #[test]
    fn list_devices_does_not_fail() {
        // Device availability depends on the system.
        assert!(CpalBackend::new().list_devices().is_ok());
    }
}
