//! Capture device discovery via cpal.

use crate::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};

/// Extract device name via `description()` (cpal 0.17+).
pub(crate) fn device_name(device: &Device) -> std::result::Result<String, cpal::DeviceNameError> {
    device.description().map(|d| d.name().to_string())
}

/// Capture device information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    /// Human-readable device name.
    pub name: String,
    /// Default input channel count.
    pub channels: u16,
    /// Default sample rate in Hz.
    pub default_sample_rate: u32,
    /// Whether this is the host's default input.
    pub is_default: bool,
}

fn describe(device: &Device, default_name: Option<&str>) -> Option<AudioDevice> {
    let name = device_name(device).ok()?;
    let (channels, default_sample_rate) = device
        .default_input_config()
        .map(|c| (c.channels(), c.sample_rate()))
        .unwrap_or((2, 48000));
    Some(AudioDevice {
        is_default: default_name == Some(name.as_str()),
        name,
        channels,
        default_sample_rate,
    })
}

/// List capture devices on `host`.
pub(crate) fn list_on(host: &Host) -> Result<Vec<AudioDevice>> {
    let default_name = host.default_input_device().and_then(|d| device_name(&d).ok());
    let devices = host
        .input_devices()
        .map_err(|e| Error::Stream(e.to_string()))?;
    Ok(devices
        .filter_map(|d| describe(&d, default_name.as_deref()))
        .collect())
}

/// List all capture devices on the default host.
pub fn list_input_devices() -> Result<Vec<AudioDevice>> {
    list_on(&cpal::default_host())
}

/// The default host's default capture device, if any.
pub fn default_input_device() -> Result<Option<AudioDevice>> {
    let host = cpal::default_host();
    Ok(host.default_input_device().and_then(|d| {
        let name = device_name(&d).ok();
        describe(&d, name.as_deref())
    }))
}

/// Find an input device by index, exact name, or partial name, or return
/// the host default when `name_or_index` is `None`.
///
/// Partial matches are case-insensitive; with several matches the first
/// one wins.
pub(crate) fn find_input_device(host: &Host, name_or_index: Option<&str>) -> Result<Device> {
    let Some(search) = name_or_index else {
        return host.default_input_device().ok_or(Error::NoDevice);
    };
    let devices: Vec<_> = host
        .input_devices()
        .map_err(|e| Error::Stream(e.to_string()))?
        .collect();

    if let Ok(index) = search.parse::<usize>() {
        return devices.get(index).cloned().ok_or_else(|| {
            Error::DeviceNotFound(format!(
                "input device index {} (only {} devices available)",
                index,
                devices.len()
            ))
        });
    }

    if let Some(device) = devices
        .iter()
        .find(|d| device_name(d).is_ok_and(|n| n == search))
    {
        return Ok(device.clone());
    }

    let search_lower = search.to_lowercase();
    let matches: Vec<_> = devices
        .iter()
        .filter_map(|d| {
            device_name(d)
                .ok()
                .filter(|name| name.to_lowercase().contains(&search_lower))
                .map(|name| (d, name))
        })
        .collect();

    match matches.as_slice() {
        [] => Err(Error::DeviceNotFound(format!(
            "no input device matching '{}'",
            search
        ))),
        [(device, _)] => Ok((*device).clone()),
        [(device, first), ..] => {
            let names: Vec<_> = matches.iter().map(|(_, n)| n.as_str()).collect();
            tracing::warn!(search, ?names, chosen = %first, "ambiguous input device name");
            Ok((*device).clone())
        }
    }
}
