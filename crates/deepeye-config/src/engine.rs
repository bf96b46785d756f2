//! The engine configuration file.

use std::path::Path;

use deepeye_analysis::{ChannelSelect, SpectrumConfig, Window};
use deepeye_core::{EQ_MAX_DB, EQ_MIN_DB, SidechainConfig};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, FileOp};

/// Everything the engine needs to start, grouped by concern.
///
/// Every section and field is optional in the file; missing values take
/// their defaults.
///
/// # TOML Format
///
/// ```toml
/// [audio]
/// sample_rate = 48000
/// channels = 2
/// buffer_frames = 512
/// ring_multiplier = 2048
/// input_device = "USB Audio"
///
/// [analysis]
/// fft_size = 2048
/// bands = 64
/// floor_db = -50.0
/// window = "blackman"
/// channel = "0"
/// tick_ms = 33
///
/// [sidechain]
/// enabled = true
/// threshold_db = -20.0
/// reduction_db = -12.0
/// attack_seconds = 0.1
/// release_seconds = 1.0
/// tick_ms = 50
/// device = "Mic"
///
/// [controls]
/// filter_knob = 0.5
/// bass_db = 0.0
/// mid_db = 0.0
/// treble_db = 0.0
/// limiter_enabled = true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Device and buffering settings.
    pub audio: AudioSection,
    /// Spectrum analyzer settings.
    pub analysis: AnalysisSection,
    /// Sidechain ducking settings.
    pub sidechain: SidechainSection,
    /// Initial control positions.
    pub controls: ControlsSection,
}

/// `[audio]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSection {
    /// Requested device sample rate in Hz.
    pub sample_rate: u32,
    /// Channels carried through the chain and stored in the ring.
    pub channels: u16,
    /// Requested device buffer size in frames.
    pub buffer_frames: u32,
    /// Ring capacity as a multiple of `buffer_frames`.
    pub ring_multiplier: u32,
    /// Input device name; `None` uses the system default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_device: Option<String>,
}

impl Default for AudioSection {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            buffer_frames: 512,
            ring_multiplier: 2048,
            input_device: None,
        }
    }
}

/// `[analysis]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSection {
    /// FFT length (power of two).
    pub fft_size: usize,
    /// Display bands.
    pub bands: usize,
    /// dB value mapped to display 0.
    pub floor_db: f32,
    /// Analysis window.
    pub window: Window,
    /// Ring channel or `"downmix"`.
    pub channel: ChannelSelect,
    /// Analyzer tick period in milliseconds.
    pub tick_ms: u32,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        let spectrum = SpectrumConfig::default();
        Self {
            fft_size: spectrum.fft_size,
            bands: spectrum.bands,
            floor_db: spectrum.floor_db,
            window: spectrum.window,
            channel: spectrum.channel,
            tick_ms: (spectrum.tick_seconds * 1000.0).round() as u32,
        }
    }
}

/// `[sidechain]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SidechainSection {
    /// Start ducking at engine start.
    pub enabled: bool,
    /// Level above which ducking engages, in dBFS.
    pub threshold_db: f32,
    /// Gain while ducked, in dB.
    pub reduction_db: f32,
    /// Attack time constant, in seconds.
    pub attack_seconds: f32,
    /// Release time constant, in seconds.
    pub release_seconds: f32,
    /// Control tick period in milliseconds.
    pub tick_ms: u32,
    /// Device metered for ducking; `None` meters the default input device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl Default for SidechainSection {
    fn default() -> Self {
        let sc = SidechainConfig::default();
        Self {
            enabled: sc.enabled,
            threshold_db: sc.threshold_db,
            reduction_db: sc.reduction_db,
            attack_seconds: sc.attack_seconds,
            release_seconds: sc.release_seconds,
            tick_ms: 50,
            device: None,
        }
    }
}

/// `[controls]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsSection {
    /// DJ filter knob, `0.5` is bypass.
    pub filter_knob: f32,
    /// Bass shelf gain in dB.
    pub bass_db: f32,
    /// Mid peak gain in dB.
    pub mid_db: f32,
    /// Treble shelf gain in dB.
    pub treble_db: f32,
    /// Brickwall limiter active.
    pub limiter_enabled: bool,
}

impl Default for ControlsSection {
    fn default() -> Self {
        Self {
            filter_knob: 0.5,
            bass_db: 0.0,
            mid_db: 0.0,
            treble_db: 0.0,
            limiter_enabled: true,
        }
    }
}

impl EngineConfig {
    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::file(FileOp::Read, path, e))?;
        Self::from_toml_str(&content)
    }

    /// Load `path` if it exists, otherwise return the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate a TOML string.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the config to `path`, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::file(FileOp::CreateDir, parent, e))?;
        }
        let content = self.to_toml_string()?;
        std::fs::write(path, content).map_err(|e| ConfigError::file(FileOp::Write, path, e))
    }

    /// Check every field against the ranges the engine accepts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let audio = &self.audio;
        if !(8000..=192_000).contains(&audio.sample_rate) {
            return Err(ConfigError::invalid(
                "audio.sample_rate",
                format!("{} Hz outside 8000..=192000", audio.sample_rate),
            ));
        }
        if !(1..=8).contains(&audio.channels) {
            return Err(ConfigError::invalid(
                "audio.channels",
                format!("{} outside 1..=8", audio.channels),
            ));
        }
        if !(16..=8192).contains(&audio.buffer_frames) {
            return Err(ConfigError::invalid(
                "audio.buffer_frames",
                format!("{} outside 16..=8192", audio.buffer_frames),
            ));
        }
        if audio.ring_multiplier < 2 {
            return Err(ConfigError::invalid(
                "audio.ring_multiplier",
                "must be at least 2",
            ));
        }

        self.spectrum_config()
            .validate()
            .map_err(|e| ConfigError::invalid("analysis", e.to_string()))?;
        if self.ring_capacity() < self.analysis.fft_size {
            return Err(ConfigError::invalid(
                "audio.ring_multiplier",
                format!(
                    "ring of {} frames cannot hold a {}-point analysis window",
                    self.ring_capacity(),
                    self.analysis.fft_size
                ),
            ));
        }
        if let ChannelSelect::Channel(ch) = self.analysis.channel
            && ch >= usize::from(audio.channels)
        {
            return Err(ConfigError::invalid(
                "analysis.channel",
                format!("channel {ch} but only {} configured", audio.channels),
            ));
        }

        let sc = &self.sidechain;
        if !sc.threshold_db.is_finite() {
            return Err(ConfigError::invalid("sidechain.threshold_db", "must be finite"));
        }
        if !sc.reduction_db.is_finite() || sc.reduction_db > 0.0 {
            return Err(ConfigError::invalid(
                "sidechain.reduction_db",
                "must be a finite cut (<= 0 dB)",
            ));
        }
        for (field, value) in [
            ("sidechain.attack_seconds", sc.attack_seconds),
            ("sidechain.release_seconds", sc.release_seconds),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(field, "must be a non-negative time"));
            }
        }
        if sc.tick_ms == 0 {
            return Err(ConfigError::invalid("sidechain.tick_ms", "must be positive"));
        }

        let controls = &self.controls;
        if !(0.0..=1.0).contains(&controls.filter_knob) {
            return Err(ConfigError::invalid(
                "controls.filter_knob",
                format!("{} outside 0..=1", controls.filter_knob),
            ));
        }
        for (field, value) in [
            ("controls.bass_db", controls.bass_db),
            ("controls.mid_db", controls.mid_db),
            ("controls.treble_db", controls.treble_db),
        ] {
            if !(EQ_MIN_DB..=EQ_MAX_DB).contains(&value) {
                return Err(ConfigError::invalid(
                    field,
                    format!("{value} dB outside {EQ_MIN_DB}..={EQ_MAX_DB}"),
                ));
            }
        }
        Ok(())
    }

    /// Ring capacity in frames per channel.
    pub fn ring_capacity(&self) -> usize {
        self.audio.buffer_frames as usize * self.audio.ring_multiplier as usize
    }

    /// Analyzer settings derived from `[analysis]`.
    pub fn spectrum_config(&self) -> SpectrumConfig {
        let a = &self.analysis;
        SpectrumConfig {
            fft_size: a.fft_size,
            bands: a.bands,
            floor_db: a.floor_db,
            window: a.window,
            channel: a.channel,
            tick_seconds: a.tick_ms as f32 / 1000.0,
            ..SpectrumConfig::default()
        }
    }

    /// Ducking settings derived from `[sidechain]`.
    pub fn sidechain_config(&self) -> SidechainConfig {
        let s = &self.sidechain;
        SidechainConfig {
            enabled: s.enabled,
            threshold_db: s.threshold_db,
            reduction_db: s.reduction_db,
            attack_seconds: s.attack_seconds,
            release_seconds: s.release_seconds,
        }
    }

    /// Sidechain tick period in seconds.
    pub fn sidechain_tick_seconds(&self) -> f32 {
        self.sidechain.tick_ms as f32 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.ring_capacity(), 512 * 2048);
        assert_eq!(config.spectrum_config(), SpectrumConfig::default());
        assert_eq!(config.sidechain_config(), SidechainConfig::default());
        assert_eq!(config.sidechain_tick_seconds(), 0.05);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_sections_fill_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [analysis]
            bands = 30
            window = "hann"
            channel = "downmix"

            [controls]
            filter_knob = 0.1
            "#,
        )
        .unwrap();
        assert_eq!(config.analysis.bands, 30);
        assert_eq!(config.analysis.window, Window::Hann);
        assert_eq!(config.analysis.channel, ChannelSelect::Downmix);
        assert_eq!(config.analysis.fft_size, 2048);
        assert_eq!(config.controls.filter_knob, 0.1);
        assert!(config.controls.limiter_enabled);
    }

    #[test]
    fn rejects_out_of_range_fields() {
        let cases = [
            ("[audio]\nchannels = 0", "audio.channels"),
            ("[audio]\nbuffer_frames = 4", "audio.buffer_frames"),
            ("[audio]\nbuffer_frames = 64\nring_multiplier = 2", "audio.ring_multiplier"),
            ("[analysis]\nfft_size = 1000", "analysis"),
            ("[analysis]\nchannel = \"2\"", "analysis.channel"),
            ("[sidechain]\nreduction_db = 6.0", "sidechain.reduction_db"),
            ("[sidechain]\ntick_ms = 0", "sidechain.tick_ms"),
            ("[controls]\nfilter_knob = 1.5", "controls.filter_knob"),
            ("[controls]\nbass_db = -40.0", "controls.bass_db"),
        ];
        for (toml, expected) in cases {
            match EngineConfig::from_toml_str(toml) {
                Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected, "{toml}"),
                other => panic!("{toml}: expected Invalid, got {other:?}"),
            }
        }
    }

    #[test]
    fn bad_channel_string_is_a_parse_error() {
        let err = EngineConfig::from_toml_str("[analysis]\nchannel = \"left\"").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }
}
