//! Banded magnitude spectrum of the ring buffer's trailing window.
//!
//! Bands group FFT bins linearly: band `b` averages the power of bins
//! `[b * w, (b + 1) * w)` where `w = (fft_size / 2) / bands`. Bins past
//! `bands * w` are ignored. Linear grouping puts most of the display in the
//! top octaves; it is kept for parity with existing displays.

use std::fmt;
use std::str::FromStr;

use deepeye_core::{RingBuffer, RingError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fft::{PowerSpectrum, Window};

/// Which ring channel(s) feed the analyzer.
///
/// Parses from and serializes to `"downmix"` or a channel index such as `"0"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChannelSelect {
    /// A single channel by index
    Channel(usize),
    /// Average of all channels
    Downmix,
}

impl Default for ChannelSelect {
    fn default() -> Self {
        ChannelSelect::Channel(0)
    }
}

impl FromStr for ChannelSelect {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("downmix") || s.eq_ignore_ascii_case("mix") {
            return Ok(ChannelSelect::Downmix);
        }
        s.parse()
            .map(ChannelSelect::Channel)
            .map_err(|_| AnalysisError::InvalidChannel(s.to_owned()))
    }
}

impl TryFrom<String> for ChannelSelect {
    type Error = AnalysisError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ChannelSelect> for String {
    fn from(c: ChannelSelect) -> Self {
        c.to_string()
    }
}

impl fmt::Display for ChannelSelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelSelect::Channel(n) => write!(f, "{n}"),
            ChannelSelect::Downmix => f.write_str("downmix"),
        }
    }
}

/// Analyzer settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// FFT length in samples (power of two)
    pub fft_size: usize,
    /// Number of display bands
    pub bands: usize,
    /// dB value mapped to display 0 (0 dB maps to 1)
    pub floor_db: f32,
    /// Added to band power before the log
    pub epsilon: f32,
    /// Analysis window
    pub window: Window,
    /// Ring channel selection
    pub channel: ChannelSelect,
    /// Worker period in seconds
    pub tick_seconds: f32,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            bands: 64,
            floor_db: -50.0,
            epsilon: 1e-9,
            window: Window::Blackman,
            channel: ChannelSelect::Channel(0),
            tick_seconds: 0.033,
        }
    }
}

impl SpectrumConfig {
    /// Check the settings the analyzer depends on.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.fft_size < 64 || !self.fft_size.is_power_of_two() {
            return Err(AnalysisError::InvalidFftSize(self.fft_size));
        }
        if self.bands == 0 || self.bands > self.fft_size / 2 {
            return Err(AnalysisError::InvalidBandCount {
                bands: self.bands,
                bins: self.fft_size / 2,
            });
        }
        if self.floor_db.is_nan() || self.floor_db >= 0.0 {
            return Err(AnalysisError::InvalidFloor(self.floor_db));
        }
        if self.epsilon.is_nan() || self.epsilon <= 0.0 {
            return Err(AnalysisError::InvalidEpsilon(self.epsilon));
        }
        if self.tick_seconds.is_nan() || self.tick_seconds <= 0.0 {
            return Err(AnalysisError::InvalidTick(self.tick_seconds));
        }
        Ok(())
    }
}

/// Errors from analyzer construction and worker startup.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// FFT size is not a power of two of at least 64.
    #[error("fft size must be a power of two >= 64, got {0}")]
    InvalidFftSize(usize),

    /// Band count outside `1..=fft_size/2`.
    #[error("band count {bands} outside 1..={bins}")]
    InvalidBandCount {
        /// Requested bands
        bands: usize,
        /// Available bins
        bins: usize,
    },

    /// Floor must be below 0 dB.
    #[error("floor must be below 0 dB, got {0}")]
    InvalidFloor(f32),

    /// Epsilon must be positive.
    #[error("epsilon must be positive, got {0}")]
    InvalidEpsilon(f32),

    /// Tick period must be positive.
    #[error("tick period must be positive, got {0}s")]
    InvalidTick(f32),

    /// Channel selection is neither an index nor `downmix`.
    #[error("invalid channel selection '{0}' (expected an index or 'downmix')")]
    InvalidChannel(String),

    /// Worker thread could not be spawned.
    #[error("failed to spawn analysis worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// One published analysis result.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    /// Display values in `[0, 1]`, one per band
    pub bands: Vec<f32>,
    /// Ring time (exclusive end) of the analyzed window
    pub sample_time: i64,
}

impl SpectrumFrame {
    /// All-zero frame used before the first tick.
    pub fn silent(bands: usize) -> Self {
        Self {
            bands: vec![0.0; bands],
            sample_time: 0,
        }
    }
}

/// Windowed FFT to banded display values.
///
/// All working buffers are allocated in [`new`](Self::new).
#[derive(Debug)]
pub struct SpectrumAnalyzer {
    config: SpectrumConfig,
    spectrum: PowerSpectrum,
    samples: Vec<f32>,
    power: Vec<f32>,
    bins_per_band: usize,
}

impl SpectrumAnalyzer {
    /// Build an analyzer, validating `config`.
    pub fn new(config: SpectrumConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self {
            spectrum: PowerSpectrum::new(config.fft_size, config.window),
            samples: vec![0.0; config.fft_size],
            power: vec![0.0; config.fft_size / 2],
            bins_per_band: (config.fft_size / 2) / config.bands,
            config,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &SpectrumConfig {
        &self.config
    }

    /// Run the pipeline on `samples` (zero-padded or truncated to the FFT
    /// size) and return one display value per band.
    pub fn analyze_window(&mut self, samples: &[f32]) -> Vec<f32> {
        let n = self.config.fft_size;
        let samples = &samples[..samples.len().min(n)];
        self.spectrum.power(samples, &mut self.power);
        self.bands_from_power()
    }

    /// Analyze the window ending at the ring's newest sample.
    ///
    /// `None` when nothing has been written yet, when the window would start
    /// before time 0, or when the read fails (evicted or overwritten while
    /// copying).
    pub fn tick(&mut self, ring: &RingBuffer) -> Option<SpectrumFrame> {
        let end = ring.last_sample_time()?;
        if end <= 0 {
            return None;
        }
        let start = end - self.config.fft_size as i64;
        if start < 0 {
            return None;
        }

        self.read_window(ring, start, end).ok()?;
        self.spectrum.power(&self.samples, &mut self.power);
        Some(SpectrumFrame {
            bands: self.bands_from_power(),
            sample_time: end,
        })
    }

    fn read_window(&mut self, ring: &RingBuffer, start: i64, end: i64) -> Result<(), RingError> {
        match self.config.channel {
            ChannelSelect::Channel(ch) => ring.read_channel(ch, start, end, &mut self.samples),
            ChannelSelect::Downmix => ring.read_downmix(start, end, &mut self.samples),
        }
    }

    fn bands_from_power(&self) -> Vec<f32> {
        let floor = self.config.floor_db;
        let eps = self.config.epsilon;
        let w = self.bins_per_band;
        self.power
            .chunks_exact(w)
            .take(self.config.bands)
            .map(|bins| {
                let avg = bins.iter().sum::<f32>() / w as f32;
                let db = 10.0 * (avg + eps).log10();
                ((db - floor) / -floor).clamp(0.0, 1.0)
            })
            .collect()
    }
}
