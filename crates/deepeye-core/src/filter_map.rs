//! Single-knob DJ filter: knob position to filter mode and cutoff.
//!
//! ```text
//! 0.0 ──── LowPass ────── 0.48 ─ Bypass ─ 0.52 ───── HighPass ──── 1.0
//! 100 Hz          ~17 kHz                    ~26 Hz           18 kHz
//! ```
//!
//! The mapping is stateless. Bypass is decided from the raw value on every
//! call with no hysteresis, so a knob resting on a deadband edge can flip
//! mode from one update to the next.
//!
//! [`FilterCell`] carries the mapped state from the control thread to the
//! render context in a single atomic word.

use core::sync::atomic::{AtomicU64, Ordering};

use libm::powf;
use serde::{Deserialize, Serialize};

use crate::kernels::bandwidth_to_q;

/// Knob values strictly inside `(DEADBAND_LOW, DEADBAND_HIGH)` bypass the filter.
pub const DEADBAND_LOW: f32 = 0.48;
/// Upper edge of the bypass deadband.
pub const DEADBAND_HIGH: f32 = 0.52;
/// Fixed filter bandwidth in octaves.
pub const BANDWIDTH_OCTAVES: f32 = 2.0;

const LOWPASS_MIN_HZ: f32 = 100.0;
const LOWPASS_MAX_HZ: f32 = 20_000.0;
const HIGHPASS_MIN_HZ: f32 = 20.0;
const HIGHPASS_MAX_HZ: f32 = 18_000.0;

/// Which response the sweep filter runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterMode {
    /// Audio passes unfiltered.
    #[default]
    Bypass,
    /// Second-order low-pass.
    LowPass,
    /// Second-order high-pass.
    HighPass,
}

impl FilterMode {
    fn to_bits(self) -> u8 {
        match self {
            Self::Bypass => 0,
            Self::LowPass => 1,
            Self::HighPass => 2,
        }
    }

    fn from_bits(bits: u8) -> Self {
        match bits {
            1 => Self::LowPass,
            2 => Self::HighPass,
            _ => Self::Bypass,
        }
    }
}

/// Filter settings derived from the knob.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    /// Response type.
    pub mode: FilterMode,
    /// Cutoff in Hz (meaningless when bypassed).
    pub cutoff_hz: f32,
    /// Q of the section.
    pub resonance_q: f32,
}

impl FilterState {
    /// The bypassed state.
    pub fn bypass() -> Self {
        Self {
            mode: FilterMode::Bypass,
            cutoff_hz: 0.0,
            resonance_q: bandwidth_to_q(BANDWIDTH_OCTAVES),
        }
    }
}

impl Default for FilterState {
    fn default() -> Self {
        Self::bypass()
    }
}

/// Map a knob value in `[0, 1]` to a [`FilterState`].
///
/// `resonance` is accepted for interface stability but currently has no
/// effect: the section always runs at a 2-octave bandwidth. Values outside
/// `[0, 1]` are clamped; NaN is treated as centre (bypass).
///
/// # Example
///
/// ```rust
/// use deepeye_core::{FilterMode, map_filter};
///
/// assert_eq!(map_filter(0.5, 0.0).mode, FilterMode::Bypass);
///
/// let low = map_filter(0.0, 0.0);
/// assert_eq!(low.mode, FilterMode::LowPass);
/// assert!((low.cutoff_hz - 100.0).abs() < 0.01);
///
/// let high = map_filter(1.0, 0.0);
/// assert_eq!(high.mode, FilterMode::HighPass);
/// assert!((high.cutoff_hz - 18000.0).abs() < 1.0);
/// ```
pub fn map_filter(value: f32, _resonance: f32) -> FilterState {
    let value = if value.is_nan() { 0.5 } else { value.clamp(0.0, 1.0) };
    let resonance_q = bandwidth_to_q(BANDWIDTH_OCTAVES);

    if value > DEADBAND_LOW && value < DEADBAND_HIGH {
        return FilterState::bypass();
    }

    if value < 0.5 {
        let n = value * 2.0;
        FilterState {
            mode: FilterMode::LowPass,
            cutoff_hz: LOWPASS_MIN_HZ * powf(LOWPASS_MAX_HZ / LOWPASS_MIN_HZ, n),
            resonance_q,
        }
    } else {
        let n = (value - 0.5) * 2.0;
        FilterState {
            mode: FilterMode::HighPass,
            cutoff_hz: HIGHPASS_MIN_HZ * powf(HIGHPASS_MAX_HZ / HIGHPASS_MIN_HZ, n),
            resonance_q,
        }
    }
}

/// Single-writer/single-reader slot for a [`FilterState`].
///
/// Packed into one `AtomicU64` so the reader never sees a cutoff from one
/// update paired with a mode from another:
///
/// ```text
/// bits 63..32  cutoff_hz (f32 bits)
/// bits 31..16  resonance_q * 1000 (u16)
/// bits  7..0   mode
/// ```
#[derive(Debug)]
pub struct FilterCell {
    packed: AtomicU64,
}

impl FilterCell {
    /// Create a cell holding `state`.
    pub fn new(state: FilterState) -> Self {
        Self {
            packed: AtomicU64::new(pack(state)),
        }
    }

    /// Publish a new state (control thread).
    #[inline]
    pub fn store(&self, state: FilterState) {
        self.packed.store(pack(state), Ordering::Release);
    }

    /// Read the latest state (render context).
    #[inline]
    pub fn load(&self) -> FilterState {
        unpack(self.packed.load(Ordering::Acquire))
    }

    /// Map a knob value and publish the result.
    pub fn set_knob(&self, value: f32) -> FilterState {
        let state = map_filter(value, 0.0);
        self.store(state);
        state
    }
}

impl Default for FilterCell {
    fn default() -> Self {
        Self::new(FilterState::bypass())
    }
}

fn pack(state: FilterState) -> u64 {
    let milli_q = (state.resonance_q * 1000.0).round().clamp(0.0, u16::MAX as f32) as u16;
    (u64::from(state.cutoff_hz.to_bits()) << 32)
        | (u64::from(milli_q) << 16)
        | u64::from(state.mode.to_bits())
}

fn unpack(bits: u64) -> FilterState {
    FilterState {
        mode: FilterMode::from_bits((bits & 0xFF) as u8),
        cutoff_hz: f32::from_bits((bits >> 32) as u32),
        resonance_q: f32::from((bits >> 16) as u16) / 1000.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centre_and_deadband_bypass() {
        for v in [0.481, 0.49, 0.5, 0.51, 0.519] {
            assert_eq!(map_filter(v, 0.0).mode, FilterMode::Bypass, "{v}");
        }
        assert_eq!(map_filter(f32::NAN, 0.0).mode, FilterMode::Bypass);
    }

    #[test]
    fn deadband_edges_are_not_bypass() {
        assert_eq!(map_filter(0.48, 0.0).mode, FilterMode::LowPass);
        assert_eq!(map_filter(0.52, 0.0).mode, FilterMode::HighPass);
    }

    #[test]
    fn sweep_endpoints() {
        let lp = map_filter(0.0, 0.0);
        assert!((lp.cutoff_hz - 100.0).abs() < 0.01);
        let hp = map_filter(1.0, 0.0);
        assert!((hp.cutoff_hz - 18_000.0).abs() < 1.0);
        // just left of the deadband the low-pass is nearly wide open
        let near = map_filter(0.48, 0.0);
        assert!(near.cutoff_hz > 15_000.0);
    }

    #[test]
    fn out_of_range_values_clamp() {
        assert_eq!(map_filter(-3.0, 0.0), map_filter(0.0, 0.0));
        assert_eq!(map_filter(7.0, 0.0), map_filter(1.0, 0.0));
    }

    #[test]
    fn resonance_is_ignored() {
        assert_eq!(map_filter(0.2, 0.0), map_filter(0.2, 1.0));
        assert!((map_filter(0.2, 0.9).resonance_q - 0.667).abs() < 0.001);
    }

    #[test]
    fn cell_round_trips_state() {
        let cell = FilterCell::default();
        assert_eq!(cell.load().mode, FilterMode::Bypass);
        let state = cell.set_knob(0.8);
        let loaded = cell.load();
        assert_eq!(loaded.mode, FilterMode::HighPass);
        assert_eq!(loaded.cutoff_hz, state.cutoff_hz);
        assert!((loaded.resonance_q - state.resonance_q).abs() < 1e-3);
    }
}
