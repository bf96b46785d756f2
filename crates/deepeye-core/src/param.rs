//! Cross-thread parameter cells and per-sample smoothing.
//!
//! The control thread writes, the render context reads. Cells are plain
//! atomics with Release stores and Acquire loads: no locks, no allocation,
//! and a reader always observes a value that some writer stored in full.
//!
//! - [`AtomicF32`] - one `f32` (gain in dB, knob value, EQ band gain)
//! - [`FilterCell`](crate::FilterCell) lives next to the filter mapping it carries
//! - [`SmoothedParam`] - render-side one-pole smoothing of a cell's value so
//!   50 ms control updates do not produce zipper noise

use core::sync::atomic::{AtomicU32, Ordering};
use libm::expf;

/// A thread-safe `f32` stored as its bit pattern in an [`AtomicU32`].
///
/// Single writer, any number of readers. Values are clamped to the range
/// given at construction.
#[derive(Debug)]
pub struct AtomicF32 {
    value: AtomicU32,
    min: f32,
    max: f32,
}

impl AtomicF32 {
    /// Create a cell with an initial value and an inclusive range.
    pub fn new(initial: f32, min: f32, max: f32) -> Self {
        Self {
            value: AtomicU32::new(initial.clamp(min, max).to_bits()),
            min,
            max,
        }
    }

    /// Create a cell with no effective range limit.
    pub fn unbounded(initial: f32) -> Self {
        Self::new(initial, f32::MIN, f32::MAX)
    }

    /// Store a new value (control thread).
    ///
    /// NaN is ignored so a malformed control value never reaches the
    /// render context.
    #[inline]
    pub fn set(&self, v: f32) {
        if v.is_nan() {
            return;
        }
        let clamped = v.clamp(self.min, self.max);
        self.value.store(clamped.to_bits(), Ordering::Release);
    }

    /// Load the current value (render context).
    #[inline]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.value.load(Ordering::Acquire))
    }
}

/// Exponentially smoothed parameter (one-pole lowpass toward a target).
///
/// Lives inside a stage and is advanced once per sample.
#[derive(Debug, Clone)]
pub struct SmoothedParam {
    current: f32,
    target: f32,
    coeff: f32,
    sample_rate: f32,
    smoothing_time_ms: f32,
}

impl SmoothedParam {
    /// Create a smoothed parameter.
    ///
    /// # Arguments
    /// * `initial` - Starting value (current and target)
    /// * `sample_rate` - Sample rate in Hz
    /// * `smoothing_time_ms` - Time constant in milliseconds (0 = instant)
    pub fn new(initial: f32, sample_rate: f32, smoothing_time_ms: f32) -> Self {
        let mut param = Self {
            current: initial,
            target: initial,
            coeff: 1.0,
            sample_rate,
            smoothing_time_ms,
        };
        param.recalculate_coeff();
        param
    }

    /// 5 ms smoothing, suited to gain changes.
    pub fn fast(initial: f32, sample_rate: f32) -> Self {
        Self::new(initial, sample_rate, 5.0)
    }

    /// Set the value to smooth toward.
    #[inline]
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Advance by one sample and return the smoothed value.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        self.current += self.coeff * (self.target - self.current);
        self.current
    }

    /// Current smoothed value without advancing.
    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }

    /// Target value.
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Jump straight to the target.
    #[inline]
    pub fn snap_to_target(&mut self) {
        self.current = self.target;
    }

    /// Update the sample rate and recompute the coefficient.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.recalculate_coeff();
    }

    // coeff = 1 - exp(-1 / (tau * sample_rate)); 5 tau reaches 99.3% of target.
    fn recalculate_coeff(&mut self) {
        if self.smoothing_time_ms <= 0.0 || self.sample_rate <= 0.0 {
            self.coeff = 1.0;
        } else {
            let samples = self.smoothing_time_ms / 1000.0 * self.sample_rate;
            self.coeff = 1.0 - expf(-1.0 / samples);
        }
    }
}
