//! Second-order IIR sections with RBJ Audio EQ Cookbook coefficients.
//!
//! The sweep filter uses the low/high-pass designs; the three-band EQ uses
//! the shelf and peaking designs.

use core::f32::consts::{LN_2, PI};
use libm::{cosf, powf, sinf, sinhf, sqrtf};

use crate::math::flush_denormal;

/// Normalized biquad coefficients (`a0 == 1`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    /// Feedforward `b0`
    pub b0: f32,
    /// Feedforward `b1`
    pub b1: f32,
    /// Feedforward `b2`
    pub b2: f32,
    /// Feedback `a1`
    pub a1: f32,
    /// Feedback `a2`
    pub a2: f32,
}

impl Coefficients {
    /// Passthrough: `y[n] = x[n]`.
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    fn normalized(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        let a0_inv = 1.0 / a0;
        Self {
            b0: b0 * a0_inv,
            b1: b1 * a0_inv,
            b2: b2 * a0_inv,
            a1: a1 * a0_inv,
            a2: a2 * a0_inv,
        }
    }

    /// Second-order low-pass.
    pub fn lowpass(frequency: f32, q: f32, sample_rate: f32) -> Self {
        let (cos_w, alpha) = omega_terms(frequency, q, sample_rate);
        let b1 = 1.0 - cos_w;
        Self::normalized(
            b1 / 2.0,
            b1,
            b1 / 2.0,
            1.0 + alpha,
            -2.0 * cos_w,
            1.0 - alpha,
        )
    }

    /// Second-order high-pass.
    pub fn highpass(frequency: f32, q: f32, sample_rate: f32) -> Self {
        let (cos_w, alpha) = omega_terms(frequency, q, sample_rate);
        let b0 = (1.0 + cos_w) / 2.0;
        Self::normalized(b0, -(1.0 + cos_w), b0, 1.0 + alpha, -2.0 * cos_w, 1.0 - alpha)
    }

    /// Peaking EQ: boost or cut around `frequency`.
    pub fn peaking(frequency: f32, q: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = powf(10.0, gain_db / 40.0);
        let (cos_w, alpha) = omega_terms(frequency, q, sample_rate);
        Self::normalized(
            1.0 + alpha * a,
            -2.0 * cos_w,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos_w,
            1.0 - alpha / a,
        )
    }

    /// Low shelf with shelf slope `S = 1`.
    pub fn low_shelf(frequency: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = powf(10.0, gain_db / 40.0);
        let (cos_w, alpha) = shelf_terms(frequency, sample_rate);
        let two_sqrt_a_alpha = 2.0 * sqrtf(a) * alpha;
        Self::normalized(
            a * ((a + 1.0) - (a - 1.0) * cos_w + two_sqrt_a_alpha),
            2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w),
            a * ((a + 1.0) - (a - 1.0) * cos_w - two_sqrt_a_alpha),
            (a + 1.0) + (a - 1.0) * cos_w + two_sqrt_a_alpha,
            -2.0 * ((a - 1.0) + (a + 1.0) * cos_w),
            (a + 1.0) + (a - 1.0) * cos_w - two_sqrt_a_alpha,
        )
    }

    /// High shelf with shelf slope `S = 1`.
    pub fn high_shelf(frequency: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = powf(10.0, gain_db / 40.0);
        let (cos_w, alpha) = shelf_terms(frequency, sample_rate);
        let two_sqrt_a_alpha = 2.0 * sqrtf(a) * alpha;
        Self::normalized(
            a * ((a + 1.0) + (a - 1.0) * cos_w + two_sqrt_a_alpha),
            -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w),
            a * ((a + 1.0) + (a - 1.0) * cos_w - two_sqrt_a_alpha),
            (a + 1.0) - (a - 1.0) * cos_w + two_sqrt_a_alpha,
            2.0 * ((a - 1.0) - (a + 1.0) * cos_w),
            (a + 1.0) - (a - 1.0) * cos_w - two_sqrt_a_alpha,
        )
    }
}

impl Default for Coefficients {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// Frequency is kept below Nyquist so low sample rates never fold the design.
fn omega_terms(frequency: f32, q: f32, sample_rate: f32) -> (f32, f32) {
    let frequency = frequency.clamp(1.0, sample_rate * 0.49);
    let omega = 2.0 * PI * frequency / sample_rate;
    (cosf(omega), sinf(omega) / (2.0 * q.max(1e-3)))
}

// With S = 1 the cookbook's sqrt((A + 1/A)(1/S - 1) + 2) reduces to sqrt(2).
fn shelf_terms(frequency: f32, sample_rate: f32) -> (f32, f32) {
    let frequency = frequency.clamp(1.0, sample_rate * 0.49);
    let omega = 2.0 * PI * frequency / sample_rate;
    (cosf(omega), sinf(omega) / 2.0 * core::f32::consts::SQRT_2)
}

/// Q equivalent of a bandwidth given in octaves.
///
/// `Q = 1 / (2 sinh(ln2 / 2 * BW))`; two octaves gives roughly 0.667.
pub fn bandwidth_to_q(octaves: f32) -> f32 {
    1.0 / (2.0 * sinhf(LN_2 / 2.0 * octaves))
}

/// Direct Form I biquad section.
///
/// ```text
/// y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
/// ```
#[derive(Debug, Clone, Default)]
pub struct Biquad {
    coeffs: Coefficients,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    /// A passthrough section.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the coefficients, keeping the delay line.
    #[inline]
    pub fn set_coefficients(&mut self, coeffs: Coefficients) {
        self.coeffs = coeffs;
    }

    /// Current coefficients.
    pub fn coefficients(&self) -> Coefficients {
        self.coeffs
    }

    /// Process one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let c = &self.coeffs;
        let output = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2
            - c.a1 * self.y1
            - c.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = flush_denormal(output);
        output
    }

    /// Process a block in place.
    pub fn process_block(&mut self, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            *s = self.process(*s);
        }
    }

    /// Clear the delay line.
    pub fn clear(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settle(biquad: &mut Biquad, input: f32, n: usize) -> f32 {
        let mut out = 0.0;
        for _ in 0..n {
            out = biquad.process(input);
        }
        out
    }

    /// Peak amplitude of a sine at `freq` after the filter has settled.
    fn sine_gain(coeffs: Coefficients, freq: f32, sr: f32) -> f32 {
        let mut biquad = Biquad::new();
        biquad.set_coefficients(coeffs);
        let mut peak = 0.0_f32;
        for i in 0..(sr as usize / 2) {
            let x = sinf(2.0 * PI * freq * i as f32 / sr);
            let y = biquad.process(x);
            if i > sr as usize / 4 {
                peak = peak.max(y.abs());
            }
        }
        peak
    }

    #[test]
    fn identity_passes_through() {
        let mut biquad = Biquad::new();
        for i in 0..10 {
            let x = i as f32 * 0.1;
            assert!((biquad.process(x) - x).abs() < 1e-6);
        }
    }

    #[test]
    fn lowpass_passes_dc() {
        let mut biquad = Biquad::new();
        biquad.set_coefficients(Coefficients::lowpass(1000.0, 0.707, 48000.0));
        assert!((settle(&mut biquad, 1.0, 2000) - 1.0).abs() < 0.01);
    }

    #[test]
    fn highpass_blocks_dc() {
        let mut biquad = Biquad::new();
        biquad.set_coefficients(Coefficients::highpass(1000.0, 0.707, 48000.0));
        assert!(settle(&mut biquad, 1.0, 4000).abs() < 0.01);
    }

    #[test]
    fn shelves_hit_their_gain() {
        let sr = 48000.0;
        let low = sine_gain(Coefficients::low_shelf(250.0, -12.0, sr), 30.0, sr);
        assert!((crate::linear_to_db(low) + 12.0).abs() < 1.0, "low shelf {low}");
        let high = sine_gain(Coefficients::high_shelf(4000.0, 6.0, sr), 16000.0, sr);
        assert!((crate::linear_to_db(high) - 6.0).abs() < 1.0, "high shelf {high}");
    }

    #[test]
    fn peaking_at_zero_gain_is_flat() {
        let g = sine_gain(Coefficients::peaking(1000.0, 0.7, 0.0, 48000.0), 1000.0, 48000.0);
        assert!((g - 1.0).abs() < 0.01);
    }

    #[test]
    fn two_octaves_is_about_two_thirds() {
        assert!((bandwidth_to_q(2.0) - 0.667).abs() < 0.001);
        assert!((bandwidth_to_q(1.0) - 1.414).abs() < 0.001);
    }

    #[test]
    fn clear_zeroes_state() {
        let mut biquad = Biquad::new();
        biquad.set_coefficients(Coefficients::lowpass(500.0, 0.707, 48000.0));
        settle(&mut biquad, 1.0, 10);
        biquad.clear();
        assert_eq!(biquad.process(0.0), 0.0);
    }
}
