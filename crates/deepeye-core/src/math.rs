//! Level conversions and small numeric helpers shared by the signal path.
//!
//! All functions are allocation-free and safe to call from the render context.

use libm::{expf, logf};

/// Convert decibels to linear gain.
///
/// # Example
/// ```rust
/// use deepeye_core::db_to_linear;
///
/// assert!((db_to_linear(0.0) - 1.0).abs() < 0.001);
/// assert!((db_to_linear(-6.02) - 0.5).abs() < 0.01);
/// ```
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    // 10^(dB/20) = e^(dB * ln(10)/20)
    const FACTOR: f32 = core::f32::consts::LN_10 / 20.0;
    expf(db * FACTOR)
}

/// Convert linear gain to decibels.
///
/// Values at or below 1e-10 are clamped so the result stays finite.
///
/// # Example
/// ```rust
/// use deepeye_core::linear_to_db;
///
/// assert!((linear_to_db(1.0) - 0.0).abs() < 0.001);
/// assert!((linear_to_db(0.5) - (-6.02)).abs() < 0.01);
/// ```
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    const FACTOR: f32 = 20.0 / core::f32::consts::LN_10;
    logf(linear.max(1e-10)) * FACTOR
}

/// Convert a power ratio to decibels (`10 * log10(power)`).
#[inline]
pub fn power_to_db(power: f32) -> f32 {
    const FACTOR: f32 = 10.0 / core::f32::consts::LN_10;
    logf(power.max(1e-30)) * FACTOR
}

/// Flush subnormal values to zero.
///
/// Biquad feedback paths decay toward zero during silence; keeping them out
/// of the subnormal range avoids the CPU penalty on most architectures.
#[allow(clippy::inline_always)]
#[inline(always)]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < 1e-20 { 0.0 } else { x }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_roundtrip() {
        for db in [-60.0_f32, -12.0, -0.1, 0.0, 6.0] {
            let back = linear_to_db(db_to_linear(db));
            assert!((back - db).abs() < 1e-3, "{db} -> {back}");
        }
    }

    #[test]
    fn power_db_matches_amplitude_db() {
        let amp = 0.25_f32;
        assert!((power_to_db(amp * amp) - linear_to_db(amp)).abs() < 1e-3);
    }

    #[test]
    fn denormals_flush() {
        assert_eq!(flush_denormal(1e-25), 0.0);
        assert_eq!(flush_denormal(0.5), 0.5);
    }
}
