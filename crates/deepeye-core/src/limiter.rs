//! Output limiter configuration.

use serde::{Deserialize, Serialize};

use crate::kernels::DynamicsKernel;

/// Static dynamics settings for the output limiter.
///
/// Applied once when the limiter stage is prepared. Bypass is the only thing
/// that changes at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimiterPolicy {
    /// Level where limiting begins, in dBFS.
    pub threshold_db: f32,
    /// Compression ratio (40:1 is effectively brickwall).
    pub ratio: f32,
    /// Attack time in seconds.
    pub attack_seconds: f32,
    /// Release time in seconds.
    pub release_seconds: f32,
    /// Output makeup gain in dB.
    pub makeup_gain_db: f32,
}

impl LimiterPolicy {
    /// -0.1 dB, 40:1, 2 ms attack, 50 ms release, no makeup.
    pub const fn brickwall() -> Self {
        Self {
            threshold_db: -0.1,
            ratio: 40.0,
            attack_seconds: 0.002,
            release_seconds: 0.05,
            makeup_gain_db: 0.0,
        }
    }

    /// Build the processing kernel for a sample rate.
    pub fn kernel(&self, sample_rate: f32) -> DynamicsKernel {
        DynamicsKernel::new(
            self.threshold_db,
            self.ratio,
            self.attack_seconds,
            self.release_seconds,
            self.makeup_gain_db,
            sample_rate,
        )
    }
}

impl Default for LimiterPolicy {
    fn default() -> Self {
        Self::brickwall()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brickwall_numbers() {
        let p = LimiterPolicy::default();
        assert_eq!(p, LimiterPolicy::brickwall());
        assert_eq!(p.threshold_db, -0.1);
        assert_eq!(p.ratio, 40.0);
        assert_eq!(p.attack_seconds, 0.002);
        assert_eq!(p.release_seconds, 0.05);
        assert_eq!(p.makeup_gain_db, 0.0);
    }
}
