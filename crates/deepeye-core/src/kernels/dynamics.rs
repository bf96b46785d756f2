//! Feed-forward dynamics kernel used by the limiter stage.
//!
//! ```text
//! Input → Peak Detector → Gain Computer → Gain Reduction → Makeup → Output
//! ```
//!
//! Detection is linked across channels: every channel of a frame receives the
//! same gain, so the stereo image does not shift under reduction.

use libm::expf;

use crate::math::{db_to_linear, linear_to_db};
use crate::stage::PlanarBlock;

/// Static curve: how many dB of reduction a detected level produces.
#[derive(Debug, Clone, Copy)]
struct GainComputer {
    threshold_db: f32,
    ratio: f32,
    knee_db: f32,
}

impl GainComputer {
    #[inline]
    fn gain_db(&self, input_db: f32) -> f32 {
        let overshoot = input_db - self.threshold_db;
        let slope = 1.0 - 1.0 / self.ratio;
        let half_knee = self.knee_db / 2.0;

        if overshoot <= -half_knee {
            0.0
        } else if overshoot > half_knee || self.knee_db <= 0.0 {
            -overshoot * slope
        } else {
            let k = (overshoot + half_knee) / self.knee_db;
            -k * k * overshoot * slope
        }
    }
}

/// Peak detector with separate attack and release time constants.
#[derive(Debug, Clone)]
struct PeakDetector {
    envelope: f32,
    attack_coeff: f32,
    release_coeff: f32,
}

impl PeakDetector {
    fn new(attack_seconds: f32, release_seconds: f32, sample_rate: f32) -> Self {
        Self {
            envelope: 0.0,
            attack_coeff: time_coeff(attack_seconds, sample_rate),
            release_coeff: time_coeff(release_seconds, sample_rate),
        }
    }

    #[inline]
    fn process(&mut self, level: f32) -> f32 {
        let coeff = if level > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = coeff * self.envelope + (1.0 - coeff) * level;
        self.envelope
    }
}

// coeff = exp(-1 / (tau * sample_rate))
fn time_coeff(seconds: f32, sample_rate: f32) -> f32 {
    let samples = seconds.max(1e-5) * sample_rate;
    expf(-1.0 / samples)
}

/// Linked multi-channel compressor/limiter.
///
/// Parameters are fixed at construction; rebuilding the kernel is the only
/// way to change them.
///
/// # Example
///
/// ```rust
/// use deepeye_core::PlanarBlock;
/// use deepeye_core::kernels::DynamicsKernel;
///
/// // -0.1 dB, 40:1, 2 ms attack, 50 ms release
/// let mut kernel = DynamicsKernel::new(-0.1, 40.0, 0.002, 0.05, 0.0, 48000.0);
/// let mut block = PlanarBlock::from_planes(vec![vec![0.5; 64], vec![0.5; 64]]);
/// kernel.process_block(&mut block);
/// ```
#[derive(Debug, Clone)]
pub struct DynamicsKernel {
    computer: GainComputer,
    detector: PeakDetector,
    makeup: f32,
    last_gain_reduction_db: f32,
}

impl DynamicsKernel {
    /// Build a hard-knee kernel.
    pub fn new(
        threshold_db: f32,
        ratio: f32,
        attack_seconds: f32,
        release_seconds: f32,
        makeup_gain_db: f32,
        sample_rate: f32,
    ) -> Self {
        Self {
            computer: GainComputer {
                threshold_db,
                ratio: ratio.max(1.0),
                knee_db: 0.0,
            },
            detector: PeakDetector::new(attack_seconds, release_seconds, sample_rate),
            makeup: db_to_linear(makeup_gain_db),
            last_gain_reduction_db: 0.0,
        }
    }

    /// Process one frame given its linked detector level; returns the gain
    /// to apply to every channel of that frame.
    #[inline]
    pub fn frame_gain(&mut self, peak: f32) -> f32 {
        let envelope = self.detector.process(peak);
        let reduction_db = self.computer.gain_db(linear_to_db(envelope));
        self.last_gain_reduction_db = reduction_db;
        db_to_linear(reduction_db) * self.makeup
    }

    /// Process a planar block in place.
    pub fn process_block(&mut self, block: &mut PlanarBlock) {
        let channels = block.channels();
        for i in 0..block.frames() {
            let peak = (0..channels).fold(0.0_f32, |acc, ch| acc.max(block.plane(ch)[i].abs()));
            let gain = self.frame_gain(peak);
            for ch in 0..channels {
                block.plane_mut(ch)[i] *= gain;
            }
        }
    }

    /// Most recent gain reduction in dB (always non-positive).
    pub fn gain_reduction_db(&self) -> f32 {
        self.last_gain_reduction_db
    }

    /// Forget detector history.
    pub fn reset(&mut self) {
        self.detector.envelope = 0.0;
        self.last_gain_reduction_db = 0.0;
    }
}
