//! Brickwall output limiter stage.

use crate::kernels::DynamicsKernel;
use crate::limiter::LimiterPolicy;
use crate::stage::{AudioFormat, PlanarBlock, Stage, StageError};

/// Applies a fixed [`LimiterPolicy`]. The kernel is rebuilt on each prepare.
#[derive(Debug)]
pub struct LimiterStage {
    policy: LimiterPolicy,
    kernel: Option<DynamicsKernel>,
}

impl LimiterStage {
    /// Create an unprepared stage.
    pub fn new(policy: LimiterPolicy) -> Self {
        Self {
            policy,
            kernel: None,
        }
    }

    /// The policy this stage was built with.
    pub fn policy(&self) -> &LimiterPolicy {
        &self.policy
    }
}

impl Default for LimiterStage {
    fn default() -> Self {
        Self::new(LimiterPolicy::brickwall())
    }
}

impl Stage for LimiterStage {
    fn name(&self) -> &str {
        "limiter"
    }

    fn prepare(&mut self, format: &AudioFormat) -> Result<(), StageError> {
        format.validate()?;
        self.kernel = Some(self.policy.kernel(format.sample_rate));
        Ok(())
    }

    fn process(&mut self, block: &mut PlanarBlock) {
        if let Some(kernel) = self.kernel.as_mut() {
            kernel.process_block(block);
        }
    }

    fn reset(&mut self) {
        if let Some(kernel) = self.kernel.as_mut() {
            kernel.reset();
        }
    }
}
