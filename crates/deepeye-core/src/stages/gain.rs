//! Gain-only stage applying the sidechain ducking level.

use std::sync::Arc;

use crate::math::db_to_linear;
use crate::param::SmoothedParam;
use crate::sidechain::GainCell;
use crate::stage::{AudioFormat, PlanarBlock, Stage, StageError};

/// Reads the ducking gain once per block and ramps to it per sample.
#[derive(Debug)]
pub struct SidechainGainStage {
    cell: Arc<GainCell>,
    gain: SmoothedParam,
}

impl SidechainGainStage {
    /// Create a stage reading `cell` (dB).
    pub fn new(cell: Arc<GainCell>) -> Self {
        let initial = db_to_linear(cell.get());
        Self {
            cell,
            gain: SmoothedParam::fast(initial, 48000.0),
        }
    }
}

impl Stage for SidechainGainStage {
    fn name(&self) -> &str {
        "sidechain-gain"
    }

    fn prepare(&mut self, format: &AudioFormat) -> Result<(), StageError> {
        format.validate()?;
        self.gain.set_sample_rate(format.sample_rate);
        self.gain.set_target(db_to_linear(self.cell.get()));
        self.gain.snap_to_target();
        Ok(())
    }

    fn process(&mut self, block: &mut PlanarBlock) {
        self.gain.set_target(db_to_linear(self.cell.get()));
        let channels = block.channels();
        for i in 0..block.frames() {
            let g = self.gain.advance();
            for ch in 0..channels {
                block.plane_mut(ch)[i] *= g;
            }
        }
    }

    fn reset(&mut self) {
        self.gain.snap_to_target();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramps_to_ducked_level() {
        let cell = Arc::new(GainCell::unbounded(0.0));
        let mut stage = SidechainGainStage::new(Arc::clone(&cell));
        stage.prepare(&AudioFormat::new(48000.0, 1, 480)).unwrap();

        cell.set(-12.0);
        let mut block = PlanarBlock::new(1, 480);
        let mut first = 0.0;
        for b in 0..10 {
            block.set_frames(480);
            block.plane_mut(0).fill(1.0);
            stage.process(&mut block);
            if b == 0 {
                first = block.plane(0)[0];
            }
        }
        assert!(first > 0.9, "no step on the first sample: {first}");
        let settled = block.plane(0)[479];
        assert!((settled - db_to_linear(-12.0)).abs() < 1e-3);
    }
}
