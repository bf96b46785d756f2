//! Sweep filter stage driven by a [`FilterCell`].

use std::sync::Arc;

use crate::filter_map::{FilterCell, FilterMode, FilterState};
use crate::kernels::{Biquad, Coefficients};
use crate::stage::{AudioFormat, PlanarBlock, Stage, StageError};

/// Single biquad per channel, recomputed when the published state changes.
#[derive(Debug)]
pub struct FilterStage {
    cell: Arc<FilterCell>,
    sample_rate: f32,
    sections: Vec<Biquad>,
    applied: Option<FilterState>,
}

impl FilterStage {
    /// Create an unprepared stage.
    pub fn new(cell: Arc<FilterCell>) -> Self {
        Self {
            cell,
            sample_rate: 0.0,
            sections: Vec::new(),
            applied: None,
        }
    }

    fn apply(&mut self, state: FilterState) {
        let coeffs = match state.mode {
            FilterMode::Bypass => Coefficients::IDENTITY,
            FilterMode::LowPass => {
                Coefficients::lowpass(state.cutoff_hz, state.resonance_q, self.sample_rate)
            }
            FilterMode::HighPass => {
                Coefficients::highpass(state.cutoff_hz, state.resonance_q, self.sample_rate)
            }
        };
        let mode_changed = self.applied.is_none_or(|prev| prev.mode != state.mode);
        for section in &mut self.sections {
            section.set_coefficients(coeffs);
            if mode_changed {
                section.clear();
            }
        }
        self.applied = Some(state);
    }
}

impl Stage for FilterStage {
    fn name(&self) -> &str {
        "filter"
    }

    fn prepare(&mut self, format: &AudioFormat) -> Result<(), StageError> {
        format.validate()?;
        self.sample_rate = format.sample_rate;
        self.sections = vec![Biquad::new(); format.channels];
        self.applied = None;
        self.apply(self.cell.load());
        Ok(())
    }

    fn process(&mut self, block: &mut PlanarBlock) {
        let state = self.cell.load();
        if self.applied != Some(state) {
            self.apply(state);
        }
        if state.mode == FilterMode::Bypass {
            return;
        }
        for (plane, section) in block.planes_mut().zip(self.sections.iter_mut()) {
            section.process_block(plane);
        }
    }

    fn reset(&mut self) {
        for section in &mut self.sections {
            section.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_dc(stage: &mut FilterStage) -> f32 {
        let mut block = PlanarBlock::new(2, 256);
        let mut last = 0.0;
        for _ in 0..40 {
            block.set_frames(256);
            for plane in block.planes_mut() {
                plane.fill(1.0);
            }
            stage.process(&mut block);
            last = block.plane(1)[255];
        }
        last
    }

    #[test]
    fn follows_the_cell() {
        let cell = Arc::new(FilterCell::default());
        let mut stage = FilterStage::new(Arc::clone(&cell));
        stage.prepare(&AudioFormat::new(48000.0, 2, 256)).unwrap();

        assert_eq!(run_dc(&mut stage), 1.0, "bypass leaves samples untouched");

        cell.set_knob(0.1);
        assert!((run_dc(&mut stage) - 1.0).abs() < 0.01, "low-pass passes DC");

        cell.set_knob(0.9);
        assert!(run_dc(&mut stage).abs() < 0.01, "high-pass blocks DC");
    }
}
