//! Three-band DJ EQ with per-band kill.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::kernels::{Biquad, Coefficients};
use crate::param::AtomicF32;
use crate::stage::{AudioFormat, PlanarBlock, Stage, StageError};

/// Lowest band gain; also the gain a killed band is held at.
pub const EQ_MIN_DB: f32 = -24.0;
/// Highest band gain.
pub const EQ_MAX_DB: f32 = 12.0;

const BASS_HZ: f32 = 250.0;
const MID_HZ: f32 = 1000.0;
const MID_Q: f32 = 0.7;
const TREBLE_HZ: f32 = 4000.0;

/// EQ band selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EqBand {
    /// Low shelf at 250 Hz.
    Bass,
    /// Peaking at 1 kHz.
    Mid,
    /// High shelf at 4 kHz.
    Treble,
}

impl EqBand {
    /// All bands, low to high.
    pub const ALL: [Self; 3] = [Self::Bass, Self::Mid, Self::Treble];

    fn index(self) -> usize {
        match self {
            Self::Bass => 0,
            Self::Mid => 1,
            Self::Treble => 2,
        }
    }
}

/// Maps normalized controller positions onto EQ gain.
pub struct ControlMap;

impl ControlMap {
    /// Knob in `[0, 1]` to `[-12, +12]` dB; centre is flat.
    ///
    /// ```rust
    /// use deepeye_core::ControlMap;
    ///
    /// assert_eq!(ControlMap::cc_to_db(0.5), 0.0);
    /// assert_eq!(ControlMap::cc_to_db(0.0), -12.0);
    /// assert_eq!(ControlMap::cc_to_db(1.0), 12.0);
    /// ```
    pub fn cc_to_db(value: f32) -> f32 {
        value.clamp(0.0, 1.0) * 24.0 - 12.0
    }
}

/// Band gains shared between the control thread and [`EqStage`].
///
/// Killing a band holds it at [`EQ_MIN_DB`] and remembers the gain it had;
/// setting the gain of a killed band only updates the remembered value,
/// which is restored on un-kill. Written by one control thread.
#[derive(Debug)]
pub struct EqControls {
    gains: [AtomicF32; 3],
    remembered: [AtomicF32; 3],
    killed: [AtomicBool; 3],
}

impl EqControls {
    /// All bands flat.
    pub fn new() -> Self {
        let cell = || AtomicF32::new(0.0, EQ_MIN_DB, EQ_MAX_DB);
        Self {
            gains: [cell(), cell(), cell()],
            remembered: [cell(), cell(), cell()],
            killed: [AtomicBool::new(false), AtomicBool::new(false), AtomicBool::new(false)],
        }
    }

    /// Set a band gain in dB (clamped to `[-24, +12]`).
    pub fn set_gain(&self, band: EqBand, db: f32) {
        let i = band.index();
        if self.killed[i].load(Ordering::Acquire) {
            self.remembered[i].set(db);
        } else {
            self.gains[i].set(db);
        }
    }

    /// Engage or release a band kill.
    pub fn set_kill(&self, band: EqBand, kill: bool) {
        let i = band.index();
        let was = self.killed[i].load(Ordering::Acquire);
        if kill && !was {
            self.remembered[i].set(self.gains[i].get());
            self.killed[i].store(true, Ordering::Release);
            self.gains[i].set(EQ_MIN_DB);
        } else if !kill && was {
            self.killed[i].store(false, Ordering::Release);
            self.gains[i].set(self.remembered[i].get());
        }
    }

    /// Gain currently applied to a band, in dB.
    pub fn gain(&self, band: EqBand) -> f32 {
        self.gains[band.index()].get()
    }

    /// Gain the band returns to when un-killed (equals `gain` when not killed).
    pub fn user_gain(&self, band: EqBand) -> f32 {
        let i = band.index();
        if self.killed[i].load(Ordering::Acquire) {
            self.remembered[i].get()
        } else {
            self.gains[i].get()
        }
    }

    /// Whether a band is killed.
    pub fn is_killed(&self, band: EqBand) -> bool {
        self.killed[band.index()].load(Ordering::Acquire)
    }
}

impl Default for EqControls {
    fn default() -> Self {
        Self::new()
    }
}

/// Three-band EQ stage reading its gains from [`EqControls`] once per block.
#[derive(Debug)]
pub struct EqStage {
    controls: Arc<EqControls>,
    sample_rate: f32,
    /// One section per band per channel.
    sections: Vec<[Biquad; 3]>,
    applied_db: [f32; 3],
}

impl EqStage {
    /// Create an unprepared stage.
    pub fn new(controls: Arc<EqControls>) -> Self {
        Self {
            controls,
            sample_rate: 0.0,
            sections: Vec::new(),
            applied_db: [f32::NAN; 3],
        }
    }

    fn band_coefficients(&self, band: EqBand, db: f32) -> Coefficients {
        match band {
            EqBand::Bass => Coefficients::low_shelf(BASS_HZ, db, self.sample_rate),
            EqBand::Mid => Coefficients::peaking(MID_HZ, MID_Q, db, self.sample_rate),
            EqBand::Treble => Coefficients::high_shelf(TREBLE_HZ, db, self.sample_rate),
        }
    }

    fn refresh(&mut self) {
        for band in EqBand::ALL {
            let i = band.index();
            let db = self.controls.gain(band);
            if db != self.applied_db[i] {
                let coeffs = self.band_coefficients(band, db);
                for channel in &mut self.sections {
                    channel[i].set_coefficients(coeffs);
                }
                self.applied_db[i] = db;
            }
        }
    }
}

impl Stage for EqStage {
    fn name(&self) -> &str {
        "eq"
    }

    fn prepare(&mut self, format: &AudioFormat) -> Result<(), StageError> {
        format.validate()?;
        self.sample_rate = format.sample_rate;
        self.sections = vec![Default::default(); format.channels];
        self.applied_db = [f32::NAN; 3];
        self.refresh();
        Ok(())
    }

    fn process(&mut self, block: &mut PlanarBlock) {
        self.refresh();
        for (plane, sections) in block.planes_mut().zip(self.sections.iter_mut()) {
            for s in plane.iter_mut() {
                let mut x = *s;
                for section in sections.iter_mut() {
                    x = section.process(x);
                }
                *s = x;
            }
        }
    }

    fn reset(&mut self) {
        for channel in &mut self.sections {
            for section in channel.iter_mut() {
                section.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::PI;

    #[test]
    fn kill_remembers_gain() {
        let eq = EqControls::new();
        eq.set_gain(EqBand::Bass, 6.0);
        eq.set_kill(EqBand::Bass, true);
        assert_eq!(eq.gain(EqBand::Bass), EQ_MIN_DB);
        assert!(eq.is_killed(EqBand::Bass));

        eq.set_gain(EqBand::Bass, 3.0);
        assert_eq!(eq.gain(EqBand::Bass), EQ_MIN_DB);
        assert_eq!(eq.user_gain(EqBand::Bass), 3.0);

        eq.set_kill(EqBand::Bass, false);
        assert_eq!(eq.gain(EqBand::Bass), 3.0);
        assert_eq!(eq.gain(EqBand::Mid), 0.0);
    }

    #[test]
    fn repeated_kill_keeps_original_gain() {
        let eq = EqControls::new();
        eq.set_gain(EqBand::Treble, -3.0);
        eq.set_kill(EqBand::Treble, true);
        eq.set_kill(EqBand::Treble, true);
        eq.set_kill(EqBand::Treble, false);
        assert_eq!(eq.gain(EqBand::Treble), -3.0);
    }

    #[test]
    fn gains_clamp() {
        let eq = EqControls::new();
        eq.set_gain(EqBand::Mid, 40.0);
        assert_eq!(eq.gain(EqBand::Mid), EQ_MAX_DB);
        eq.set_gain(EqBand::Mid, -40.0);
        assert_eq!(eq.gain(EqBand::Mid), EQ_MIN_DB);
    }

    #[test]
    fn cc_mapping_clamps() {
        assert_eq!(ControlMap::cc_to_db(-1.0), -12.0);
        assert_eq!(ControlMap::cc_to_db(2.0), 12.0);
        assert_eq!(ControlMap::cc_to_db(0.75), 6.0);
    }

    fn tone_peak(stage: &mut EqStage, freq: f32) -> f32 {
        let sr = 48000.0;
        let mut block = PlanarBlock::new(1, 480);
        let mut n = 0usize;
        let mut peak = 0.0_f32;
        for b in 0..100 {
            block.set_frames(480);
            for s in block.plane_mut(0).iter_mut() {
                *s = (2.0 * PI * freq * n as f32 / sr).sin();
                n += 1;
            }
            stage.process(&mut block);
            if b > 50 {
                peak = block.plane(0).iter().fold(peak, |p, s| p.max(s.abs()));
            }
        }
        peak
    }

    #[test]
    fn flat_eq_is_transparent_and_kill_cuts() {
        let controls = Arc::new(EqControls::new());
        let mut stage = EqStage::new(Arc::clone(&controls));
        stage.prepare(&AudioFormat::new(48000.0, 1, 480)).unwrap();

        let flat = tone_peak(&mut stage, 60.0);
        assert!((flat - 1.0).abs() < 0.02, "flat {flat}");

        controls.set_kill(EqBand::Bass, true);
        stage.reset();
        let killed = tone_peak(&mut stage, 60.0);
        assert!(crate::linear_to_db(killed) < -18.0, "killed {killed}");
    }
}
