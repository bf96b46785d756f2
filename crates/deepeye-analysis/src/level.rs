//! Average-power metering over a ring buffer.

use std::sync::Arc;

use deepeye_core::{LevelSource, RingBuffer, power_to_db};

/// Default measurement span cap: one 50 ms tick at 48 kHz, rounded up.
pub const DEFAULT_MAX_FRAMES: usize = 4096;

/// [`LevelSource`] measuring the audio written to a ring since the last poll.
///
/// Each poll averages `x²` over every channel of the new samples, capped to
/// the most recent `max_frames`. Reports `None` while stopped, when no new
/// audio arrived, or when the read races the writer.
#[derive(Debug)]
pub struct RingLevelMeter {
    ring: Arc<RingBuffer>,
    cursor: Option<i64>,
    active: bool,
    scratch: Vec<f32>,
}

impl RingLevelMeter {
    /// Meter `ring` with the default span cap.
    pub fn new(ring: Arc<RingBuffer>) -> Self {
        Self::with_max_frames(ring, DEFAULT_MAX_FRAMES)
    }

    /// Meter `ring`, averaging at most `max_frames` per poll.
    pub fn with_max_frames(ring: Arc<RingBuffer>, max_frames: usize) -> Self {
        let max_frames = max_frames.clamp(1, ring.capacity());
        Self {
            ring,
            cursor: None,
            active: false,
            scratch: vec![0.0; max_frames],
        }
    }

    fn measure(&mut self) -> Option<f32> {
        let head = self.ring.last_sample_time()?;
        let oldest = self.ring.oldest_time()?;
        let span = self.scratch.len() as i64;
        let start = self
            .cursor
            .unwrap_or(head - span)
            .max(head - span)
            .max(oldest);
        self.cursor = Some(head);
        if start >= head {
            return None;
        }

        let len = (head - start) as usize;
        let mut sum = 0.0_f64;
        for ch in 0..self.ring.channels() {
            self.ring
                .read_channel(ch, start, head, &mut self.scratch)
                .ok()?;
            sum += self.scratch[..len]
                .iter()
                .map(|&x| f64::from(x) * f64::from(x))
                .sum::<f64>();
        }
        let mean = sum / (len * self.ring.channels()) as f64;
        Some(power_to_db(mean as f32))
    }
}

impl LevelSource for RingLevelMeter {
    fn start(&mut self) {
        self.active = true;
        self.cursor = self.ring.last_sample_time();
    }

    fn stop(&mut self) {
        self.active = false;
        self.cursor = None;
    }

    fn average_power_db(&mut self) -> Option<f32> {
        if !self.active {
            return None;
        }
        self.measure()
    }
}
