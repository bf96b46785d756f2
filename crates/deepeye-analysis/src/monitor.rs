//! Background spectrum publication.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use deepeye_core::{PeriodicWorker, RingBuffer};

use crate::spectrum::{AnalysisError, SpectrumAnalyzer, SpectrumConfig, SpectrumFrame};

/// Shared slot holding the newest complete frame.
pub type FrameSlot = Arc<ArcSwap<SpectrumFrame>>;

/// Runs a [`SpectrumAnalyzer`] against a ring on its own worker thread.
///
/// Each successful tick swaps a whole new frame into the slot; readers get
/// either the previous frame or the new one, never a mix. Skipped ticks
/// leave the previous frame in place.
pub struct SpectrumMonitor {
    frames: FrameSlot,
    worker: PeriodicWorker,
}

impl SpectrumMonitor {
    /// Validate `config` and start ticking against `ring`.
    pub fn start(config: SpectrumConfig, ring: Arc<RingBuffer>) -> Result<Self, AnalysisError> {
        let mut analyzer = SpectrumAnalyzer::new(config)?;
        let frames: FrameSlot =
            Arc::new(ArcSwap::from_pointee(SpectrumFrame::silent(config.bands)));

        let slot = Arc::clone(&frames);
        let period = Duration::from_secs_f32(config.tick_seconds);
        let worker = PeriodicWorker::spawn("deepeye-spectrum", period, move || {
            if let Some(frame) = analyzer.tick(&ring) {
                slot.store(Arc::new(frame));
            }
        })?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            fft_size = config.fft_size,
            bands = config.bands,
            tick_ms = (config.tick_seconds * 1000.0) as u32,
            "spectrum monitor started"
        );

        Ok(Self { frames, worker })
    }

    /// Most recent complete frame.
    pub fn latest(&self) -> Arc<SpectrumFrame> {
        self.frames.load_full()
    }

    /// Handle to the frame slot, for consumers that outlive a borrow.
    pub fn frames(&self) -> FrameSlot {
        Arc::clone(&self.frames)
    }

    /// Stop the worker. The last frame stays readable through
    /// [`frames`](Self::frames) handles.
    pub fn stop(self) {
        self.worker.stop();
    }
}

impl std::fmt::Debug for SpectrumMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumMonitor")
            .field("worker", &self.worker.name())
            .field("sample_time", &self.frames.load().sample_time)
            .finish()
    }
}
