//! The live engine: one capture device through the chain into the ring,
//! with the analyzer and the sidechain ducker running beside it.

use std::sync::Arc;

use deepeye_analysis::{FrameSlot, SpectrumFrame, SpectrumMonitor};
use deepeye_config::{ControlsSection, EngineConfig};
use deepeye_core::{
    AudioFormat, BypassFlags, ChainStages, EqBand, EqControls, FilterCell, FilterState, GainCell,
    GraphTopology, LimiterPolicy, RenderCounts, RenderStats, RingBuffer, SampleClock,
    SidechainConfig, SidechainController, SignalGraph, Stage, StageId,
};
use parking_lot::Mutex;

use crate::backend::AudioBackend;
use crate::cpal_backend::CpalBackend;
use crate::input::{CaptureLevelSource, DeviceInput, RenderWiring};
use crate::Result;

/// A running capture-and-analysis session.
///
/// Setters take effect on the next render block. Topology changes
/// ([`change_input`](Self::change_input), dynamic stages) briefly stop audio.
/// Dropping the engine closes every stream and stops both workers.
pub struct Engine {
    backend: Arc<dyn AudioBackend>,
    graph: Arc<Mutex<SignalGraph>>,
    bypass: Arc<BypassFlags>,
    wiring: RenderWiring,
    ring: Arc<RingBuffer>,
    stats: Arc<RenderStats>,
    eq: Arc<EqControls>,
    filter: Arc<FilterCell>,
    sidechain: SidechainController,
    spectrum: SpectrumMonitor,
    buffer_frames: u32,
}

impl Engine {
    /// Start on the default cpal host.
    pub fn start(config: EngineConfig) -> Result<Self> {
        Self::with_backend(config, Arc::new(CpalBackend::new()))
    }

    /// Start on `backend`.
    pub fn with_backend(config: EngineConfig, backend: Arc<dyn AudioBackend>) -> Result<Self> {
        config.validate()?;
        let channels = usize::from(config.audio.channels);
        let buffer_frames = config.audio.buffer_frames;

        let ring = Arc::new(RingBuffer::new(channels, config.ring_capacity()));
        let stats = Arc::new(RenderStats::default());
        let eq = Arc::new(EqControls::new());
        let filter = Arc::new(FilterCell::default());
        let ducking = Arc::new(GainCell::unbounded(0.0));

        let stages = ChainStages::standard(
            Arc::clone(&eq),
            Arc::clone(&filter),
            Arc::clone(&ducking),
            LimiterPolicy::brickwall(),
        );
        let format = AudioFormat::new(
            config.audio.sample_rate as f32,
            channels,
            buffer_frames as usize,
        );
        let mut graph = SignalGraph::new(format, stages);
        graph.connect_chain()?;
        let bypass = graph.bypass_flags();
        let graph = Arc::new(Mutex::new(graph));

        let wiring = RenderWiring::new(
            &graph,
            Arc::clone(&ring),
            Arc::new(SampleClock::new()),
            Arc::clone(&stats),
            buffer_frames as usize,
        );

        let spectrum = SpectrumMonitor::start(config.spectrum_config(), Arc::clone(&ring))?;
        let level = CaptureLevelSource::new(
            Arc::clone(&backend),
            config.sidechain.device.clone(),
            buffer_frames,
        );
        let sidechain =
            SidechainController::new(Box::new(level), ducking, config.sidechain_tick_seconds());

        let mut engine = Self {
            backend,
            graph,
            bypass,
            wiring,
            ring,
            stats,
            eq,
            filter,
            sidechain,
            spectrum,
            buffer_frames,
        };
        engine.apply_controls(&config.controls);
        engine.change_input(config.audio.input_device.as_deref())?;
        engine.set_sidechain_config(config.sidechain_config())?;

        tracing::info!(
            backend = engine.backend.name(),
            ring_frames = engine.ring.capacity(),
            channels,
            "engine started"
        );
        Ok(engine)
    }

    /// Apply a `[controls]` section.
    pub fn apply_controls(&self, controls: &ControlsSection) {
        self.set_filter_knob(controls.filter_knob);
        self.set_eq_gain(EqBand::Bass, controls.bass_db);
        self.set_eq_gain(EqBand::Mid, controls.mid_db);
        self.set_eq_gain(EqBand::Treble, controls.treble_db);
        self.set_limiter_enabled(controls.limiter_enabled);
    }

    /// Move the DJ filter knob (`0.5` bypasses). Returns the mapped state.
    pub fn set_filter_knob(&self, value: f32) -> FilterState {
        self.filter.set_knob(value)
    }

    /// Set an EQ band's gain in dB.
    pub fn set_eq_gain(&self, band: EqBand, db: f32) {
        self.eq.set_gain(band, db);
    }

    /// Kill or restore an EQ band.
    pub fn set_eq_kill(&self, band: EqBand, kill: bool) {
        self.eq.set_kill(band, kill);
    }

    /// Enable or bypass the brickwall limiter.
    pub fn set_limiter_enabled(&self, enabled: bool) {
        self.bypass.set(StageId::Limiter, !enabled);
    }

    /// Replace the ducking settings; `enabled` starts or stops the worker.
    pub fn set_sidechain_config(&mut self, config: SidechainConfig) -> Result<()> {
        self.sidechain.set_config(config)?;
        Ok(())
    }

    /// Current ducking settings.
    pub fn sidechain_config(&self) -> SidechainConfig {
        self.sidechain.config()
    }

    /// Gain the ducker is applying, in dB.
    pub fn sidechain_gain_db(&self) -> f32 {
        self.sidechain.current_gain_db()
    }

    /// Rebind the chain to `device` (system default if `None`).
    ///
    /// On failure the previous input keeps running.
    pub fn change_input(&self, device: Option<&str>) -> Result<()> {
        let input = DeviceInput::resolve(
            Arc::clone(&self.backend),
            device,
            self.buffer_frames,
            self.wiring.clone(),
        )
        .map_err(|e| deepeye_core::GraphError::InputSwitchFailed {
            device: device.unwrap_or("default").to_owned(),
            reason: e.to_string(),
        })?;
        self.graph.lock().change_input(Box::new(input))?;
        Ok(())
    }

    /// Splice a stage between the filter and the ducking gain, replacing any
    /// previous one.
    pub fn insert_dynamic_stage(&self, stage: Box<dyn Stage>) -> Result<()> {
        self.graph.lock().insert_dynamic_stage(stage)?;
        Ok(())
    }

    /// Remove the dynamic stage. Returns whether one was attached.
    pub fn remove_dynamic_stage(&self) -> bool {
        self.graph.lock().remove_dynamic_stage()
    }

    /// Newest complete spectrum frame.
    pub fn latest_spectrum(&self) -> Arc<SpectrumFrame> {
        self.spectrum.latest()
    }

    /// Shared spectrum slot for a display thread.
    pub fn spectrum_frames(&self) -> FrameSlot {
        self.spectrum.frames()
    }

    /// End time of the newest sample in the ring.
    pub fn last_sample_time(&self) -> Option<i64> {
        self.ring.last_sample_time()
    }

    /// The processed-signal ring.
    pub fn ring(&self) -> Arc<RingBuffer> {
        Arc::clone(&self.ring)
    }

    /// Stage and connection snapshot.
    pub fn topology(&self) -> GraphTopology {
        self.graph.lock().topology()
    }

    /// Negotiated chain format.
    pub fn format(&self) -> AudioFormat {
        self.graph.lock().format()
    }

    /// Name of the bound capture device.
    pub fn input_name(&self) -> Option<String> {
        self.graph.lock().input_name().map(str::to_owned)
    }

    /// Render counters.
    pub fn render_counts(&self) -> RenderCounts {
        self.stats.snapshot()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.sidechain.disable();
        self.graph.lock().shutdown();
        tracing::info!(counts = ?self.stats.snapshot(), "engine stopped");
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("backend", &self.backend.name())
            .field("ring_frames", &self.ring.capacity())
            .field("sidechain", &self.sidechain)
            .field("spectrum", &self.spectrum)
            .finish_non_exhaustive()
    }
}
