//! The fixed processing chain and its topology mutations.
//!
//! ```text
//! Input → EQ → Filter → [Dynamic] → SidechainGain → Limiter → Output
//! ```
//!
//! `SignalGraph` is owned by the control side behind a mutex that the render
//! context only ever `try_lock`s. Every topology mutation follows the same
//! discipline: clear the shared `running` flag, mutate, re-prepare what
//! changed, set `running` again. While `running` is false the render context
//! outputs silence. A mutation that fails leaves the previous wiring in
//! place and the graph usable for the next call.
//!
//! Bypass flags live outside the mutex ([`BypassFlags`]) so toggling a stage
//! never stalls audio.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filter_map::FilterCell;
use crate::limiter::LimiterPolicy;
use crate::sidechain::GainCell;
use crate::stage::{AudioFormat, PlanarBlock, Stage, StageError};
use crate::stages::{EqControls, EqStage, FilterStage, LimiterStage, SidechainGainStage};

/// Position of a stage in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageId {
    /// Capture endpoint.
    Input,
    /// Three-band EQ.
    Eq,
    /// Sweep filter.
    Filter,
    /// Sidechain ducking gain.
    SidechainGain,
    /// Output limiter.
    Limiter,
    /// Optional externally supplied stage between filter and sidechain gain.
    Dynamic,
    /// Final sink.
    Output,
}

impl StageId {
    const COUNT: usize = 7;

    fn index(self) -> usize {
        match self {
            Self::Input => 0,
            Self::Eq => 1,
            Self::Filter => 2,
            Self::SidechainGain => 3,
            Self::Limiter => 4,
            Self::Dynamic => 5,
            Self::Output => 6,
        }
    }
}

/// Errors from topology mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The new input could not be bound; the previous input is still active.
    #[error("failed to switch input to '{device}': {reason}")]
    InputSwitchFailed {
        /// Name of the endpoint that was rejected.
        device: String,
        /// What went wrong.
        reason: String,
    },
    /// A dynamic stage rejected the graph's format.
    #[error("failed to attach stage '{stage}': {reason}")]
    AttachFailed {
        /// Name of the stage that was rejected.
        stage: String,
        /// What went wrong.
        reason: String,
    },
    /// The chain has not been connected yet.
    #[error("graph is not connected")]
    NotConnected,
    /// The chain could not be brought back up; it stays stopped.
    #[error("restart failed: {0}")]
    RestartFailed(String),
}

/// A capture endpoint the graph can be bound to.
///
/// Device selection is external; the graph only drives the lifecycle.
pub trait InputEndpoint: Send {
    /// Display name (device name).
    fn name(&self) -> &str;

    /// Format the endpoint will deliver once opened.
    fn format(&self) -> Result<AudioFormat, StageError>;

    /// Start delivering audio.
    fn open(&mut self) -> Result<(), StageError>;

    /// Stop delivering audio and release the device.
    fn close(&mut self);
}

/// Per-stage bypass switches, shared with whoever controls them.
#[derive(Debug, Default)]
pub struct BypassFlags {
    flags: [AtomicBool; StageId::COUNT],
}

impl BypassFlags {
    /// Bypass or re-enable a stage. Input and Output cannot be bypassed.
    pub fn set(&self, id: StageId, bypassed: bool) {
        if matches!(id, StageId::Input | StageId::Output) {
            return;
        }
        self.flags[id.index()].store(bypassed, Ordering::Release);
    }

    /// Whether a stage is bypassed.
    #[inline]
    pub fn get(&self, id: StageId) -> bool {
        self.flags[id.index()].load(Ordering::Acquire)
    }
}

/// One stage in a [`GraphTopology`] snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDescriptor {
    /// Chain position.
    pub id: StageId,
    /// Stage or device name.
    pub name: String,
    /// Bypass state at snapshot time.
    pub bypassed: bool,
}

/// A directed link between two stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    /// Upstream stage.
    pub from: StageId,
    /// Downstream stage.
    pub to: StageId,
}

/// Snapshot of the chain for inspection and comparison.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GraphTopology {
    /// Stages in signal order.
    pub stages: Vec<StageDescriptor>,
    /// Links in signal order; empty until connected.
    pub connections: Vec<Connection>,
}

impl GraphTopology {
    /// Whether a stage with this id is present.
    pub fn contains(&self, id: StageId) -> bool {
        self.stages.iter().any(|s| s.id == id)
    }
}

/// The four fixed processing stages.
pub struct ChainStages {
    /// EQ stage.
    pub eq: Box<dyn Stage>,
    /// Sweep filter stage.
    pub filter: Box<dyn Stage>,
    /// Sidechain gain stage.
    pub sidechain_gain: Box<dyn Stage>,
    /// Limiter stage.
    pub limiter: Box<dyn Stage>,
}

impl ChainStages {
    /// The built-in stages wired to their control handles.
    pub fn standard(
        eq: Arc<EqControls>,
        filter: Arc<FilterCell>,
        sidechain: Arc<GainCell>,
        limiter: LimiterPolicy,
    ) -> Self {
        Self {
            eq: Box::new(EqStage::new(eq)),
            filter: Box::new(FilterStage::new(filter)),
            sidechain_gain: Box::new(SidechainGainStage::new(sidechain)),
            limiter: Box::new(LimiterStage::new(limiter)),
        }
    }
}

/// Owner of the processing chain.
pub struct SignalGraph {
    base_format: AudioFormat,
    format: AudioFormat,
    input: Option<Box<dyn InputEndpoint>>,
    stages: ChainStages,
    dynamic: Option<Box<dyn Stage>>,
    bypass: Arc<BypassFlags>,
    running: Arc<AtomicBool>,
    connections: Vec<Connection>,
}

impl SignalGraph {
    /// Create an unconnected graph.
    ///
    /// `format` fixes the channel count and maximum block size; the sample
    /// rate is replaced by the input endpoint's when one is bound.
    pub fn new(format: AudioFormat, stages: ChainStages) -> Self {
        Self {
            base_format: format,
            format,
            input: None,
            stages,
            dynamic: None,
            bypass: Arc::new(BypassFlags::default()),
            running: Arc::new(AtomicBool::new(false)),
            connections: Vec::new(),
        }
    }

    /// Bind the initial input before [`connect_chain`](Self::connect_chain).
    pub fn with_input(mut self, input: Box<dyn InputEndpoint>) -> Self {
        self.input = Some(input);
        self
    }

    /// Wire `input → EQ → filter → sidechain gain → limiter → output`,
    /// prepare every stage with the negotiated format and start.
    pub fn connect_chain(&mut self) -> Result<(), GraphError> {
        self.stop();

        let format = match self.input.as_ref() {
            Some(input) => {
                let device = input.name().to_owned();
                let fmt = input
                    .format()
                    .map_err(|e| GraphError::InputSwitchFailed {
                        device,
                        reason: e.to_string(),
                    })?;
                self.negotiate(&fmt)
            }
            None => self.base_format,
        };

        self.prepare_all(&format)
            .map_err(|e| GraphError::RestartFailed(e.to_string()))?;

        if let Some(input) = self.input.as_mut()
            && let Err(e) = input.open()
        {
            return Err(GraphError::InputSwitchFailed {
                device: input.name().to_owned(),
                reason: e.to_string(),
            });
        }

        self.format = format;
        self.rewire();
        self.start();

        #[cfg(feature = "tracing")]
        tracing::info!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            input = self.input_name(),
            "signal chain connected"
        );
        Ok(())
    }

    /// Rebind the capture endpoint.
    ///
    /// Either the new input is fully bound and the chain re-prepared for its
    /// format, or the previous input and every connection stay exactly as
    /// they were and `InputSwitchFailed` is returned.
    pub fn change_input(&mut self, mut input: Box<dyn InputEndpoint>) -> Result<(), GraphError> {
        if self.connections.is_empty() {
            return Err(GraphError::NotConnected);
        }
        let device = input.name().to_owned();
        let fail = |reason: String| GraphError::InputSwitchFailed {
            device: device.clone(),
            reason,
        };

        self.stop();

        let format = match input.format() {
            Ok(fmt) => self.negotiate(&fmt),
            Err(e) => {
                self.start();
                return Err(fail(e.to_string()));
            }
        };

        if format != self.format
            && let Err(e) = self.prepare_all(&format)
        {
            let previous = self.format;
            let restored = self.prepare_all(&previous);
            self.start_if(restored.is_ok());
            return Err(fail(e.to_string()));
        }

        if let Err(e) = input.open() {
            if format != self.format {
                let previous = self.format;
                let restored = self.prepare_all(&previous);
                self.start_if(restored.is_ok());
            } else {
                self.start();
            }
            return Err(fail(e.to_string()));
        }

        if let Some(mut old) = self.input.replace(input) {
            old.close();
        }
        self.format = format;
        self.reset_all();
        self.rewire();
        self.start();

        #[cfg(feature = "tracing")]
        tracing::info!(device = %device, sample_rate = format.sample_rate, "input switched");
        Ok(())
    }

    /// Splice a stage between the filter and the sidechain gain.
    ///
    /// The new stage is prepared before anything else changes. If that
    /// fails it is torn down, `AttachFailed` is returned and any stage
    /// already attached keeps running. Otherwise the previous stage is torn
    /// down and replaced.
    pub fn insert_dynamic_stage(&mut self, mut stage: Box<dyn Stage>) -> Result<(), GraphError> {
        if self.connections.is_empty() {
            return Err(GraphError::NotConnected);
        }
        self.stop();

        if let Err(e) = stage.prepare(&self.format) {
            let name = stage.name().to_owned();
            stage.teardown();
            self.start();
            return Err(GraphError::AttachFailed {
                stage: name,
                reason: e.to_string(),
            });
        }

        #[cfg(feature = "tracing")]
        tracing::info!(stage = stage.name(), "dynamic stage attached");

        if let Some(mut old) = self.dynamic.replace(stage) {
            old.teardown();
        }
        self.bypass.set(StageId::Dynamic, false);
        self.rewire();
        self.start();
        Ok(())
    }

    /// Remove the dynamic stage, restoring the direct filter link.
    ///
    /// Returns whether a stage was removed.
    pub fn remove_dynamic_stage(&mut self) -> bool {
        let Some(mut stage) = self.dynamic.take() else {
            return false;
        };
        self.stop();
        stage.teardown();
        self.bypass.set(StageId::Dynamic, false);
        self.rewire();
        self.start();

        #[cfg(feature = "tracing")]
        tracing::info!(stage = stage.name(), "dynamic stage removed");
        true
    }

    /// Enable or bypass one stage without touching the wiring.
    pub fn set_bypass(&self, id: StageId, bypassed: bool) {
        self.bypass.set(id, bypassed);
    }

    /// Shared handle to the bypass switches.
    pub fn bypass_flags(&self) -> Arc<BypassFlags> {
        Arc::clone(&self.bypass)
    }

    /// Snapshot of stages and connections.
    pub fn topology(&self) -> GraphTopology {
        let stages = self
            .order()
            .into_iter()
            .map(|id| StageDescriptor {
                id,
                name: self.stage_name(id).to_owned(),
                bypassed: self.bypass.get(id),
            })
            .collect();
        GraphTopology {
            stages,
            connections: self.connections.clone(),
        }
    }

    /// Run one block through the chain in place.
    ///
    /// Called from the render context: never allocates or blocks. Outputs
    /// silence while the graph is stopped.
    pub fn process(&mut self, block: &mut PlanarBlock) {
        if !self.is_running() {
            block.silence();
            return;
        }
        let bypass = &self.bypass;
        let run = |id: StageId, stage: &mut Box<dyn Stage>, block: &mut PlanarBlock| {
            if !bypass.get(id) {
                stage.process(block);
            }
        };
        run(StageId::Eq, &mut self.stages.eq, block);
        run(StageId::Filter, &mut self.stages.filter, block);
        if let Some(dynamic) = self.dynamic.as_mut() {
            run(StageId::Dynamic, dynamic, block);
        }
        run(StageId::SidechainGain, &mut self.stages.sidechain_gain, block);
        run(StageId::Limiter, &mut self.stages.limiter, block);
    }

    /// Negotiated format.
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Whether audio is flowing.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Name of the bound input, if any.
    pub fn input_name(&self) -> Option<&str> {
        self.input.as_deref().map(InputEndpoint::name)
    }

    /// Stop, close the input and tear every stage down.
    pub fn shutdown(&mut self) {
        self.stop();
        if let Some(mut input) = self.input.take() {
            input.close();
        }
        if let Some(mut stage) = self.dynamic.take() {
            stage.teardown();
        }
        for stage in self.fixed_stages_mut() {
            stage.teardown();
        }
        self.connections.clear();
    }

    fn negotiate(&self, input: &AudioFormat) -> AudioFormat {
        AudioFormat {
            sample_rate: input.sample_rate,
            ..self.base_format
        }
    }

    fn prepare_all(&mut self, format: &AudioFormat) -> Result<(), StageError> {
        format.validate()?;
        for stage in self.fixed_stages_mut() {
            stage.prepare(format)?;
        }
        if let Some(stage) = self.dynamic.as_mut() {
            stage.prepare(format)?;
        }
        Ok(())
    }

    // Filter and envelope history belongs to the previous device.
    fn reset_all(&mut self) {
        for stage in self.fixed_stages_mut() {
            stage.reset();
        }
        if let Some(stage) = self.dynamic.as_mut() {
            stage.reset();
        }
    }

    fn fixed_stages_mut(&mut self) -> [&mut Box<dyn Stage>; 4] {
        [
            &mut self.stages.eq,
            &mut self.stages.filter,
            &mut self.stages.sidechain_gain,
            &mut self.stages.limiter,
        ]
    }

    fn order(&self) -> Vec<StageId> {
        let mut order = vec![StageId::Input, StageId::Eq, StageId::Filter];
        if self.dynamic.is_some() {
            order.push(StageId::Dynamic);
        }
        order.extend([StageId::SidechainGain, StageId::Limiter, StageId::Output]);
        order
    }

    fn rewire(&mut self) {
        self.connections = self
            .order()
            .windows(2)
            .map(|pair| Connection {
                from: pair[0],
                to: pair[1],
            })
            .collect();
    }

    fn stage_name(&self, id: StageId) -> &str {
        match id {
            StageId::Input => self.input_name().unwrap_or("input"),
            StageId::Eq => self.stages.eq.name(),
            StageId::Filter => self.stages.filter.name(),
            StageId::SidechainGain => self.stages.sidechain_gain.name(),
            StageId::Limiter => self.stages.limiter.name(),
            StageId::Dynamic => self.dynamic.as_deref().map_or("dynamic", |s| s.name()),
            StageId::Output => "output",
        }
    }

    fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    fn start(&self) {
        self.start_if(true);
    }

    fn start_if(&self, ok: bool) {
        if ok && !self.connections.is_empty() {
            self.running.store(true, Ordering::Release);
        }
    }
}

impl std::fmt::Debug for SignalGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalGraph")
            .field("format", &self.format)
            .field("input", &self.input_name())
            .field("dynamic", &self.dynamic.as_deref().map(|s| s.name()))
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
