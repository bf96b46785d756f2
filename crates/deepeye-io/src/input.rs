//! Capture endpoints: the graph's input and the sidechain meter.

use std::sync::{Arc, Weak};

use deepeye_analysis::RingLevelMeter;
use deepeye_core::{
    AudioFormat, InputEndpoint, LevelSource, RenderContext, RenderStats, RingBuffer, SampleClock,
    SignalGraph, StageError,
};
use parking_lot::Mutex;

use crate::backend::{AudioBackend, BackendStreamConfig, StreamHandle};
use crate::Result;

/// Handles a device callback needs to build its [`RenderContext`].
///
/// The wiring holds the graph weakly, so an input that is resolved but never
/// opened does not keep the graph alive. An open stream's callback owns a
/// [`RenderContext`] with a strong reference, which forms the cycle
/// graph → input → stream → callback → graph. Closing the input breaks it;
/// [`SignalGraph::shutdown`] does that, and the engine calls it on drop.
#[derive(Debug, Clone)]
pub struct RenderWiring {
    graph: Weak<Mutex<SignalGraph>>,
    ring: Arc<RingBuffer>,
    clock: Arc<SampleClock>,
    stats: Arc<RenderStats>,
    max_block_frames: usize,
}

impl RenderWiring {
    /// Bundle the render handles.
    pub fn new(
        graph: &Arc<Mutex<SignalGraph>>,
        ring: Arc<RingBuffer>,
        clock: Arc<SampleClock>,
        stats: Arc<RenderStats>,
        max_block_frames: usize,
    ) -> Self {
        Self {
            graph: Arc::downgrade(graph),
            ring,
            clock,
            stats,
            max_block_frames,
        }
    }

    /// A fresh render context, or `None` once the graph is gone.
    pub fn context(&self) -> Option<RenderContext> {
        let graph = self.graph.upgrade()?;
        Some(RenderContext::new(
            graph,
            Arc::clone(&self.ring),
            Arc::clone(&self.clock),
            Arc::clone(&self.stats),
            self.max_block_frames,
        ))
    }
}

/// A capture device bound to the signal graph.
///
/// Opening builds a stream whose callback runs the graph and writes the
/// ring; closing drops the stream.
pub struct DeviceInput {
    name: String,
    backend: Arc<dyn AudioBackend>,
    config: BackendStreamConfig,
    wiring: RenderWiring,
    stream: Option<StreamHandle>,
}

impl DeviceInput {
    /// Resolve `device` (default input if `None`) on `backend`.
    pub fn resolve(
        backend: Arc<dyn AudioBackend>,
        device: Option<&str>,
        buffer_frames: u32,
        wiring: RenderWiring,
    ) -> Result<Self> {
        let config = backend.resolve_input(device, buffer_frames)?;
        let name = config
            .device_name
            .clone()
            .unwrap_or_else(|| "default".to_owned());
        Ok(Self {
            name,
            backend,
            config,
            wiring,
            stream: None,
        })
    }
}

impl InputEndpoint for DeviceInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self) -> std::result::Result<AudioFormat, StageError> {
        let format = AudioFormat::new(
            self.config.sample_rate as f32,
            usize::from(self.config.channels),
            self.config.buffer_size as usize,
        );
        format.validate()?;
        Ok(format)
    }

    fn open(&mut self) -> std::result::Result<(), StageError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let mut ctx = self
            .wiring
            .context()
            .ok_or_else(|| StageError::Unavailable("engine is shutting down".into()))?;
        let channels = usize::from(self.config.channels);
        let device = self.name.clone();

        let stream = self
            .backend
            .build_input_stream(
                &self.config,
                Box::new(move |data: &[f32]| ctx.render(data, channels)),
                Box::new(move |err: &str| {
                    tracing::warn!(device = %device, error = err, "input stream error");
                }),
            )
            .map_err(|e| StageError::Unavailable(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!(device = %self.name, "input stream closed");
        }
    }
}

impl std::fmt::Debug for DeviceInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceInput")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("open", &self.stream.is_some())
            .finish()
    }
}

/// Sidechain level source metering a second capture device.
///
/// The device is captured only between [`start`](LevelSource::start) and
/// [`stop`](LevelSource::stop). Its audio is downmixed to mono into a private
/// ring that a [`RingLevelMeter`] polls.
pub struct CaptureLevelSource {
    backend: Arc<dyn AudioBackend>,
    device: Option<String>,
    buffer_frames: u32,
    ring: Arc<RingBuffer>,
    meter: RingLevelMeter,
    stream: Option<StreamHandle>,
}

impl CaptureLevelSource {
    /// Meter `device` (default input if `None`). Nothing is opened until
    /// the sidechain starts.
    pub fn new(backend: Arc<dyn AudioBackend>, device: Option<String>, buffer_frames: u32) -> Self {
        // One second at 48 kHz is plenty between 50 ms polls.
        let ring = Arc::new(RingBuffer::new(1, 48000));
        let meter = RingLevelMeter::new(Arc::clone(&ring));
        Self {
            backend,
            device,
            buffer_frames,
            ring,
            meter,
            stream: None,
        }
    }

    fn open(&mut self) -> Result<()> {
        let config = self
            .backend
            .resolve_input(self.device.as_deref(), self.buffer_frames)?;
        let channels = usize::from(config.channels.max(1));
        let ring = Arc::clone(&self.ring);
        let mut time = ring.last_sample_time().unwrap_or(0);
        let mut mono = vec![0.0_f32; config.buffer_size.max(1) as usize];

        let callback = Box::new(move |data: &[f32]| {
            for chunk in data.chunks(mono.len() * channels) {
                let frames = chunk.len() / channels;
                for (out, frame) in mono.iter_mut().zip(chunk.chunks_exact(channels)) {
                    *out = frame.iter().sum::<f32>() / channels as f32;
                }
                let end = time + frames as i64;
                if frames > 0 && ring.write(&[&mono[..frames]], time, end).is_ok() {
                    time = end;
                }
            }
        });
        let device = config
            .device_name
            .clone()
            .unwrap_or_else(|| "default".to_owned());
        let stream = self.backend.build_input_stream(
            &config,
            callback,
            Box::new(move |err: &str| {
                tracing::warn!(device = %device, error = err, "sidechain stream error");
            }),
        )?;
        self.stream = Some(stream);
        Ok(())
    }
}

impl LevelSource for CaptureLevelSource {
    fn start(&mut self) {
        if self.stream.is_none()
            && let Err(e) = self.open()
        {
            tracing::warn!(error = %e, "sidechain device unavailable, treating as silence");
        }
        self.meter.start();
    }

    fn stop(&mut self) {
        self.meter.stop();
        self.stream = None;
    }

    fn average_power_db(&mut self) -> Option<f32> {
        self.stream.as_ref()?;
        self.meter.average_power_db()
    }
}

impl std::fmt::Debug for CaptureLevelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureLevelSource")
            .field("device", &self.device)
            .field("open", &self.stream.is_some())
            .finish_non_exhaustive()
    }
}
