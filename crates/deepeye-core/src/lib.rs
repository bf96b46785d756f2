//! DeepEye Core - the real-time signal path
//!
//! Everything between a capture device's render callback and the threads that
//! watch the processed signal: the lock-free sample ring, the processing
//! chain and its topology, parameter mapping and the sidechain ducker.
//!
//! # Components
//!
//! ## Buffering
//!
//! - [`RingBuffer`] - planar multi-channel ring addressed by absolute sample
//!   time; one writer, many readers, no locks
//!
//! ## Parameter mapping
//!
//! - [`map_filter`] / [`FilterState`] - single DJ-filter knob to mode + cutoff
//! - [`FilterCell`], [`AtomicF32`] - single-writer atomic slots read by the
//!   render context
//! - [`LimiterPolicy`] - fixed brickwall settings
//! - [`ControlMap`] - controller positions to EQ gain
//!
//! ## Sidechain
//!
//! - [`EnvelopeFollower`] - thresholded level to a smoothed gain in dB
//! - [`SidechainController`] - level source + worker + gain sink lifecycle
//!
//! ## Graph
//!
//! - [`Stage`] - capability interface (`prepare` / `process` / `teardown`)
//! - [`SignalGraph`] - `input → EQ → filter → [dynamic] → sidechain gain →
//!   limiter → output`, with input switching and dynamic stage splicing
//! - [`RenderContext`] - the render callback body, wired by explicit handles
//!
//! ## Support
//!
//! - [`PeriodicWorker`] - fixed-cadence thread for analysis and control ticks
//! - [`kernels`] - biquad and dynamics processors behind the built-in stages
//!
//! # Threads
//!
//! | Context | Runs | May block |
//! |---------|------|-----------|
//! | render | [`RenderContext::render`], [`SignalGraph::process`] | never |
//! | analysis worker | ring reads | never waits on render |
//! | control worker | [`EnvelopeFollower::tick`] | on its own source only |
//! | control thread | topology changes, setters | yes (stops audio) |
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use deepeye_core::*;
//!
//! let eq = Arc::new(EqControls::new());
//! let filter = Arc::new(FilterCell::default());
//! let ducking = Arc::new(GainCell::unbounded(0.0));
//!
//! let stages =
//!     ChainStages::standard(eq, Arc::clone(&filter), ducking, LimiterPolicy::brickwall());
//! let mut graph = SignalGraph::new(AudioFormat::new(48000.0, 2, 256), stages);
//! graph.connect_chain().unwrap();
//!
//! filter.set_knob(0.2);
//! let mut block = PlanarBlock::from_planes(vec![vec![0.1; 256], vec![0.1; 256]]);
//! graph.process(&mut block);
//! ```

pub mod filter_map;
pub mod graph;
pub mod kernels;
pub mod limiter;
pub mod math;
pub mod param;
pub mod render;
pub mod ring_buffer;
pub mod sidechain;
pub mod stage;
pub mod stages;
pub mod worker;

pub use filter_map::{
    BANDWIDTH_OCTAVES, DEADBAND_HIGH, DEADBAND_LOW, FilterCell, FilterMode, FilterState,
    map_filter,
};
pub use graph::{
    BypassFlags, ChainStages, Connection, GraphError, GraphTopology, InputEndpoint, SignalGraph,
    StageDescriptor, StageId,
};
pub use limiter::LimiterPolicy;
pub use math::{db_to_linear, flush_denormal, linear_to_db, power_to_db};
pub use param::{AtomicF32, SmoothedParam};
pub use render::{RenderContext, RenderCounts, RenderStats, SampleClock};
pub use ring_buffer::{RingBuffer, RingError};
pub use sidechain::{
    DEFAULT_TICK_SECONDS, EnvelopeFollower, GainCell, LevelSource, MIN_TIME_CONSTANT,
    SILENCE_DB, SidechainConfig, SidechainController, SidechainError,
};
pub use stage::{AudioFormat, PlanarBlock, Stage, StageError};
pub use stages::{
    ControlMap, EQ_MAX_DB, EQ_MIN_DB, EqBand, EqControls, EqStage, FilterStage, LimiterStage,
    SidechainGainStage,
};
pub use worker::PeriodicWorker;
