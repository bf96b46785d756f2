//! The render callback body.
//!
//! [`RenderContext`] is handed every handle it needs at construction: the
//! graph, the ring, the shared sample clock and the stats counters. It
//! reaches nothing through globals.
//!
//! Per device block it:
//! 1. advances the sample clock by the block length,
//! 2. de-interleaves into preallocated planar scratch (device channels are
//!    mapped onto the ring's channel count),
//! 3. `try_lock`s the graph; if the lock is held by a topology change or
//!    the graph is stopped, the block is skipped,
//! 4. runs the chain and writes the result into the ring at the block's
//!    absolute time.
//!
//! Skipped blocks leave a gap in the ring that the next write zero-fills.
//! Nothing here allocates, blocks, logs or returns an error.

use core::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::graph::SignalGraph;
use crate::ring_buffer::RingBuffer;
use crate::stage::PlanarBlock;

/// Monotonic absolute sample-time counter shared by every render context
/// that feeds one ring.
#[derive(Debug, Default)]
pub struct SampleClock {
    next: AtomicI64,
}

impl SampleClock {
    /// Start counting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `frames` and return the start time of the reservation.
    #[inline]
    pub fn advance(&self, frames: usize) -> i64 {
        self.next.fetch_add(frames as i64, Ordering::AcqRel)
    }

    /// Next unreserved time.
    pub fn now(&self) -> i64 {
        self.next.load(Ordering::Acquire)
    }
}

/// Counters the render context bumps and the control side reads.
#[derive(Debug, Default)]
pub struct RenderStats {
    rendered: AtomicU64,
    skipped: AtomicU64,
    dropped: AtomicU64,
}

/// Plain copy of [`RenderStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderCounts {
    /// Blocks processed and written to the ring.
    pub rendered_blocks: u64,
    /// Blocks skipped because the graph was busy or stopped.
    pub skipped_blocks: u64,
    /// Blocks processed but rejected by the ring.
    pub dropped_blocks: u64,
}

impl RenderStats {
    /// Read all counters.
    pub fn snapshot(&self) -> RenderCounts {
        RenderCounts {
            rendered_blocks: self.rendered.load(Ordering::Relaxed),
            skipped_blocks: self.skipped.load(Ordering::Relaxed),
            dropped_blocks: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Everything a device callback needs to push audio through the chain.
#[derive(Debug)]
pub struct RenderContext {
    graph: Arc<Mutex<SignalGraph>>,
    ring: Arc<RingBuffer>,
    clock: Arc<SampleClock>,
    stats: Arc<RenderStats>,
    scratch: PlanarBlock,
}

impl RenderContext {
    /// Build a context with scratch for `max_block_frames` per chunk.
    ///
    /// Allocates; call on the control thread before handing the context to
    /// a device callback.
    pub fn new(
        graph: Arc<Mutex<SignalGraph>>,
        ring: Arc<RingBuffer>,
        clock: Arc<SampleClock>,
        stats: Arc<RenderStats>,
        max_block_frames: usize,
    ) -> Self {
        let scratch = PlanarBlock::new(ring.channels(), max_block_frames.max(1));
        Self {
            graph,
            ring,
            clock,
            stats,
            scratch,
        }
    }

    /// Process one interleaved device buffer with `device_channels` channels.
    ///
    /// Buffers longer than the scratch are handled in consecutive chunks.
    pub fn render(&mut self, interleaved: &[f32], device_channels: usize) {
        let device_channels = device_channels.max(1);
        let chunk = self.scratch.capacity() * device_channels;
        for piece in interleaved.chunks(chunk) {
            self.render_chunk(piece, device_channels);
        }
    }

    fn render_chunk(&mut self, interleaved: &[f32], device_channels: usize) {
        let frames = self.scratch.deinterleave_from(interleaved, device_channels);
        if frames == 0 {
            return;
        }
        let start = self.clock.advance(frames);

        let Some(mut graph) = self.graph.try_lock() else {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            return;
        };
        if !graph.is_running() {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        graph.process(&mut self.scratch);

        // Written under the graph lock so a topology change can never
        // overlap a ring write from a stale device callback.
        let counter = match self
            .ring
            .write(self.scratch.raw_planes(), start, start + frames as i64)
        {
            Ok(()) => &self.stats.rendered,
            Err(_) => &self.stats.dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        drop(graph);
    }

    /// The ring this context writes into.
    pub fn ring(&self) -> &Arc<RingBuffer> {
        &self.ring
    }
}
