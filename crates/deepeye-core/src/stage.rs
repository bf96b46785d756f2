//! The stage capability shared by built-in and dynamically attached stages.
//!
//! A stage is anything that can be prepared for a format, process planar
//! blocks in place, and be torn down. The signal graph only ever sees
//! `Box<dyn Stage>`; it never needs to know what kind of processor sits
//! behind one.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stream format negotiated when the chain is connected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate in Hz.
    pub sample_rate: f32,
    /// Channels processed by the chain.
    pub channels: usize,
    /// Largest block the render context will hand to `process`.
    pub max_block_frames: usize,
}

impl AudioFormat {
    /// Create a format.
    pub fn new(sample_rate: f32, channels: usize, max_block_frames: usize) -> Self {
        Self {
            sample_rate,
            channels,
            max_block_frames,
        }
    }

    /// Check that the format can drive a chain.
    pub fn validate(&self) -> Result<(), StageError> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(StageError::UnsupportedFormat(format!(
                "sample rate {} Hz",
                self.sample_rate
            )));
        }
        if self.channels == 0 {
            return Err(StageError::UnsupportedFormat("zero channels".into()));
        }
        if self.max_block_frames == 0 {
            return Err(StageError::UnsupportedFormat("zero-length blocks".into()));
        }
        Ok(())
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::new(48000.0, 2, 512)
    }
}

/// Why a stage or endpoint could not be brought up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    /// The stage cannot run at this format.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    /// Device or resource could not be acquired.
    #[error("unavailable: {0}")]
    Unavailable(String),
    /// Any other preparation failure.
    #[error("{0}")]
    Failed(String),
}

/// Preallocated planar audio: one contiguous plane per channel.
///
/// Planes are sized to a fixed capacity at construction; `frames` says how
/// much of each plane is live for the current block.
#[derive(Debug, Clone)]
pub struct PlanarBlock {
    planes: Vec<Vec<f32>>,
    frames: usize,
}

impl PlanarBlock {
    /// Allocate `channels` planes of `capacity` frames, all silent.
    pub fn new(channels: usize, capacity: usize) -> Self {
        Self {
            planes: vec![vec![0.0; capacity]; channels],
            frames: 0,
        }
    }

    /// Build a block from existing planes (test and offline helper).
    pub fn from_planes(planes: Vec<Vec<f32>>) -> Self {
        let frames = planes.iter().map(Vec::len).min().unwrap_or(0);
        Self { planes, frames }
    }

    /// Number of planes.
    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    /// Live frames in the current block.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Maximum frames per plane.
    pub fn capacity(&self) -> usize {
        self.planes.first().map_or(0, Vec::len)
    }

    /// Set the live length, clamped to capacity.
    pub fn set_frames(&mut self, frames: usize) {
        self.frames = frames.min(self.capacity());
    }

    /// Live part of one channel.
    #[inline]
    pub fn plane(&self, channel: usize) -> &[f32] {
        &self.planes[channel][..self.frames]
    }

    /// Mutable live part of one channel.
    #[inline]
    pub fn plane_mut(&mut self, channel: usize) -> &mut [f32] {
        let frames = self.frames;
        &mut self.planes[channel][..frames]
    }

    /// Iterate the live part of every channel.
    pub fn planes(&self) -> impl Iterator<Item = &[f32]> {
        let frames = self.frames;
        self.planes.iter().map(move |p| &p[..frames])
    }

    /// Iterate the live part of every channel mutably.
    pub fn planes_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        let frames = self.frames;
        self.planes.iter_mut().map(move |p| &mut p[..frames])
    }

    /// Full-capacity planes, suitable for [`RingBuffer::write`](crate::RingBuffer::write),
    /// which only reads the first `frames` samples of each.
    pub fn raw_planes(&self) -> &[Vec<f32>] {
        &self.planes
    }

    /// Zero the live frames.
    pub fn silence(&mut self) {
        for plane in self.planes_mut() {
            plane.fill(0.0);
        }
    }

    /// Fill from an interleaved device buffer with `src_channels` channels.
    ///
    /// Mono input is copied to every plane; channels beyond the block's count
    /// are dropped; missing channels are silent. Returns the frame count.
    pub fn deinterleave_from(&mut self, interleaved: &[f32], src_channels: usize) -> usize {
        let src_channels = src_channels.max(1);
        let frames = (interleaved.len() / src_channels).min(self.capacity());
        self.frames = frames;
        for (ch, plane) in self.planes.iter_mut().enumerate() {
            let src_ch = if src_channels == 1 {
                Some(0)
            } else {
                (ch < src_channels).then_some(ch)
            };
            match src_ch {
                Some(src_ch) => {
                    for (i, s) in plane[..frames].iter_mut().enumerate() {
                        *s = interleaved[i * src_channels + src_ch];
                    }
                }
                None => plane[..frames].fill(0.0),
            }
        }
        frames
    }
}

/// Capability interface for anything spliced into the signal graph.
///
/// `prepare` and `teardown` run on the control thread while the render
/// context is stopped and may allocate. `process` and `reset` run on the
/// render context and must not allocate, lock or block.
pub trait Stage: Send {
    /// Short display name.
    fn name(&self) -> &str;

    /// Configure for `format`. Called on every (re)connection.
    fn prepare(&mut self, format: &AudioFormat) -> Result<(), StageError>;

    /// Process one block in place.
    fn process(&mut self, block: &mut PlanarBlock);

    /// Release resources before the stage is dropped from the graph.
    fn teardown(&mut self) {}

    /// Clear internal state (delay lines, envelopes).
    fn reset(&mut self) {}
}
