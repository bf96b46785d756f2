//! WAV input for offline runs and WAV export from the ring.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

use deepeye_core::{RingBuffer, RingError};
use hound::{SampleFormat, WavReader, WavWriter};

use crate::Result;

/// WAV file specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    /// Number of audio channels.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bit depth per sample (32 means float).
    pub bits_per_sample: u16,
}

impl Default for WavSpec {
    fn default() -> Self {
        Self {
            channels: 2,
            sample_rate: 48000,
            bits_per_sample: 32,
        }
    }
}

impl From<hound::WavSpec> for WavSpec {
    fn from(spec: hound::WavSpec) -> Self {
        Self {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
        }
    }
}

impl From<WavSpec> for hound::WavSpec {
    fn from(spec: WavSpec) -> Self {
        hound::WavSpec {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
            sample_format: if spec.bits_per_sample == 32 {
                SampleFormat::Float
            } else {
                SampleFormat::Int
            },
        }
    }
}

/// Read a WAV file as interleaved f32 samples in `[-1, 1]`.
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<(Vec<f32>, WavSpec)> {
    let reader = WavReader::open(path)?;
    let spec = WavSpec::from(reader.spec());

    let samples = match reader.spec().sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };
    Ok((samples, spec))
}

/// Drains newly written ring audio into a WAV file.
///
/// Call [`poll`](Self::poll) periodically from a non-real-time thread. If the
/// recorder falls more than a ring capacity behind, the evicted audio is
/// skipped and reported as lost.
pub struct RingRecorder {
    ring: Arc<RingBuffer>,
    writer: WavWriter<BufWriter<File>>,
    cursor: Option<i64>,
    planes: Vec<Vec<f32>>,
    frames_written: u64,
    frames_lost: u64,
}

impl RingRecorder {
    /// Frames copied out of the ring per read.
    const CHUNK: usize = 4096;

    /// Create `path` and record every channel of `ring` as 32-bit float.
    ///
    /// Recording starts at the ring's current head.
    pub fn create<P: AsRef<Path>>(
        path: P,
        ring: Arc<RingBuffer>,
        sample_rate: u32,
    ) -> Result<Self> {
        let spec = WavSpec {
            channels: ring.channels() as u16,
            sample_rate,
            bits_per_sample: 32,
        };
        let writer = WavWriter::create(path, spec.into())?;
        let chunk = Self::CHUNK.min(ring.capacity());
        Ok(Self {
            cursor: ring.last_sample_time(),
            planes: vec![vec![0.0; chunk]; ring.channels()],
            ring,
            writer,
            frames_written: 0,
            frames_lost: 0,
        })
    }

    /// Copy everything written since the last poll. Returns frames written.
    pub fn poll(&mut self) -> Result<usize> {
        let Some(head) = self.ring.last_sample_time() else {
            return Ok(0);
        };
        let mut cursor = match self.cursor {
            Some(c) => c,
            None => self.ring.oldest_time().unwrap_or(head),
        };
        let chunk = self.planes.first().map_or(0, Vec::len) as i64;
        let mut written = 0;

        while cursor < head && chunk > 0 {
            let end = head.min(cursor + chunk);
            match self.ring.read(cursor, end, &mut self.planes) {
                Ok(()) => {
                    let frames = (end - cursor) as usize;
                    for i in 0..frames {
                        for plane in &self.planes {
                            self.writer.write_sample(plane[i])?;
                        }
                    }
                    written += frames;
                    cursor = end;
                }
                Err(RingError::NotAvailable) => {
                    let oldest = self.ring.oldest_time().unwrap_or(head);
                    let resume = oldest.min(head).max(cursor + 1);
                    self.frames_lost += (resume - cursor) as u64;
                    tracing::warn!(lost = resume - cursor, "recorder fell behind the ring");
                    cursor = resume;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "recorder read failed");
                    break;
                }
            }
        }

        self.cursor = Some(cursor);
        self.frames_written += written as u64;
        Ok(written)
    }

    /// Frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Frames skipped because they were evicted before being read.
    pub fn frames_lost(&self) -> u64 {
        self.frames_lost
    }

    /// Drain any remaining audio and finish the file.
    pub fn finalize(mut self) -> Result<u64> {
        self.poll()?;
        self.writer.finalize()?;
        Ok(self.frames_written)
    }
}

impl std::fmt::Debug for RingRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingRecorder")
            .field("cursor", &self.cursor)
            .field("frames_written", &self.frames_written)
            .field("frames_lost", &self.frames_lost)
            .finish_non_exhaustive()
    }
}
