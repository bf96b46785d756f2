//! Lock-free multi-channel sample ring addressed by absolute sample time.
//!
//! One writer (the render context) appends blocks tagged with the absolute
//! time range they cover. Any number of readers copy arbitrary windows out
//! by time, on their own threads, without coordinating with the writer.
//!
//! # Layout
//!
//! Planar: each channel is one contiguous plane of `capacity` slots, so a
//! single channel can be analysed without a de-interleave loop. Slot for
//! time `t` is `t mod capacity`.
//!
//! # Concurrency
//!
//! Samples are stored as `f32` bit patterns in `AtomicU32`, so concurrent
//! access is never a data race. Consistency uses seqlock-style validation:
//!
//! 1. the writer announces the end time it is about to reach (`pending`),
//!    issues a Release fence, writes samples, then publishes `head` (Release);
//! 2. a reader loads `head` (Acquire), bounds-checks, copies, issues an
//!    Acquire fence and re-reads `pending`. If the writer may have reached
//!    into the copied window in the meantime the read fails with
//!    [`RingError::NotAvailable`] and the caller retries on its next tick.
//!
//! Neither side ever blocks or allocates.

use core::sync::atomic::{AtomicI64, AtomicU32, Ordering, fence};

use thiserror::Error;

/// Sentinel for "nothing written yet".
const EMPTY: i64 = i64::MIN;

/// Errors returned by [`RingBuffer`] reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    /// The span is larger than the ring can hold.
    #[error("span exceeds ring capacity")]
    Overrun,
    /// Part of the window was evicted, is not yet written, or was
    /// overwritten while being copied.
    #[error("requested window is not available")]
    NotAvailable,
    /// Empty or reversed range, time moving backwards, or caller storage
    /// that does not match the request.
    #[error("invalid time range or buffer shape")]
    InvalidRange,
}

/// Fixed-capacity planar sample ring.
///
/// # Example
///
/// ```rust
/// use deepeye_core::{RingBuffer, RingError};
///
/// let ring = RingBuffer::new(2, 4096);
/// let left = vec![0.25_f32; 256];
/// let right = vec![-0.25_f32; 256];
/// ring.write(&[&left, &right], 0, 256).unwrap();
///
/// let mut out = vec![0.0_f32; 128];
/// ring.read_channel(1, 64, 192, &mut out).unwrap();
/// assert_eq!(out[0], -0.25);
///
/// assert_eq!(ring.read_channel(0, 200, 300, &mut out), Err(RingError::NotAvailable));
/// ```
#[derive(Debug)]
pub struct RingBuffer {
    channels: usize,
    capacity: usize,
    planes: Vec<Box<[AtomicU32]>>,
    /// End (exclusive) of the last committed write.
    head: AtomicI64,
    /// End the writer is currently working toward.
    pending: AtomicI64,
    /// Start of the very first write; nothing earlier was ever valid.
    origin: AtomicI64,
}

impl RingBuffer {
    /// Create a ring holding `capacity` frames for each of `channels`.
    ///
    /// # Panics
    ///
    /// Panics if `channels` or `capacity` is zero.
    pub fn new(channels: usize, capacity: usize) -> Self {
        assert!(channels > 0, "ring needs at least one channel");
        assert!(capacity > 0, "ring needs non-zero capacity");
        let planes = (0..channels)
            .map(|_| (0..capacity).map(|_| AtomicU32::new(0)).collect())
            .collect();
        Self {
            channels,
            capacity,
            planes,
            head: AtomicI64::new(EMPTY),
            pending: AtomicI64::new(EMPTY),
            origin: AtomicI64::new(EMPTY),
        }
    }

    /// Frames retained per channel.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Channel count fixed at construction.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// End time (exclusive) of the newest committed sample, `None` before the
    /// first write.
    pub fn write_head(&self) -> Option<i64> {
        match self.head.load(Ordering::Acquire) {
            EMPTY => None,
            t => Some(t),
        }
    }

    /// Alias of [`write_head`](Self::write_head) for consumers aligning to
    /// the most recent sample time.
    pub fn last_sample_time(&self) -> Option<i64> {
        self.write_head()
    }

    /// Oldest time that can currently be read, `None` before the first write.
    pub fn oldest_time(&self) -> Option<i64> {
        let head = self.write_head()?;
        let origin = self.origin.load(Ordering::Relaxed);
        Some(origin.max(head - self.capacity as i64))
    }

    /// Append one block covering `[start, end)`.
    ///
    /// `planes` holds one plane per channel with at least `end - start`
    /// samples each; longer planes are read from their start. Must only be
    /// called from a single writer thread.
    ///
    /// A gap between the current head and `start` is filled with silence.
    pub fn write<P: AsRef<[f32]>>(
        &self,
        planes: &[P],
        start: i64,
        end: i64,
    ) -> Result<(), RingError> {
        let len = self.check_span(start, end)?;
        if planes.len() != self.channels || planes.iter().any(|p| p.as_ref().len() < len) {
            return Err(RingError::InvalidRange);
        }

        let head = self.head.load(Ordering::Relaxed);
        if head != EMPTY && start < head {
            return Err(RingError::InvalidRange);
        }

        self.pending.store(end, Ordering::Relaxed);
        fence(Ordering::Release);

        if head == EMPTY {
            self.origin.store(start, Ordering::Relaxed);
        } else if start > head {
            let gap = ((start - head) as usize).min(self.capacity);
            for plane in &self.planes {
                self.fill_plane(plane, start - gap as i64, gap, |_| 0.0);
            }
        }

        for (plane, src) in self.planes.iter().zip(planes) {
            let src = src.as_ref();
            self.fill_plane(plane, start, len, |i| src[i]);
        }

        self.head.store(end, Ordering::Release);
        Ok(())
    }

    /// Copy `[start, end)` of every channel into `out` (one slice per channel).
    pub fn read<P: AsMut<[f32]>>(
        &self,
        start: i64,
        end: i64,
        out: &mut [P],
    ) -> Result<(), RingError> {
        let len = self.check_span(start, end)?;
        if out.len() != self.channels || out.iter_mut().any(|o| o.as_mut().len() < len) {
            return Err(RingError::InvalidRange);
        }
        self.check_available(start, end)?;
        for (plane, dst) in self.planes.iter().zip(out.iter_mut()) {
            self.copy_plane(plane, start, &mut dst.as_mut()[..len]);
        }
        self.validate_after_copy(start)
    }

    /// Copy `[start, end)` of one channel into `out`.
    pub fn read_channel(
        &self,
        channel: usize,
        start: i64,
        end: i64,
        out: &mut [f32],
    ) -> Result<(), RingError> {
        let len = self.check_span(start, end)?;
        let plane = self.planes.get(channel).ok_or(RingError::InvalidRange)?;
        if out.len() < len {
            return Err(RingError::InvalidRange);
        }
        self.check_available(start, end)?;
        self.copy_plane(plane, start, &mut out[..len]);
        self.validate_after_copy(start)
    }

    /// Copy the average of all channels over `[start, end)` into `out`.
    pub fn read_downmix(&self, start: i64, end: i64, out: &mut [f32]) -> Result<(), RingError> {
        let len = self.check_span(start, end)?;
        if out.len() < len {
            return Err(RingError::InvalidRange);
        }
        self.check_available(start, end)?;
        let out = &mut out[..len];
        out.fill(0.0);
        let scale = 1.0 / self.channels as f32;
        for plane in &self.planes {
            for (i, o) in out.iter_mut().enumerate() {
                *o += f32::from_bits(plane[self.slot(start + i as i64)].load(Ordering::Relaxed))
                    * scale;
            }
        }
        self.validate_after_copy(start)
    }

    /// Forget all retained data. Only call while no writer is active.
    pub fn reset(&self) {
        self.head.store(EMPTY, Ordering::Release);
        self.pending.store(EMPTY, Ordering::Release);
        self.origin.store(EMPTY, Ordering::Release);
    }

    fn check_span(&self, start: i64, end: i64) -> Result<usize, RingError> {
        if end <= start {
            return Err(RingError::InvalidRange);
        }
        let len = end.saturating_sub(start);
        if len > self.capacity as i64 {
            return Err(RingError::Overrun);
        }
        Ok(len as usize)
    }

    fn check_available(&self, start: i64, end: i64) -> Result<(), RingError> {
        let head = self.head.load(Ordering::Acquire);
        if head == EMPTY || end > head {
            return Err(RingError::NotAvailable);
        }
        let origin = self.origin.load(Ordering::Relaxed);
        if start < origin || start < head - self.capacity as i64 {
            return Err(RingError::NotAvailable);
        }
        Ok(())
    }

    // A writer heading for `pending` overwrites every slot older than
    // `pending - capacity`.
    fn validate_after_copy(&self, start: i64) -> Result<(), RingError> {
        fence(Ordering::Acquire);
        let pending = self.pending.load(Ordering::Relaxed);
        if pending != EMPTY && start < pending - self.capacity as i64 {
            return Err(RingError::NotAvailable);
        }
        Ok(())
    }

    #[inline]
    fn slot(&self, time: i64) -> usize {
        time.rem_euclid(self.capacity as i64) as usize
    }

    fn fill_plane(&self, plane: &[AtomicU32], start: i64, len: usize, src: impl Fn(usize) -> f32) {
        let first = self.slot(start);
        let split = len.min(self.capacity - first);
        for i in 0..split {
            plane[first + i].store(src(i).to_bits(), Ordering::Relaxed);
        }
        for i in split..len {
            plane[i - split].store(src(i).to_bits(), Ordering::Relaxed);
        }
    }

    fn copy_plane(&self, plane: &[AtomicU32], start: i64, out: &mut [f32]) {
        let first = self.slot(start);
        let split = out.len().min(self.capacity - first);
        let (head, tail) = out.split_at_mut(split);
        for (o, s) in head.iter_mut().zip(&plane[first..first + split]) {
            *o = f32::from_bits(s.load(Ordering::Relaxed));
        }
        for (o, s) in tail.iter_mut().zip(plane.iter()) {
            *o = f32::from_bits(s.load(Ordering::Relaxed));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(start: i64, len: usize) -> Vec<f32> {
        (0..len).map(|i| (start + i as i64) as f32).collect()
    }

    #[test]
    fn read_before_first_write_is_not_available() {
        let ring = RingBuffer::new(1, 64);
        let mut out = [0.0; 8];
        assert_eq!(ring.read_channel(0, 0, 8, &mut out), Err(RingError::NotAvailable));
        assert_eq!(ring.write_head(), None);
        assert_eq!(ring.oldest_time(), None);
    }

    #[test]
    fn wraps_and_evicts() {
        let ring = RingBuffer::new(1, 64);
        for block in 0..5 {
            let start = block * 32;
            let data = ramp(start, 32);
            ring.write(&[&data], start, start + 32).unwrap();
        }
        assert_eq!(ring.write_head(), Some(160));
        assert_eq!(ring.oldest_time(), Some(96));

        let mut out = [0.0; 40];
        ring.read_channel(0, 100, 140, &mut out).unwrap();
        assert_eq!(out.to_vec(), ramp(100, 40));

        assert_eq!(ring.read_channel(0, 95, 100, &mut out), Err(RingError::NotAvailable));
        assert_eq!(ring.read_channel(0, 150, 161, &mut out), Err(RingError::NotAvailable));
    }

    #[test]
    fn invalid_and_oversized_ranges() {
        let ring = RingBuffer::new(1, 64);
        let data = ramp(0, 64);
        ring.write(&[&data], 0, 64).unwrap();
        let mut out = [0.0; 128];
        assert_eq!(ring.read_channel(0, 10, 10, &mut out), Err(RingError::InvalidRange));
        assert_eq!(ring.read_channel(0, 10, 5, &mut out), Err(RingError::InvalidRange));
        assert_eq!(ring.read_channel(0, 0, 65, &mut out), Err(RingError::Overrun));
        assert_eq!(ring.read_channel(3, 0, 8, &mut out), Err(RingError::InvalidRange));
        assert_eq!(ring.read_channel(0, 0, 8, &mut out[..4]), Err(RingError::InvalidRange));
    }

    #[test]
    fn write_rejects_overrun_and_backwards_time() {
        let ring = RingBuffer::new(1, 16);
        let data = vec![0.0; 32];
        assert_eq!(ring.write(&[&data], 0, 17), Err(RingError::Overrun));
        ring.write(&[&data], 0, 16).unwrap();
        assert_eq!(ring.write(&[&data], 8, 12), Err(RingError::InvalidRange));
        assert_eq!(ring.write(&[&data, &data], 16, 20), Err(RingError::InvalidRange));
    }

    #[test]
    fn forward_gap_reads_as_silence() {
        let ring = RingBuffer::new(1, 64);
        let ones = vec![1.0; 8];
        ring.write(&[&ones], 0, 8).unwrap();
        ring.write(&[&ones], 16, 24).unwrap();
        let mut out = [9.0; 24];
        ring.read_channel(0, 0, 24, &mut out).unwrap();
        assert!(out[..8].iter().all(|&s| s == 1.0));
        assert!(out[8..16].iter().all(|&s| s == 0.0));
        assert!(out[16..].iter().all(|&s| s == 1.0));
    }

    #[test]
    fn first_write_sets_origin() {
        let ring = RingBuffer::new(1, 64);
        let data = ramp(1000, 16);
        ring.write(&[&data], 1000, 1016).unwrap();
        let mut out = [0.0; 8];
        assert_eq!(ring.read_channel(0, 990, 998, &mut out), Err(RingError::NotAvailable));
        ring.read_channel(0, 1004, 1012, &mut out).unwrap();
        assert_eq!(out[0], 1004.0);
    }

    #[test]
    fn downmix_and_all_channel_reads() {
        let ring = RingBuffer::new(2, 32);
        let left = vec![1.0; 8];
        let right = vec![0.0; 8];
        ring.write(&[&left, &right], 0, 8).unwrap();

        let mut mono = [0.0; 8];
        ring.read_downmix(0, 8, &mut mono).unwrap();
        assert!(mono.iter().all(|&s| (s - 0.5).abs() < 1e-6));

        let mut l = [0.0; 4];
        let mut r = [9.0; 4];
        ring.read(2, 6, &mut [&mut l[..], &mut r[..]]).unwrap();
        assert_eq!(l, [1.0; 4]);
        assert_eq!(r, [0.0; 4]);
    }

    #[test]
    fn reset_forgets_everything() {
        let ring = RingBuffer::new(1, 16);
        ring.write(&[[1.0; 4]], 0, 4).unwrap();
        ring.reset();
        let mut out = [0.0; 4];
        assert_eq!(ring.read_channel(0, 0, 4, &mut out), Err(RingError::NotAvailable));
        // time may restart after a reset
        ring.write(&[[2.0; 4]], 0, 4).unwrap();
        ring.read_channel(0, 0, 4, &mut out).unwrap();
        assert_eq!(out, [2.0; 4]);
    }

    #[test]
    fn concurrent_reader_sees_consistent_windows() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, AtomicUsize};

        const WANTED: usize = 1000;
        // Keeps every ramp value exactly representable as f32.
        const MAX_BLOCKS: i64 = 400_000;

        let ring = Arc::new(RingBuffer::new(1, 256));
        let done = Arc::new(AtomicBool::new(false));
        let good = Arc::new(AtomicUsize::new(0));

        let reader = {
            let ring = Arc::clone(&ring);
            let done = Arc::clone(&done);
            let good = Arc::clone(&good);
            std::thread::spawn(move || {
                let mut out = [0.0_f32; 64];
                while !done.load(Ordering::Relaxed) {
                    let Some(head) = ring.write_head() else {
                        continue;
                    };
                    let start = head - 64;
                    if start < 0 {
                        continue;
                    }
                    if ring.read_channel(0, start, head, &mut out).is_ok() {
                        for (i, &s) in out.iter().enumerate() {
                            assert_eq!(s, (start + i as i64) as f32);
                        }
                        good.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        };

        // Keep writing until the reader has validated enough windows taken
        // while the writer was running.
        let mut t = 0_i64;
        while good.load(Ordering::Relaxed) < WANTED && t < MAX_BLOCKS * 32 {
            let data = ramp(t, 32);
            ring.write(&[&data], t, t + 32).unwrap();
            t += 32;
        }
        let during_writes = good.load(Ordering::Relaxed);
        done.store(true, Ordering::Relaxed);
        reader.join().unwrap();

        assert!(
            during_writes >= WANTED,
            "only {during_writes} consistent reads overlapped the writer"
        );
    }
}
