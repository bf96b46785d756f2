//! Fixed-cadence background thread.
//!
//! The analysis and sidechain paths each run on one of these. Ticks come
//! from [`crossbeam_channel::tick`], whose channel holds at most one pending
//! tick: a slow tick delays the next one and never causes a burst of
//! catch-up ticks.

use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Sender, bounded, select, tick};

/// A named thread invoking a closure every `period` until stopped.
///
/// Dropping the worker stops and joins it.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
/// use deepeye_core::PeriodicWorker;
///
/// let count = Arc::new(AtomicUsize::new(0));
/// let c = Arc::clone(&count);
/// let worker = PeriodicWorker::spawn("demo", Duration::from_millis(1), move || {
///     c.fetch_add(1, Ordering::Relaxed);
/// })
/// .unwrap();
/// std::thread::sleep(Duration::from_millis(20));
/// worker.stop();
/// assert!(count.load(Ordering::Relaxed) > 0);
/// ```
#[derive(Debug)]
pub struct PeriodicWorker {
    name: String,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicWorker {
    /// Spawn the worker thread. The first tick fires one `period` after spawn.
    pub fn spawn<F>(name: &str, period: Duration, mut on_tick: F) -> std::io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let ticker = tick(period);

        let handle = std::thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                loop {
                    select! {
                        recv(ticker) -> _ => on_tick(),
                        recv(stop_rx) -> _ => break,
                    }
                }
            })?;

        #[cfg(feature = "tracing")]
        tracing::debug!(worker = name, period_ms = period.as_millis() as u64, "worker started");

        Ok(Self {
            name: name.to_owned(),
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Thread name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop ticking and wait for the in-flight tick, if any, to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the sender disconnects the channel, which also wakes select!.
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            #[cfg(feature = "tracing")]
            tracing::debug!(worker = %self.name, "worker stopped");
        }
    }
}

impl Drop for PeriodicWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn ticks_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let worker = PeriodicWorker::spawn("t", Duration::from_millis(2), move || {
            c.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();
        std::thread::sleep(Duration::from_millis(40));
        worker.stop();
        let after_stop = count.load(Ordering::Relaxed);
        assert!(after_stop > 0);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::Relaxed), after_stop);
    }

    #[test]
    fn slow_ticks_do_not_queue() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let worker = PeriodicWorker::spawn("slow", Duration::from_millis(1), move || {
            c.fetch_add(1, Ordering::Relaxed);
            std::thread::sleep(Duration::from_millis(20));
        })
        .unwrap();
        std::thread::sleep(Duration::from_millis(100));
        drop(worker);
        // 1 ms period but 20 ms per tick: no more than ~6 ticks can have run
        assert!(count.load(Ordering::Relaxed) <= 7);
    }
}
