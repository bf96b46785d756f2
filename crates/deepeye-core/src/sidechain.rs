//! Sidechain ducking: level measurement to a smoothed gain reduction.
//!
//! A control worker polls a [`LevelSource`] every tick (50 ms by default),
//! runs the [`EnvelopeFollower`] and stores the resulting gain in dB into a
//! [`GainCell`] that the render context's sidechain gain stage reads.
//!
//! ```text
//! LevelSource ──dBFS──▶ EnvelopeFollower ──dB──▶ GainCell ──▶ SidechainGainStage
//!   (polled)              (control worker)        (atomic)      (render context)
//! ```

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::param::AtomicF32;
use crate::worker::PeriodicWorker;

/// Level assumed when the source has nothing to report.
pub const SILENCE_DB: f32 = -160.0;
/// Lower bound on attack and release time constants, in seconds.
pub const MIN_TIME_CONSTANT: f32 = 0.01;
/// Default control tick period, in seconds.
pub const DEFAULT_TICK_SECONDS: f32 = 0.05;

/// Atomic gain in dB written by the sidechain worker, read by the render context.
pub type GainCell = AtomicF32;

/// User-facing ducking settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SidechainConfig {
    /// Whether ducking runs at all.
    pub enabled: bool,
    /// Level above which the signal is ducked, in dBFS.
    pub threshold_db: f32,
    /// Gain applied while ducked, in dB (negative cuts).
    pub reduction_db: f32,
    /// Time constant toward more reduction, in seconds.
    pub attack_seconds: f32,
    /// Time constant back toward 0 dB, in seconds.
    pub release_seconds: f32,
}

impl Default for SidechainConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold_db: -20.0,
            reduction_db: -12.0,
            attack_seconds: 0.1,
            release_seconds: 1.0,
        }
    }
}

/// One-pole smoother from a thresholded level to a gain trajectory.
///
/// `current_gain_db` is the only history it keeps.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeFollower {
    current_gain_db: f32,
}

impl EnvelopeFollower {
    /// Start at 0 dB (no reduction).
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by one tick of `dt` seconds.
    ///
    /// `power_db` of `None` means the level source had nothing to report; it
    /// counts as silence so the gain always releases on signal loss.
    ///
    /// # Example
    ///
    /// ```rust
    /// use deepeye_core::{EnvelopeFollower, SidechainConfig};
    ///
    /// let config = SidechainConfig { enabled: true, ..SidechainConfig::default() };
    /// let mut follower = EnvelopeFollower::new();
    /// // -10 dBFS is over the -20 dB threshold: move toward -12 dB
    /// let gain = follower.tick(&config, Some(-10.0), 0.05);
    /// assert!(gain < 0.0 && gain > -12.0);
    /// ```
    pub fn tick(&mut self, config: &SidechainConfig, power_db: Option<f32>, dt: f32) -> f32 {
        let power = power_db.filter(|p| !p.is_nan()).unwrap_or(SILENCE_DB);
        let target = if power > config.threshold_db {
            config.reduction_db
        } else {
            0.0
        };

        let tau = if target < self.current_gain_db {
            config.attack_seconds.max(MIN_TIME_CONSTANT)
        } else {
            config.release_seconds.max(MIN_TIME_CONSTANT)
        };
        let alpha = dt / (tau + dt);

        self.current_gain_db += (target - self.current_gain_db) * alpha;
        self.current_gain_db
    }

    /// Current gain in dB.
    pub fn current_gain_db(&self) -> f32 {
        self.current_gain_db
    }

    /// Return to exactly 0 dB.
    pub fn reset(&mut self) {
        self.current_gain_db = 0.0;
    }
}

/// A polled source of average signal power.
///
/// Implementations wrap whatever metering the platform offers: a capture
/// device, the engine's own ring buffer, or a test fixture.
pub trait LevelSource: Send {
    /// Begin measuring. Failure to start is not an error: the source simply
    /// reports `None` until it can measure.
    fn start(&mut self);

    /// Stop measuring and release resources.
    fn stop(&mut self);

    /// Average power since the previous call, in dBFS, or `None` when no
    /// measurement is available.
    fn average_power_db(&mut self) -> Option<f32>;
}

/// Errors from [`SidechainController`].
#[derive(Debug, Error)]
pub enum SidechainError {
    /// The control worker thread could not be spawned.
    #[error("failed to spawn sidechain worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Owns the ducking lifecycle: level source, follower, worker and gain sink.
///
/// Enabling starts the source and a worker with a fresh follower. Disabling
/// stops both, drops the follower and stores exactly 0 dB into the sink.
pub struct SidechainController {
    config: Arc<ArcSwap<SidechainConfig>>,
    tick: Duration,
    source: Arc<Mutex<Box<dyn LevelSource>>>,
    sink: Arc<GainCell>,
    worker: Option<PeriodicWorker>,
}

impl SidechainController {
    /// Create a disabled controller. Call [`set_config`](Self::set_config)
    /// with `enabled: true` or [`enable`](Self::enable) to start ducking.
    pub fn new(source: Box<dyn LevelSource>, sink: Arc<GainCell>, tick_seconds: f32) -> Self {
        let tick_seconds = if tick_seconds > 0.0 {
            tick_seconds
        } else {
            DEFAULT_TICK_SECONDS
        };
        sink.set(0.0);
        Self {
            config: Arc::new(ArcSwap::from_pointee(SidechainConfig::default())),
            tick: Duration::from_secs_f32(tick_seconds),
            source: Arc::new(Mutex::new(source)),
            sink,
            worker: None,
        }
    }

    /// Replace the configuration. Takes effect on the next tick; toggling
    /// `enabled` starts or stops the worker.
    pub fn set_config(&mut self, config: SidechainConfig) -> Result<(), SidechainError> {
        self.config.store(Arc::new(config));
        match (config.enabled, self.is_running()) {
            (true, false) => self.enable(),
            (false, true) => {
                self.disable();
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> SidechainConfig {
        **self.config.load()
    }

    /// Start ducking from a clean 0 dB state. No-op if already running.
    pub fn enable(&mut self) -> Result<(), SidechainError> {
        if self.worker.is_some() {
            return Ok(());
        }
        self.source.lock().start();
        self.sink.set(0.0);

        let config = Arc::clone(&self.config);
        let source = Arc::clone(&self.source);
        let sink = Arc::clone(&self.sink);
        let dt = self.tick.as_secs_f32();
        let mut follower = EnvelopeFollower::new();

        let worker = PeriodicWorker::spawn("deepeye-sidechain", self.tick, move || {
            let cfg = config.load();
            let power = source.lock().average_power_db();
            sink.set(follower.tick(&cfg, power, dt));
        });
        match worker {
            Ok(worker) => {
                self.worker = Some(worker);
                #[cfg(feature = "tracing")]
                tracing::info!(tick_ms = self.tick.as_millis() as u64, "sidechain enabled");
                Ok(())
            }
            Err(e) => {
                self.source.lock().stop();
                Err(e.into())
            }
        }
    }

    /// Stop ducking and reset the applied gain to exactly 0 dB.
    pub fn disable(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop();
            self.source.lock().stop();
            #[cfg(feature = "tracing")]
            tracing::info!("sidechain disabled");
        }
        self.sink.set(0.0);
    }

    /// Whether the worker is ticking.
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Gain currently presented to the render context, in dB.
    pub fn current_gain_db(&self) -> f32 {
        self.sink.get()
    }

    /// Handle to the gain sink.
    pub fn sink(&self) -> Arc<GainCell> {
        Arc::clone(&self.sink)
    }
}

impl Drop for SidechainController {
    fn drop(&mut self) {
        self.disable();
    }
}

impl std::fmt::Debug for SidechainController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SidechainController")
            .field("config", &self.config())
            .field("tick", &self.tick)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ducking() -> SidechainConfig {
        SidechainConfig {
            enabled: true,
            threshold_db: -20.0,
            reduction_db: -12.0,
            attack_seconds: 0.1,
            release_seconds: 1.0,
        }
    }

    #[test]
    fn attack_then_release() {
        let cfg = ducking();
        let mut f = EnvelopeFollower::new();

        // alpha = 0.05 / 0.15 = 1/3 while attacking
        let g1 = f.tick(&cfg, Some(-10.0), 0.05);
        assert!((g1 + 4.0).abs() < 1e-4, "{g1}");

        for _ in 0..60 {
            f.tick(&cfg, Some(-10.0), 0.05);
        }
        assert!((f.current_gain_db() + 12.0).abs() < 0.01);

        // release: alpha = 0.05 / 1.05
        let before = f.current_gain_db();
        let after = f.tick(&cfg, Some(-30.0), 0.05);
        let expected = before + (0.0 - before) * (0.05 / 1.05);
        assert!((after - expected).abs() < 1e-5);

        // 1 s of release ticks covers roughly one time constant
        for _ in 0..19 {
            f.tick(&cfg, Some(-30.0), 0.05);
        }
        let frac = f.current_gain_db() / -12.0;
        assert!(frac > 0.3 && frac < 0.45, "remaining fraction {frac}");
    }

    #[test]
    fn threshold_is_strict() {
        let cfg = ducking();
        let mut f = EnvelopeFollower::new();
        assert_eq!(f.tick(&cfg, Some(-20.0), 0.05), 0.0);
    }

    #[test]
    fn missing_level_releases() {
        let cfg = ducking();
        let mut f = EnvelopeFollower::new();
        for _ in 0..10 {
            f.tick(&cfg, Some(0.0), 0.05);
        }
        let ducked = f.current_gain_db();
        let released = f.tick(&cfg, None, 0.05);
        assert!(released > ducked);
        assert!(f.tick(&cfg, Some(f32::NAN), 0.05) > released);
    }

    #[test]
    fn zero_time_constants_are_floored() {
        let cfg = SidechainConfig {
            attack_seconds: 0.0,
            ..ducking()
        };
        let mut f = EnvelopeFollower::new();
        // tau floored at 0.01: alpha = 0.05 / 0.06
        let g = f.tick(&cfg, Some(0.0), 0.05);
        assert!((g - (-12.0 * 0.05 / 0.06)).abs() < 1e-4);
        assert!(g.is_finite());
    }

    #[test]
    fn reset_is_exactly_zero() {
        let mut f = EnvelopeFollower::new();
        f.tick(&ducking(), Some(0.0), 0.05);
        f.reset();
        assert_eq!(f.current_gain_db(), 0.0);
    }

    struct Constant(Arc<Mutex<(bool, f32)>>);

    impl LevelSource for Constant {
        fn start(&mut self) {
            self.0.lock().0 = true;
        }
        fn stop(&mut self) {
            self.0.lock().0 = false;
        }
        fn average_power_db(&mut self) -> Option<f32> {
            let (running, level) = *self.0.lock();
            running.then_some(level)
        }
    }

    #[test]
    fn controller_lifecycle() {
        let state = Arc::new(Mutex::new((false, -6.0)));
        let sink = Arc::new(GainCell::unbounded(0.0));
        let mut ctl = SidechainController::new(
            Box::new(Constant(Arc::clone(&state))),
            Arc::clone(&sink),
            0.005,
        );
        assert!(!ctl.is_running());

        let cfg = SidechainConfig {
            attack_seconds: 0.01,
            ..ducking()
        };
        ctl.set_config(cfg).unwrap();
        assert!(ctl.is_running());
        assert!(state.lock().0, "source started");

        std::thread::sleep(Duration::from_millis(300));
        assert!(sink.get() < -6.0, "ducking engaged: {}", sink.get());

        ctl.set_config(SidechainConfig {
            enabled: false,
            ..cfg
        })
        .unwrap();
        assert!(!ctl.is_running());
        assert!(!state.lock().0, "source stopped");
        assert_eq!(sink.get(), 0.0);
        assert_eq!(ctl.current_gain_db(), 0.0);
    }
}
