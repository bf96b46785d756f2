//! Offline lockstep run of the chain.
//!
//! Audio is pushed block by block through the same render path the live
//! engine uses; the analyzer and the ducker are ticked on sample time
//! instead of wall time, so the output is deterministic.

use std::f32::consts::TAU;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use deepeye_analysis::{SpectrumAnalyzer, SpectrumFrame};
use deepeye_core::{
    AudioFormat, ChainStages, EnvelopeFollower, EqBand, EqControls, FilterCell, GainCell,
    LimiterPolicy, RenderContext, RenderStats, RingBuffer, SampleClock, SignalGraph, StageId,
};
use deepeye_io::{RingRecorder, read_wav};
use parking_lot::Mutex;

use super::common::{ControlArgs, bar_line};

#[derive(Args)]
pub struct SimulateArgs {
    #[command(flatten)]
    controls: ControlArgs,

    /// Sine frequency in Hz for the synthetic input
    #[arg(long, default_value = "1000")]
    tone_hz: f32,

    /// Sine amplitude (linear)
    #[arg(long, default_value = "0.5")]
    amplitude: f32,

    /// Synthetic input length in seconds
    #[arg(long, default_value = "1.0")]
    seconds: f32,

    /// Process a WAV file instead of the synthetic tone
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Write the processed signal to a WAV file
    #[arg(long)]
    wav: Option<PathBuf>,

    /// Constant sidechain level in dBFS (enables ducking)
    #[arg(long, allow_hyphen_values = true)]
    sidechain_db: Option<f32>,

    /// Print only the final frame
    #[arg(short, long)]
    quiet: bool,
}

pub fn run(args: SimulateArgs) -> anyhow::Result<()> {
    let mut config = args.controls.resolve()?;
    if args.sidechain_db.is_some() {
        config.sidechain.enabled = true;
    }

    let (audio, sample_rate, device_channels) = match &args.input {
        Some(path) => {
            let (samples, spec) = read_wav(path)?;
            tracing::info!(path = %path.display(), ?spec, "loaded input");
            (samples, spec.sample_rate, usize::from(spec.channels))
        }
        None => {
            if args.seconds.is_nan() || args.seconds <= 0.0 {
                anyhow::bail!("--seconds must be positive");
            }
            let sr = config.audio.sample_rate;
            (tone(args.tone_hz, args.amplitude, args.seconds, sr), sr, 1)
        }
    };

    let channels = usize::from(config.audio.channels);
    let block = config.audio.buffer_frames as usize;

    let eq = Arc::new(EqControls::new());
    let filter = Arc::new(FilterCell::default());
    let ducking = Arc::new(GainCell::unbounded(0.0));
    let stages = ChainStages::standard(
        Arc::clone(&eq),
        Arc::clone(&filter),
        Arc::clone(&ducking),
        LimiterPolicy::brickwall(),
    );
    let mut graph = SignalGraph::new(AudioFormat::new(sample_rate as f32, channels, block), stages);
    graph.connect_chain()?;

    let controls = &config.controls;
    let state = filter.set_knob(controls.filter_knob);
    tracing::debug!(?state, "filter mapped");
    eq.set_gain(EqBand::Bass, controls.bass_db);
    eq.set_gain(EqBand::Mid, controls.mid_db);
    eq.set_gain(EqBand::Treble, controls.treble_db);
    graph.set_bypass(StageId::Limiter, !controls.limiter_enabled);

    let ring = Arc::new(RingBuffer::new(channels, config.ring_capacity()));
    let stats = Arc::new(RenderStats::default());
    let mut ctx = RenderContext::new(
        Arc::new(Mutex::new(graph)),
        Arc::clone(&ring),
        Arc::new(SampleClock::new()),
        Arc::clone(&stats),
        block,
    );

    let mut analyzer = SpectrumAnalyzer::new(config.spectrum_config())?;
    let analysis_period = ticks_in(analyzer.config().tick_seconds, sample_rate);

    let sidechain = config.sidechain_config();
    let sidechain_dt = config.sidechain_tick_seconds();
    let sidechain_period = ticks_in(sidechain_dt, sample_rate);
    let mut follower = EnvelopeFollower::new();

    let mut recorder = match &args.wav {
        Some(path) => Some(RingRecorder::create(path, Arc::clone(&ring), sample_rate)?),
        None => None,
    };

    let mut latest = SpectrumFrame::silent(config.analysis.bands);
    let mut next_analysis = analysis_period;
    let mut next_sidechain = sidechain_period;
    let mut rendered: u64 = 0;

    for piece in audio.chunks(block * device_channels) {
        ctx.render(piece, device_channels);
        rendered += (piece.len() / device_channels) as u64;

        while sidechain.enabled && rendered >= next_sidechain {
            let gain = follower.tick(&sidechain, args.sidechain_db, sidechain_dt);
            ducking.set(gain);
            next_sidechain += sidechain_period;
        }

        while rendered >= next_analysis {
            if let Some(frame) = analyzer.tick(&ring) {
                if !args.quiet {
                    print_frame(&frame, sample_rate, ducking.get());
                }
                latest = frame;
            }
            next_analysis += analysis_period;
        }

        if let Some(recorder) = recorder.as_mut() {
            recorder.poll()?;
        }
    }

    if let Some(frame) = analyzer.tick(&ring) {
        latest = frame;
    }
    if args.quiet {
        print_frame(&latest, sample_rate, ducking.get());
    }

    if let Some(recorder) = recorder {
        let frames = recorder.finalize()?;
        tracing::info!(frames, "processed signal written");
    }

    let peak = latest
        .bands
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    let counts = stats.snapshot();
    println!(
        "frames {} | blocks {} | peak band {} | duck {:.1} dB",
        rendered,
        counts.rendered_blocks,
        peak,
        ducking.get()
    );
    Ok(())
}

fn print_frame(frame: &SpectrumFrame, sample_rate: u32, duck_db: f32) {
    println!(
        "{:>8.3}s |{}| duck {:>6.1} dB",
        frame.sample_time as f64 / f64::from(sample_rate),
        bar_line(&frame.bands),
        duck_db
    );
}

/// Samples per tick, at least one.
fn ticks_in(seconds: f32, sample_rate: u32) -> u64 {
    ((f64::from(seconds) * f64::from(sample_rate)).round() as u64).max(1)
}

fn tone(freq: f32, amplitude: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
    let frames = (seconds * sample_rate as f32) as usize;
    let step = TAU * freq / sample_rate as f32;
    (0..frames)
        .map(|n| amplitude * (step * n as f32).sin())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_length_and_peak() {
        let t = tone(1000.0, 0.5, 0.1, 48000);
        assert_eq!(t.len(), 4800);
        let peak = t.iter().fold(0.0f32, |m, &x| m.max(x.abs()));
        assert!((peak - 0.5).abs() < 1e-3);
    }

    #[test]
    fn tick_period_never_zero() {
        assert_eq!(ticks_in(0.05, 48000), 2400);
        assert_eq!(ticks_in(0.0, 48000), 1);
    }
}
