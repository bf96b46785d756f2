//! Live monitoring command.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use clap::Args;
use deepeye_io::{Engine, RingRecorder};

use super::common::{ControlArgs, bar_line};

#[derive(Args)]
pub struct MonitorArgs {
    #[command(flatten)]
    controls: ControlArgs,

    /// Input device (index, exact or partial name)
    #[arg(short, long)]
    input_device: Option<String>,

    /// Device metered for sidechain ducking (default input if omitted)
    #[arg(long)]
    sidechain_device: Option<String>,

    /// Enable sidechain ducking
    #[arg(long)]
    sidechain: bool,

    /// Record the processed signal to a WAV file
    #[arg(long)]
    record: Option<PathBuf>,

    /// Display refresh period in milliseconds
    #[arg(long, default_value = "100")]
    refresh_ms: u64,

    /// Stop after this many seconds (runs until Ctrl+C if omitted)
    #[arg(long)]
    seconds: Option<f64>,
}

pub fn run(args: MonitorArgs) -> anyhow::Result<()> {
    let mut config = args.controls.resolve()?;
    if args.input_device.is_some() {
        config.audio.input_device = args.input_device;
    }
    if args.sidechain_device.is_some() {
        config.sidechain.device = args.sidechain_device;
    }
    if args.sidechain {
        config.sidechain.enabled = true;
    }

    let engine = Engine::start(config)?;
    let format = engine.format();
    println!(
        "Monitoring {} ({} Hz, {} ch)",
        engine.input_name().unwrap_or_else(|| "default".into()),
        format.sample_rate,
        format.channels
    );
    println!("Press Ctrl+C to stop...\n");

    let mut recorder = match &args.record {
        Some(path) => Some(RingRecorder::create(path, engine.ring(), format.sample_rate as u32)?),
        None => None,
    };

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let started = Instant::now();
    let deadline = args.seconds.map(Duration::from_secs_f64);
    let refresh = Duration::from_millis(args.refresh_ms.max(10));
    let mut dropped = 0;

    while running.load(Ordering::SeqCst) && deadline.is_none_or(|d| started.elapsed() < d) {
        std::thread::sleep(refresh);

        let frame = engine.latest_spectrum();
        println!(
            "{:>8.2}s |{}| duck {:>6.1} dB",
            frame.sample_time as f64 / f64::from(format.sample_rate),
            bar_line(&frame.bands),
            engine.sidechain_gain_db()
        );

        let counts = engine.render_counts();
        if counts.dropped_blocks > dropped {
            tracing::warn!(
                dropped = counts.dropped_blocks - dropped,
                "blocks rejected by the ring"
            );
            dropped = counts.dropped_blocks;
        }

        if let Some(recorder) = recorder.as_mut() {
            recorder.poll()?;
        }
    }

    if let Some(recorder) = recorder {
        let frames = recorder.finalize()?;
        println!("\nRecorded {} frames", frames);
    }
    let counts = engine.render_counts();
    println!(
        "Rendered {} blocks ({} skipped, {} dropped)",
        counts.rendered_blocks, counts.skipped_blocks, counts.dropped_blocks
    );
    Ok(())
}
