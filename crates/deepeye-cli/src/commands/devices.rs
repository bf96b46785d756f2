//! Capture device listing.

use clap::Args;
use deepeye_io::{AudioBackend, CpalBackend};

#[derive(Args)]
pub struct DevicesArgs {
    /// Show only the default input
    #[arg(long)]
    default: bool,
}

pub fn run(args: DevicesArgs) -> anyhow::Result<()> {
    let backend = CpalBackend::new();

    if args.default {
        match backend.default_input_device()? {
            Some(device) => println!(
                "{} ({} Hz, {} ch)",
                device.name, device.default_sample_rate, device.channels
            ),
            None => println!("No default input device."),
        }
        return Ok(());
    }

    let devices = backend.list_devices()?;
    if devices.is_empty() {
        println!("No input devices found.");
        return Ok(());
    }

    println!("Input Devices");
    println!("=============\n");
    for (idx, device) in devices.iter().enumerate() {
        let marker = if device.is_default { " (default)" } else { "" };
        println!(
            "  [{}] {} ({} Hz, {} ch){}",
            idx, device.name, device.default_sample_rate, device.channels, marker
        );
    }
    println!();
    println!("Tip: use an index or partial name with --input-device:");
    println!("  deepeye monitor --input-device 0");
    println!("  deepeye monitor --input-device \"USB\" --sidechain-device \"Mic\"");
    Ok(())
}
