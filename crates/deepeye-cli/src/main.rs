//! DeepEye CLI - live monitoring and offline runs of the deepeye signal path.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "deepeye")]
#[command(author, version, about = "DeepEye signal path CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a device through the chain and draw its spectrum
    Monitor(commands::monitor::MonitorArgs),

    /// Run the chain offline on a synthetic tone or a WAV file
    Simulate(commands::simulate::SimulateArgs),

    /// List capture devices
    Devices(commands::devices::DevicesArgs),

    /// Create or inspect the engine configuration file
    Config(commands::config::ConfigArgs),
}

fn main() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    // Logs go to stderr so spectrum output on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    tracing_log::LogTracer::init().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Monitor(args) => commands::monitor::run(args),
        Commands::Simulate(args) => commands::simulate::run(args),
        Commands::Devices(args) => commands::devices::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
