//! Engine config file management.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use deepeye_config::{EngineConfig, default_config_path};

use super::common::load_config;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show {
        /// Config file (defaults to the user config path)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Write a default configuration file
    Init {
        /// Destination (defaults to the user config path)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the default config file location
    Path,
}

pub fn run(args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show { path } => {
            let config = load_config(path.as_deref())?;
            config.validate()?;
            print!("{}", config.to_toml_string()?);
        }
        ConfigCommand::Init { path, force } => {
            let path = path.unwrap_or_else(default_config_path);
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            EngineConfig::default().save(&path)?;
            println!("Wrote {}", path.display());
        }
        ConfigCommand::Path => println!("{}", default_config_path().display()),
    }
    Ok(())
}
