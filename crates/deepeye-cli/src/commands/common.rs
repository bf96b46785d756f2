//! Shared CLI helpers used across multiple commands.

use std::path::{Path, PathBuf};

use clap::Args;
use deepeye_config::{EngineConfig, default_config_path};

/// Flags that override the engine config file.
#[derive(Args, Debug, Clone, Default)]
pub struct ControlArgs {
    /// Engine config file (defaults to the user config path)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// DJ filter knob position in [0, 1]; 0.5 is off
    #[arg(long)]
    pub filter: Option<f32>,

    /// Bass gain in dB
    #[arg(long, allow_hyphen_values = true)]
    pub bass: Option<f32>,

    /// Mid gain in dB
    #[arg(long, allow_hyphen_values = true)]
    pub mid: Option<f32>,

    /// Treble gain in dB
    #[arg(long, allow_hyphen_values = true)]
    pub treble: Option<f32>,

    /// Bypass the brickwall limiter
    #[arg(long)]
    pub no_limiter: bool,

    /// Number of display bands
    #[arg(long)]
    pub bands: Option<usize>,
}

impl ControlArgs {
    /// Load the config and apply these overrides, then validate.
    pub fn resolve(&self) -> anyhow::Result<EngineConfig> {
        let mut config = load_config(self.config.as_deref())?;
        if let Some(v) = self.filter {
            config.controls.filter_knob = v;
        }
        if let Some(v) = self.bass {
            config.controls.bass_db = v;
        }
        if let Some(v) = self.mid {
            config.controls.mid_db = v;
        }
        if let Some(v) = self.treble {
            config.controls.treble_db = v;
        }
        if self.no_limiter {
            config.controls.limiter_enabled = false;
        }
        if let Some(v) = self.bands {
            config.analysis.bands = v;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Load `path`, or the default config file if present, or the defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::load_or_default(default_config_path())?,
    };
    Ok(config)
}

const LEVELS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// One character per band, height by display value.
pub fn bar_line(bands: &[f32]) -> String {
    bands
        .iter()
        .map(|&v| {
            let idx = (v.clamp(0.0, 1.0) * (LEVELS.len() - 1) as f32).round() as usize;
            LEVELS[idx]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_line_maps_extremes() {
        assert_eq!(bar_line(&[0.0, 1.0, 0.5, 2.0, -1.0]), " █▄█ ");
    }

    #[test]
    fn overrides_apply() {
        let args = ControlArgs {
            config: Some(PathBuf::from("/nonexistent/deepeye.toml")),
            ..Default::default()
        };
        assert!(args.resolve().is_err());

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("engine.toml");
        EngineConfig::default().save(&path).unwrap();
        let args = ControlArgs {
            config: Some(path),
            filter: Some(0.2),
            bass: Some(-6.0),
            no_limiter: true,
            ..Default::default()
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.controls.filter_knob, 0.2);
        assert_eq!(config.controls.bass_db, -6.0);
        assert!(!config.controls.limiter_enabled);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("engine.toml");
        EngineConfig::default().save(&path).unwrap();
        let args = ControlArgs {
            config: Some(path),
            filter: Some(3.0),
            ..Default::default()
        };
        assert!(args.resolve().is_err());
    }
}
