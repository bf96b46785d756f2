//! Integration tests for deepeye-config file handling.

use deepeye_analysis::ChannelSelect;
use deepeye_config::{ConfigError, EngineConfig, FileOp};
use tempfile::TempDir;

#[test]
fn save_then_load_preserves_every_section() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("engine.toml");

    let mut config = EngineConfig::default();
    config.audio.buffer_frames = 256;
    config.audio.input_device = Some("USB Audio".into());
    config.analysis.channel = ChannelSelect::Downmix;
    config.sidechain.enabled = true;
    config.sidechain.device = Some("Mic".into());
    config.controls.treble_db = -24.0;
    config.controls.limiter_enabled = false;

    config.save(&path).unwrap();
    assert!(path.exists());
    assert_eq!(EngineConfig::load(&path).unwrap(), config);
}

#[test]
fn saved_file_is_readable_toml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engine.toml");
    EngineConfig::default().save(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    for section in ["[audio]", "[analysis]", "[sidechain]", "[controls]"] {
        assert!(text.contains(section), "missing {section} in:\n{text}");
    }
    assert!(text.contains("window = \"blackman\""));
    assert!(text.contains("channel = \"0\""));
    assert!(!text.contains("input_device"));
}

#[test]
fn load_missing_file_reports_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    match EngineConfig::load(&path) {
        Err(ConfigError::File { op: FileOp::Read, path: p, .. }) => assert_eq!(p, path),
        other => panic!("expected ReadFile, got {other:?}"),
    }
    assert_eq!(
        EngineConfig::load_or_default(&path).unwrap(),
        EngineConfig::default()
    );
}

#[test]
fn invalid_file_is_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engine.toml");
    std::fs::write(&path, "[controls]\nmid_db = 30.0\n").unwrap();
    assert!(matches!(
        EngineConfig::load(&path),
        Err(ConfigError::Invalid {
            field: "controls.mid_db",
            ..
        })
    ));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engine.toml");
    std::fs::write(&path, "[audio\nchannels = 2").unwrap();
    assert!(matches!(
        EngineConfig::load(&path),
        Err(ConfigError::TomlParse(_))
    ));
}
