//! Integration tests for the deepeye binary.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn deepeye_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_deepeye"))
}

fn default_config(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("engine.toml");
    let output = deepeye_bin()
        .args(["config", "init", "--path"])
        .arg(&path)
        .output()
        .expect("failed to run deepeye config init");
    assert!(output.status.success(), "config init failed");
    path
}

fn simulate(config: &Path, extra: &[&str]) -> Output {
    deepeye_bin()
        .arg("simulate")
        .arg("--config")
        .arg(config)
        .args(extra)
        .output()
        .expect("failed to run deepeye simulate")
}

#[test]
fn help_lists_commands() {
    let output = deepeye_bin().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in ["monitor", "simulate", "devices", "config"] {
        assert!(stdout.contains(cmd), "help should list '{cmd}'");
    }
}

#[test]
fn simulate_tone_peaks_in_expected_band() {
    let dir = TempDir::new().unwrap();
    let config = default_config(&dir);

    // 2048-point FFT, 64 bands: 16 bins of 23.4 Hz each, 1 kHz lands in band 2.
    let output = simulate(&config, &["--tone-hz", "1000", "--quiet"]);
    assert!(output.status.success(), "simulate failed: {:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("peak band 2"), "unexpected output: {stdout}");
    assert!(stdout.contains("frames 48000"), "unexpected output: {stdout}");
}

#[test]
fn simulate_prints_a_line_per_tick() {
    let dir = TempDir::new().unwrap();
    let config = default_config(&dir);

    let output = simulate(&config, &["--seconds", "0.5"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let frames = stdout.lines().filter(|l| l.contains('|')).count();
    // The first tick at 33 ms has less than one FFT window of audio.
    assert!(frames >= 10, "expected spectrum lines, got {frames}: {stdout}");
}

#[test]
fn simulate_ducks_with_loud_sidechain() {
    let dir = TempDir::new().unwrap();
    let config = default_config(&dir);

    let output = simulate(&config, &["--sidechain-db", "0", "--quiet"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("duck -12.0 dB"), "unexpected output: {stdout}");

    let output = simulate(&config, &["--sidechain-db", "-60", "--quiet"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("duck 0.0 dB"), "unexpected output: {stdout}");
}

#[test]
fn simulate_writes_and_reads_wav() {
    let dir = TempDir::new().unwrap();
    let config = default_config(&dir);
    let wav = dir.path().join("processed.wav");

    let output = simulate(
        &config,
        &["--seconds", "0.25", "--quiet", "--wav", wav.to_str().unwrap()],
    );
    assert!(output.status.success(), "simulate failed: {:?}", output);
    assert!(std::fs::metadata(&wav).unwrap().len() > 44);

    let output = simulate(&config, &["--input", wav.to_str().unwrap(), "--quiet"]);
    assert!(output.status.success(), "wav input failed: {:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("peak band 2"), "unexpected output: {stdout}");
}

#[test]
fn simulate_rejects_bad_overrides() {
    let dir = TempDir::new().unwrap();
    let config = default_config(&dir);

    let output = simulate(&config, &["--filter", "3.0"]);
    assert!(!output.status.success());

    let output = simulate(&config, &["--bands", "0"]);
    assert!(!output.status.success());
}

#[test]
fn simulate_rejects_invalid_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[analysis]\nfft_size = 1000\n").unwrap();

    let output = simulate(&path, &[]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("analysis"), "error should name the section: {stderr}");
}

#[test]
fn config_init_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    let path = default_config(&dir);

    let output = deepeye_bin()
        .args(["config", "init", "--path"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(!output.status.success());

    let output = deepeye_bin()
        .args(["config", "init", "--force", "--path"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());
}

#[test]
fn config_show_prints_sections() {
    let dir = TempDir::new().unwrap();
    let path = default_config(&dir);

    let output = deepeye_bin()
        .args(["config", "show", "--path"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for section in ["[audio]", "[analysis]", "[sidechain]", "[controls]"] {
        assert!(stdout.contains(section), "missing {section}: {stdout}");
    }
}
