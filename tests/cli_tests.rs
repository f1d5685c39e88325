//! Integration tests for the reelsmax CLI.
//!
//! These run the built binary and check its output and exit codes.

use std::path::Path;
use std::process::{Command, Output};

fn run(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_reelsmax"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env("RUST_LOG", "info")
        .output()
        .expect("Failed to run reelsmax")
}

fn write_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(
        &path,
        r#"
[playback]
default_platform = "tiktok"

[[heuristics.providers]]
origin_match = "chat.deepseek.com"
name = "DeepSeek"
rules = ['div[class*="stop"]']
"#,
    )
    .unwrap();
    path
}

#[test]
fn test_resolve_prints_profile() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let output = run(&config, &["resolve", "https://claude.ai/chat/1"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("Claude (claude.ai)"));

    let output = run(&config, &["resolve", "https://chat.deepseek.com"]);
    assert!(String::from_utf8_lossy(&output.stdout).contains("DeepSeek"));
}

#[test]
fn test_platforms_marks_default() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let output = run(&config, &["platforms"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let marked: Vec<_> = stdout.lines().filter(|l| l.starts_with('*')).collect();
    assert_eq!(marked.len(), 1);
    assert!(marked[0].contains("tiktok"));
}

#[test]
fn test_missing_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(&dir.path().join("absent.toml"), &["profiles"]);
    assert!(!output.status.success());
}

#[test]
fn test_replay_emits_native_frames() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let idle = dir.path().join("idle.html");
    let busy = dir.path().join("busy.html");
    std::fs::write(&idle, "<html><body><p>hi</p></body></html>").unwrap();
    std::fs::write(
        &busy,
        r#"<html><body><button aria-label="Stop generating">Stop</button></body></html>"#,
    )
    .unwrap();

    let output = run(
        &config,
        &[
            "replay",
            "--origin",
            "https://chatgpt.com",
            "--native",
            "--interval-ms",
            "5",
            idle.to_str().unwrap(),
            busy.to_str().unwrap(),
            idle.to_str().unwrap(),
        ],
    );
    assert!(output.status.success());

    // Attach sync, then one play and one pause
    let mut frames = Vec::new();
    let mut rest = output.stdout.as_slice();
    while rest.len() >= 4 {
        let len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        frames.push(String::from_utf8(rest[4..4 + len].to_vec()).unwrap());
        rest = &rest[4 + len..];
    }
    assert_eq!(
        frames,
        vec![
            r#"{"type":"PAUSE_REELS"}"#,
            r#"{"type":"PLAY_REELS"}"#,
            r#"{"type":"PAUSE_REELS"}"#,
        ]
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("2 edges"));
}
