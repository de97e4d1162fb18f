#![cfg(unix)]

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use weatherbot::config::RenderConfig;
use weatherbot::core::render::WkhtmlRenderer;
use weatherbot::core::ImageRenderer;
use weatherbot::BotError;

/// Writes a shell script standing in for wkhtmltoimage. It is run through `sh`
/// via the wrapper prefix, so the configured binary name arrives as `$1`.
fn fake_binary(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-wkhtmltoimage.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    path
}

fn config_for(script: &Path, timeout_seconds: u64) -> RenderConfig {
    RenderConfig {
        binary: "wkhtmltoimage".to_string(),
        wrapper: vec!["sh".to_string(), script.to_string_lossy().into_owned()],
        width: 600,
        timeout_seconds,
        template_path: None,
    }
}

#[tokio::test]
async fn test_render_writes_stdin_to_output_file() {
    let dir = TempDir::new().unwrap();
    // last argument is the output path; HTML arrives on stdin
    let script = fake_binary(dir.path(), "for last; do :; done\ncat > \"$last\"");
    let renderer = WkhtmlRenderer::new(&config_for(&script, 10));

    let image = renderer.render("<html><body>sunny</body></html>").await.unwrap();

    let written = std::fs::read_to_string(image.path()).unwrap();
    assert_eq!(written, "<html><body>sunny</body></html>");
    assert_eq!(image.path().extension().and_then(|e| e.to_str()), Some("png"));

    let path = image.path().to_path_buf();
    drop(image);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_render_receives_expected_arguments() {
    let dir = TempDir::new().unwrap();
    let args_file = dir.path().join("args.txt");
    let script = fake_binary(
        dir.path(),
        &format!(
            "echo \"$@\" > {}\nfor last; do :; done\ncat > \"$last\"",
            args_file.display()
        ),
    );
    let renderer = WkhtmlRenderer::new(&config_for(&script, 10));

    let _image = renderer.render("<p>x</p>").await.unwrap();

    let args = std::fs::read_to_string(&args_file).unwrap();
    assert!(args.starts_with(
        "wkhtmltoimage --format png --width 600 --enable-local-file-access --load-error-handling ignore --quiet - "
    ));
    assert!(args.trim_end().ends_with(".png"));
}

#[tokio::test]
async fn test_failing_binary_reports_stderr() {
    let dir = TempDir::new().unwrap();
    let script = fake_binary(dir.path(), "cat > /dev/null\necho 'cannot connect to X server' >&2\nexit 1");
    let renderer = WkhtmlRenderer::new(&config_for(&script, 10));

    let err = renderer.render("<p>x</p>").await.unwrap_err();

    match err {
        BotError::RenderError { message } => assert!(message.contains("cannot connect to X server")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_output_is_an_error() {
    let dir = TempDir::new().unwrap();
    let script = fake_binary(dir.path(), "cat > /dev/null\nexit 0");
    let renderer = WkhtmlRenderer::new(&config_for(&script, 10));

    let err = renderer.render("<p>x</p>").await.unwrap_err();
    assert!(matches!(err, BotError::RenderError { ref message } if message.contains("empty")));
}

#[tokio::test]
async fn test_hanging_binary_times_out() {
    let dir = TempDir::new().unwrap();
    let script = fake_binary(dir.path(), "cat > /dev/null\nsleep 10");
    let renderer = WkhtmlRenderer::new(&config_for(&script, 1));

    let started = std::time::Instant::now();
    let err = renderer.render("<p>x</p>").await.unwrap_err();

    assert!(matches!(err, BotError::RenderError { ref message } if message.contains("timed out")));
    assert!(started.elapsed() < std::time::Duration::from_secs(8));
}

#[tokio::test]
async fn test_timeout_also_stops_processes_started_by_the_wrapper() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("still-running");
    // the wrapper waits on a grandchild, like xvfb-run waiting on wkhtmltoimage
    let script = fake_binary(
        dir.path(),
        &format!("cat > /dev/null\nsh -c 'sleep 3; touch {}'", marker.display()),
    );
    let renderer = WkhtmlRenderer::new(&config_for(&script, 1));

    let err = renderer.render("<p>x</p>").await.unwrap_err();
    assert!(matches!(err, BotError::RenderError { ref message } if message.contains("timed out")));

    tokio::time::sleep(std::time::Duration::from_secs(4)).await;
    assert!(!marker.exists());
}
