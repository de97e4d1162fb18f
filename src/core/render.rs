use crate::config::RenderConfig;
use crate::core::{ImageRenderer, RenderedImage};
use crate::utils::error::{BotError, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Rasterises HTML with `wkhtmltoimage`, optionally behind a wrapper such as `xvfb-run -a`.
pub struct WkhtmlRenderer {
    binary: String,
    wrapper: Vec<String>,
    width: u32,
    timeout: Duration,
}

impl WkhtmlRenderer {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            wrapper: config.wrapper.clone(),
            width: config.width,
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    /// Full command line; HTML is read from stdin (`-`).
    pub fn command_line(&self, output: &Path) -> Vec<String> {
        let width = self.width.to_string();
        let mut args = self.wrapper.clone();
        args.push(self.binary.clone());
        args.extend(
            [
                "--format",
                "png",
                "--width",
                width.as_str(),
                "--enable-local-file-access",
                "--load-error-handling",
                "ignore",
                "--quiet",
                "-",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        args.push(output.to_string_lossy().into_owned());
        args
    }
}

#[async_trait::async_trait]
impl ImageRenderer for WkhtmlRenderer {
    async fn render(&self, html: &str) -> Result<RenderedImage> {
        let output = tempfile::Builder::new()
            .prefix("weather-widget-")
            .suffix(".png")
            .tempfile()?
            .into_temp_path();

        let args = self.command_line(&output);
        let (program, rest) = args.split_first().ok_or_else(|| BotError::RenderError {
            message: "empty render command".to_string(),
        })?;
        tracing::debug!("Rendering widget: {}", args.join(" "));

        let mut command = Command::new(program);
        command
            .args(rest)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // own process group, so a timeout also reaches whatever the wrapper started
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|e| BotError::RenderError {
            message: format!("failed to start {}: {}", program, e),
        })?;
        let pid = child.id();

        let mut stdin = child.stdin.take().ok_or_else(|| BotError::RenderError {
            message: "render process has no stdin".to_string(),
        })?;
        let feed = async move {
            let result = stdin.write_all(html.as_bytes()).await;
            drop(stdin);
            result
        };

        let (fed, finished) = match tokio::time::timeout(self.timeout, async {
            tokio::join!(feed, child.wait_with_output())
        })
        .await
        {
            Ok(done) => done,
            Err(_) => {
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                return Err(BotError::RenderError {
                    message: format!("{} timed out after {:?}", program, self.timeout),
                });
            }
        };

        let finished = finished?;
        if !finished.status.success() {
            let stderr = String::from_utf8_lossy(&finished.stderr);
            return Err(BotError::RenderError {
                message: format!("{} exited with {}: {}", program, finished.status, stderr.trim()),
            });
        }
        if let Err(e) = fed {
            return Err(BotError::RenderError {
                message: format!("could not send HTML to {}: {}", program, e),
            });
        }

        let size = tokio::fs::metadata(&output).await?.len();
        if size == 0 {
            return Err(BotError::RenderError {
                message: format!("{} produced an empty image", program),
            });
        }

        tracing::info!("🖼️ Weather widget image created at {} ({} bytes)", output.display(), size);
        Ok(RenderedImage::new(output))
    }
}

/// Kills every process in the group led by `pid`.
#[cfg(unix)]
fn kill_process_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: killpg only sends a signal; the group was created for this render.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        tracing::debug!(
            "killpg({}) failed: {}",
            pgid,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_without_wrapper() {
        let renderer = WkhtmlRenderer::new(&RenderConfig::default());
        let args = renderer.command_line(Path::new("/tmp/out.png"));

        assert_eq!(
            args,
            vec![
                "wkhtmltoimage",
                "--format",
                "png",
                "--width",
                "600",
                "--enable-local-file-access",
                "--load-error-handling",
                "ignore",
                "--quiet",
                "-",
                "/tmp/out.png",
            ]
        );
    }

    #[test]
    fn test_command_line_with_display_wrapper() {
        let config = RenderConfig {
            wrapper: vec!["xvfb-run".to_string(), "-a".to_string()],
            width: 800,
            ..RenderConfig::default()
        };
        let args = WkhtmlRenderer::new(&config).command_line(Path::new("/tmp/out.png"));

        assert_eq!(&args[..3], ["xvfb-run", "-a", "wkhtmltoimage"]);
        assert_eq!(args[6], "800");
    }

    #[tokio::test]
    async fn test_missing_binary_is_render_error() {
        let config = RenderConfig {
            binary: "/nonexistent/wkhtmltoimage".to_string(),
            ..RenderConfig::default()
        };
        let err = WkhtmlRenderer::new(&config).render("<p>hi</p>").await.unwrap_err();
        assert!(matches!(err, BotError::RenderError { .. }));
    }
}
