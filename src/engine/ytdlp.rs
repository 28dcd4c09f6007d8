//! yt-dlp subprocess engine.
//!
//! Runs the resolver binary once per attempt with `--dump-json` and parses the
//! single JSON document it prints. Stderr becomes the error message on
//! failure, which is what the pipeline's classifier inspects.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::{EngineError, EngineOptions, MetadataEngine, RawMediaInfo};

/// Hard ceiling on a single resolver invocation. Socket timeouts inside the
/// tool do not bound total runtime, so we enforce one from the outside.
const INVOCATION_DEADLINE: Duration = Duration::from_secs(120);

pub struct YtDlpEngine {
    binary: PathBuf,
    deadline: Duration,
}

impl YtDlpEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            deadline: INVOCATION_DEADLINE,
        }
    }

    fn build_command(&self, url: &str, options: &EngineOptions) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--dump-json")
            .arg("--no-warnings")
            .arg("--no-playlist")
            .arg("--socket-timeout")
            .arg(options.socket_timeout.as_secs().to_string())
            .arg("--retries")
            .arg(options.retries.to_string())
            .arg("--user-agent")
            .arg(&options.user_agent)
            .arg("--format")
            .arg(&options.format_selector)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl MetadataEngine for YtDlpEngine {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn fetch(&self, url: &str, options: &EngineOptions) -> Result<RawMediaInfo, EngineError> {
        let mut cmd = self.build_command(url, options);
        tracing::debug!(
            binary = %self.binary.display(),
            format = %options.format_selector,
            "invoking resolver"
        );

        let output = tokio::time::timeout(self.deadline, cmd.output())
            .await
            .map_err(|_| {
                EngineError::new(format!(
                    "resolver timed out after {}s",
                    self.deadline.as_secs()
                ))
            })?
            .map_err(|e| {
                EngineError::new(format!("failed to run {}: {e}", self.binary.display()))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr.trim();
            if message.is_empty() {
                return Err(EngineError::new(format!(
                    "resolver exited with {}",
                    output.status
                )));
            }
            return Err(EngineError::new(message));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| EngineError::new(format!("resolver returned invalid JSON: {e}")))
    }
}
