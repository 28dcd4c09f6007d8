//! Metadata engine abstraction.
//!
//! An engine turns a public media URL into a [`RawMediaInfo`] document. The
//! production engine shells out to yt-dlp; tests swap in stubs through the
//! [`MetadataEngine`] trait.

pub mod types;
pub mod ytdlp;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

pub use types::{RawFormat, RawMediaInfo, RawThumbnail};
pub use ytdlp::YtDlpEngine;

// ============================================================================
// Engine Trait
// ============================================================================

/// One extraction attempt's worth of tunables, rebuilt per attempt so each
/// retry can present a different client identity.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// User-Agent header the engine should present upstream.
    pub user_agent: String,
    /// Format selector expression, e.g. `best[height<=720]/best`.
    pub format_selector: String,
    /// Per-socket network timeout.
    pub socket_timeout: Duration,
    /// Internal retry count the engine applies on top of ours.
    pub retries: u32,
}

/// Failure reported by an engine. The message is free text from the upstream
/// tool; classification into a user-facing category happens in the pipeline.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Resolves a media URL to its raw metadata document.
#[async_trait]
pub trait MetadataEngine: Send + Sync {
    /// Engine name for logging.
    fn name(&self) -> &'static str;

    /// Fetch metadata for `url`. A single call may take a while; callers are
    /// expected to wrap it in their own deadline.
    async fn fetch(&self, url: &str, options: &EngineOptions) -> Result<RawMediaInfo, EngineError>;
}

// ============================================================================
// User-Agent Pool
// ============================================================================

/// Desktop browser identities rotated across extraction attempts.
const DESKTOP_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// Pick a random desktop browser User-Agent.
pub fn random_desktop_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    DESKTOP_USER_AGENTS[rng.gen_range(0..DESKTOP_USER_AGENTS.len())]
}

// ============================================================================
// Tool Discovery
// ============================================================================

/// Availability report for an external resolver binary.
#[derive(Debug, Clone)]
pub struct ToolStatus {
    pub name: String,
    pub available: bool,
    pub version: Option<String>,
    pub path: Option<PathBuf>,
}

/// Look up the resolver binary on PATH and query its version.
pub fn resolver_status(binary: &str) -> ToolStatus {
    match which::which(binary) {
        Ok(path) => {
            let version = std::process::Command::new(&path)
                .arg("--version")
                .output()
                .ok()
                .filter(|out| out.status.success())
                .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_string());
            ToolStatus {
                name: binary.to_string(),
                available: true,
                version,
                path: Some(path),
            }
        }
        Err(_) => ToolStatus {
            name: binary.to_string(),
            available: false,
            version: None,
            path: None,
        },
    }
}
