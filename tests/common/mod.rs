//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which wires a scripted [`StubEngine`] into a full
//! [`AppContext`] with retry delays zeroed out, so requests can be driven
//! end to end through the router without sleeping or touching the network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use vidgate::admission::{AbuseMonitor, UsageLedger};
use vidgate::config::Config;
use vidgate::engine::{
    EngineError, EngineOptions, MetadataEngine, RawFormat, RawMediaInfo, RawThumbnail,
};
use vidgate::pipeline::ParsePipeline;
use vidgate::server::{create_router, AppContext};

/// Engine stub that replays a fixed script of outcomes and counts calls.
pub struct StubEngine {
    script: Mutex<VecDeque<Result<RawMediaInfo, String>>>,
    calls: AtomicUsize,
}

impl StubEngine {
    pub fn new(script: Vec<Result<RawMediaInfo, &str>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(
                script
                    .into_iter()
                    .map(|r| r.map_err(String::from))
                    .collect(),
            ),
            calls: AtomicUsize::new(0),
        })
    }

    /// Number of fetches the pipeline has issued so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataEngine for StubEngine {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn fetch(
        &self,
        _url: &str,
        _options: &EngineOptions,
    ) -> Result<RawMediaInfo, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().pop_front() {
            Some(result) => result.map_err(EngineError::new),
            None => Err(EngineError::new("stub script exhausted")),
        }
    }
}

/// A public document with one progressive format and one thumbnail.
#[allow(dead_code)]
pub fn sample_document() -> RawMediaInfo {
    RawMediaInfo {
        title: Some("Test Clip".to_string()),
        thumbnail: Some("https://cdn.example.com/thumb.jpg".to_string()),
        formats: vec![RawFormat {
            url: Some("https://cdn.example.com/clip-720.mp4".to_string()),
            ext: Some("mp4".to_string()),
            protocol: Some("https".to_string()),
            acodec: Some("aac".to_string()),
            vcodec: Some("avc1".to_string()),
            height: Some(720),
            ..Default::default()
        }],
        thumbnails: vec![RawThumbnail {
            url: Some("https://cdn.example.com/thumb-640.jpg".to_string()),
            width: Some(640),
            height: Some(360),
        }],
        ..Default::default()
    }
}

/// Test harness wrapping a fully-constructed [`AppContext`] around a
/// [`StubEngine`].
pub struct TestHarness {
    pub ctx: AppContext,
    pub engine: Arc<StubEngine>,
}

impl TestHarness {
    /// Harness with default configuration. The embed base points at a closed
    /// local port so YouTube URLs fall straight through to the stub engine.
    #[allow(dead_code)]
    pub fn new(script: Vec<Result<RawMediaInfo, &str>>) -> Self {
        let mut config = Config::default();
        config.extractor.embed_base = "http://127.0.0.1:9/embed".to_string();
        Self::with_config(config, script)
    }

    /// Harness with a custom configuration.
    pub fn with_config(config: Config, script: Vec<Result<RawMediaInfo, &str>>) -> Self {
        let engine = StubEngine::new(script);
        let limits = &config.limits;
        let monitor = Arc::new(AbuseMonitor::new(
            limits.burst_threshold,
            Duration::from_secs(limits.burst_window_secs),
            Duration::from_secs(limits.history_retention_secs),
        ));
        let ledger = Arc::new(UsageLedger::new(limits.usage_limit, limits.view_limit));
        let pipeline = Arc::new(
            ParsePipeline::new(engine.clone(), ledger.clone(), &config.extractor)
                .with_delay(|_| Duration::ZERO),
        );

        let ctx = AppContext {
            config: Arc::new(config),
            monitor,
            ledger,
            pipeline,
        };

        Self { ctx, engine }
    }

    /// Fresh router over the shared context.
    pub fn router(&self) -> axum::Router {
        create_router(self.ctx.clone())
    }
}
