//! Extraction pipeline.
//!
//! One request flows through here: quota reservation, URL validation,
//! platform detection, the embed fallback for YouTube, then the retrying
//! primary extraction. Every stage can short-circuit with a typed failure,
//! and nothing downstream of a failure runs.

pub mod fallback;

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::admission::UsageLedger;
use crate::config::ExtractorConfig;
use crate::engine::{random_desktop_user_agent, EngineOptions, MetadataEngine};
use crate::error::{classify_engine_error, ExtractionKind, ParseError};
use crate::normalize::{normalize, MediaSummary};
use crate::platform::Platform;
use crate::validate;

pub use fallback::EmbedProbe;

/// Delay computation for retry `attempt` (1-based for the first retry).
/// Injectable so tests run without sleeping.
pub type DelayFn = Box<dyn Fn(u32) -> Duration + Send + Sync>;

/// Jittered delay that grows with the attempt number, spreading retries out
/// so concurrent requests do not hammer the upstream in lockstep.
fn default_retry_delay(attempt: u32) -> Duration {
    let base = rand::thread_rng().gen_range(3.0..8.0);
    Duration::from_secs_f64(base * f64::from(attempt + 1))
}

pub struct ParsePipeline {
    engine: Arc<dyn MetadataEngine>,
    ledger: Arc<UsageLedger>,
    embed: EmbedProbe,
    attempts: u32,
    socket_timeout: Duration,
    engine_retries: u32,
    format_selector: String,
    delay: DelayFn,
}

impl ParsePipeline {
    pub fn new(
        engine: Arc<dyn MetadataEngine>,
        ledger: Arc<UsageLedger>,
        options: &ExtractorConfig,
    ) -> Self {
        Self {
            engine,
            ledger,
            embed: EmbedProbe::new(options.embed_base.clone()),
            attempts: options.attempts,
            socket_timeout: Duration::from_secs(options.socket_timeout_secs),
            engine_retries: options.engine_retries,
            format_selector: format!("best[height<={}]/best", options.max_height),
            delay: Box::new(default_retry_delay),
        }
    }

    /// Replace the inter-retry delay function.
    pub fn with_delay(mut self, delay: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        self.delay = Box::new(delay);
        self
    }

    /// Parse `url` on behalf of `client`, enforcing quota and producing the
    /// normalized summary or the first typed failure encountered.
    pub async fn parse(&self, url: &str, client: &str) -> Result<MediaSummary, ParseError> {
        let permit = self.ledger.begin(client)?;

        validate::validate_public_url(url)?;
        let platform = Platform::detect(url)?;

        if platform == Platform::Youtube {
            if let Some(summary) = self.embed.probe(url).await {
                tracing::info!(client, "served from embed fallback");
                permit.commit();
                return Ok(summary);
            }
        }

        for attempt in 0..self.attempts {
            if attempt > 0 {
                let delay = (self.delay)(attempt);
                if !delay.is_zero() {
                    tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after delay");
                    tokio::time::sleep(delay).await;
                }
            }

            let options = self.attempt_options();
            match self.engine.fetch(url, &options).await {
                Ok(document) => {
                    // Liveness and availability reflect the content itself,
                    // so a rejection here is final, never retried.
                    validate::validate_content(&document)?;
                    permit.commit();
                    return Ok(normalize(&document, platform));
                }
                Err(err) if attempt + 1 == self.attempts => {
                    let kind = classify_engine_error(&err.message);
                    tracing::warn!(
                        client,
                        engine = self.engine.name(),
                        error = %err,
                        %kind,
                        "extraction failed on final attempt"
                    );
                    return Err(ParseError::Extraction(kind));
                }
                Err(err) => {
                    tracing::debug!(attempt, error = %err, "extraction attempt failed");
                }
            }
        }

        Err(ParseError::Extraction(ExtractionKind::Transient))
    }

    fn attempt_options(&self) -> EngineOptions {
        EngineOptions {
            user_agent: random_desktop_user_agent().to_string(),
            format_selector: self.format_selector.clone(),
            socket_timeout: self.socket_timeout,
            retries: self.engine_retries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, RawMediaInfo};
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Engine that replays a fixed script of outcomes.
    struct ScriptedEngine {
        script: Mutex<VecDeque<Result<RawMediaInfo, String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedEngine {
        fn new(script: Vec<Result<RawMediaInfo, &str>>) -> Arc<Self> {
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

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MetadataEngine for ScriptedEngine {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn fetch(
            &self,
            _url: &str,
            _options: &EngineOptions,
        ) -> Result<RawMediaInfo, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().pop_front().expect("script exhausted");
            next.map_err(EngineError::new)
        }
    }

    fn document() -> RawMediaInfo {
        serde_json::from_value(serde_json::json!({
            "title": "Test clip",
            "thumbnail": "https://cdn.example/t.jpg",
            "formats": [{
                "url": "https://cdn.example/v720.mp4",
                "ext": "mp4",
                "protocol": "https",
                "acodec": "aac",
                "vcodec": "avc1",
                "height": 720
            }]
        }))
        .unwrap()
    }

    fn pipeline_with(
        engine: Arc<ScriptedEngine>,
        ledger: Arc<UsageLedger>,
    ) -> ParsePipeline {
        let options = ExtractorConfig::default();
        ParsePipeline::new(engine, ledger, &options).with_delay(|_| Duration::ZERO)
    }

    const URL: &str = "https://www.instagram.com/reel/Cx1yz23/";

    #[tokio::test]
    async fn test_quota_exhaustion_skips_the_engine() {
        let engine = ScriptedEngine::new(vec![]);
        let ledger = Arc::new(UsageLedger::new(0, 0));
        let pipeline = pipeline_with(engine.clone(), ledger);

        let err = pipeline.parse(URL, "1.2.3.4").await.unwrap_err();
        assert_matches!(err, ParseError::LimitReached);
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_validation_failures_skip_the_engine() {
        let engine = ScriptedEngine::new(vec![]);
        let ledger = Arc::new(UsageLedger::new(2, 2));
        let pipeline = pipeline_with(engine.clone(), ledger.clone());

        let err = pipeline
            .parse("https://vimeo.com/123456", "1.2.3.4")
            .await
            .unwrap_err();
        assert_matches!(err, ParseError::Unsupported);
        assert_eq!(engine.calls(), 0);
        assert_eq!(ledger.usage_count("1.2.3.4"), 0);
    }

    #[tokio::test]
    async fn test_successful_parse_commits_usage() {
        let engine = ScriptedEngine::new(vec![Ok(document())]);
        let ledger = Arc::new(UsageLedger::new(2, 2));
        let pipeline = pipeline_with(engine.clone(), ledger.clone());

        let summary = pipeline.parse(URL, "1.2.3.4").await.unwrap();
        assert_eq!(summary.platform, Platform::Instagram);
        assert_eq!(summary.title, "Test clip");
        assert_eq!(engine.calls(), 1);
        assert_eq!(ledger.usage_count("1.2.3.4"), 1);
    }

    #[tokio::test]
    async fn test_retries_to_the_attempt_budget() {
        let engine = ScriptedEngine::new(vec![
            Err("connection reset by peer"),
            Err("connection reset by peer"),
            Err("connection reset by peer"),
            Err("connection reset by peer"),
            Err("connection reset by peer"),
        ]);
        let ledger = Arc::new(UsageLedger::new(2, 2));
        let pipeline = pipeline_with(engine.clone(), ledger.clone());

        let err = pipeline.parse(URL, "1.2.3.4").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to extract media info: transient, retry later"
        );
        assert_eq!(engine.calls(), 5);
        assert_eq!(ledger.usage_count("1.2.3.4"), 0);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let engine = ScriptedEngine::new(vec![
            Err("timed out"),
            Err("timed out"),
            Ok(document()),
        ]);
        let ledger = Arc::new(UsageLedger::new(2, 2));
        let pipeline = pipeline_with(engine.clone(), ledger.clone());

        assert!(pipeline.parse(URL, "1.2.3.4").await.is_ok());
        assert_eq!(engine.calls(), 3);
        assert_eq!(ledger.usage_count("1.2.3.4"), 1);
    }

    #[tokio::test]
    async fn test_only_the_final_attempt_is_classified() {
        // Early attempts carry classifiable wording but must be ignored.
        let engine = ScriptedEngine::new(vec![
            Err("Sign in to confirm you're not a bot"),
            Err("read timed out"),
            Err("read timed out"),
            Err("read timed out"),
            Err("This video is private"),
        ]);
        let ledger = Arc::new(UsageLedger::new(2, 2));
        let pipeline = pipeline_with(engine.clone(), ledger);

        let err = pipeline.parse(URL, "1.2.3.4").await.unwrap_err();
        assert_matches!(err, ParseError::Extraction(ExtractionKind::Private));
        assert_eq!(engine.calls(), 5);
    }

    #[tokio::test]
    async fn test_live_documents_fail_without_retry() {
        let live = RawMediaInfo {
            is_live: Some(true),
            ..Default::default()
        };
        let engine = ScriptedEngine::new(vec![Ok(live)]);
        let ledger = Arc::new(UsageLedger::new(2, 2));
        let pipeline = pipeline_with(engine.clone(), ledger.clone());

        let err = pipeline.parse(URL, "1.2.3.4").await.unwrap_err();
        assert_eq!(err.to_string(), "Live content not supported");
        assert_eq!(engine.calls(), 1);
        assert_eq!(ledger.usage_count("1.2.3.4"), 0);
    }

    #[tokio::test]
    async fn test_private_documents_fail_without_retry() {
        let hidden = RawMediaInfo {
            availability: Some("private".to_string()),
            ..Default::default()
        };
        let engine = ScriptedEngine::new(vec![Ok(hidden)]);
        let ledger = Arc::new(UsageLedger::new(2, 2));
        let pipeline = pipeline_with(engine.clone(), ledger.clone());

        let err = pipeline.parse(URL, "1.2.3.4").await.unwrap_err();
        assert_eq!(err.to_string(), "Private content not accessible");
        assert_eq!(engine.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_parses_leave_quota_for_later() {
        let engine = ScriptedEngine::new(vec![
            Err("boom"),
            Err("boom"),
            Err("boom"),
            Err("boom"),
            Err("boom"),
            Ok(document()),
        ]);
        let ledger = Arc::new(UsageLedger::new(1, 1));
        let pipeline = pipeline_with(engine.clone(), ledger.clone());

        assert!(pipeline.parse(URL, "1.2.3.4").await.is_err());
        assert_eq!(ledger.usage_count("1.2.3.4"), 0);
        // The failed run released its reservation, so this one fits.
        assert!(pipeline.parse(URL, "1.2.3.4").await.is_ok());
        assert_eq!(ledger.usage_count("1.2.3.4"), 1);
    }

    #[tokio::test]
    async fn test_concurrent_parses_cannot_overshoot_quota() {
        let engine = ScriptedEngine::new(vec![Ok(document()), Ok(document())]);
        let ledger = Arc::new(UsageLedger::new(1, 1));
        let pipeline = pipeline_with(engine.clone(), ledger.clone());

        let (a, b) = tokio::join!(
            pipeline.parse(URL, "1.2.3.4"),
            pipeline.parse(URL, "1.2.3.4")
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        assert_eq!(ledger.usage_count("1.2.3.4"), 1);
    }

    #[test]
    fn test_retry_delay_scales_with_attempt_and_stays_jittered() {
        for attempt in 1..5u32 {
            for _ in 0..50 {
                let delay = default_retry_delay(attempt).as_secs_f64();
                let scale = f64::from(attempt + 1);
                assert!(delay >= 3.0 * scale, "attempt {attempt}: {delay}");
                assert!(delay < 8.0 * scale, "attempt {attempt}: {delay}");
            }
        }
    }
}
