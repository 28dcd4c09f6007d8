use crate::admission::{AbuseMonitor, UsageLedger};
use crate::config::Config;
use crate::engine::{self, MetadataEngine, YtDlpEngine};
use crate::error::ParseError;
use crate::pipeline::ParsePipeline;
use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod routes_parse;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub monitor: Arc<AbuseMonitor>,
    pub ledger: Arc<UsageLedger>,
    pub pipeline: Arc<ParsePipeline>,
}

impl AppContext {
    /// Wire up admission state and the pipeline around `engine`.
    pub fn new(config: Config, engine: Arc<dyn MetadataEngine>) -> Self {
        let limits = &config.limits;
        let monitor = Arc::new(AbuseMonitor::new(
            limits.burst_threshold,
            Duration::from_secs(limits.burst_window_secs),
            Duration::from_secs(limits.history_retention_secs),
        ));
        let ledger = Arc::new(UsageLedger::new(limits.usage_limit, limits.view_limit));
        let pipeline = Arc::new(ParsePipeline::new(engine, ledger.clone(), &config.extractor));
        Self {
            config: Arc::new(config),
            monitor,
            ledger,
            pipeline,
        }
    }
}

/// HTTP rendering of request failures.
pub enum ApiError {
    Parse(ParseError),
    /// Refused by the abuse monitor before any parsing.
    RateLimited,
}

impl From<ParseError> for ApiError {
    fn from(err: ParseError) -> Self {
        Self::Parse(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                serde_json::json!({
                    "error": "RATE_LIMITED",
                    "message": "Too many requests. Please slow down and try again later.",
                }),
            ),
            ApiError::Parse(err @ ParseError::LimitReached) => (
                StatusCode::TOO_MANY_REQUESTS,
                serde_json::json!({
                    "error": err.code(),
                    "message": err.to_string(),
                }),
            ),
            ApiError::Parse(err @ ParseError::Internal(_)) => {
                // The generic display text goes out; detail stays in the log.
                tracing::error!(error = ?err, "internal parse failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": err.to_string() }),
                )
            }
            ApiError::Parse(err) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": err.to_string() }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

/// Resolve the client identity for quota and abuse tracking: the first
/// `X-Forwarded-For` hop if present, else the socket peer address.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(root_info))
        .route("/health", get(health_check))
        .nest("/api", routes_parse::parse_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn root_info() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "vidgate - public media URL metadata gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let status = engine::resolver_status(&config.extractor.binary);
    if status.available {
        tracing::info!(
            binary = %config.extractor.binary,
            version = status.version.as_deref().unwrap_or("unknown"),
            "resolver available"
        );
    } else {
        tracing::warn!(
            binary = %config.extractor.binary,
            "resolver not found on PATH, extractions will fail"
        );
    }

    let engine = Arc::new(YtDlpEngine::new(&config.extractor.binary));
    let ctx = AppContext::new(config, engine);
    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer(addr: &str) -> Option<SocketAddr> {
        Some(addr.parse().unwrap())
    }

    #[test]
    fn test_forwarded_header_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));
        assert_eq!(client_key(&headers, peer("10.0.0.1:443")), "203.0.113.7");
    }

    #[test]
    fn test_first_forwarded_hop_is_used() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 70.41.3.18, 150.172.238.178"),
        );
        assert_eq!(client_key(&headers, None), "203.0.113.7");
    }

    #[test]
    fn test_falls_back_to_peer_address() {
        let headers = HeaderMap::new();
        assert_eq!(client_key(&headers, peer("10.0.0.1:443")), "10.0.0.1");
    }

    #[test]
    fn test_empty_forwarded_header_falls_through() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(""));
        assert_eq!(client_key(&headers, peer("10.0.0.1:443")), "10.0.0.1");
    }

    #[test]
    fn test_unknown_when_nothing_identifies_the_client() {
        assert_eq!(client_key(&HeaderMap::new(), None), "unknown");
    }
}
