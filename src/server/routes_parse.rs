use crate::admission::{MonitorStats, UsageReport};
use crate::error::{ExtractionKind, ParseError};
use crate::normalize::MediaSummary;
use crate::server::{client_key, ApiError, AppContext};
use axum::{
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

pub fn parse_routes() -> Router<AppContext> {
    Router::new()
        .route("/parse", post(parse_media))
        .route("/usage/:client", get(get_usage))
        .route("/stats", get(get_stats))
}

#[derive(Debug, Deserialize)]
struct ParseRequest {
    url: String,
}

async fn parse_media(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    connect: Option<ConnectInfo<SocketAddr>>,
    Json(request): Json<ParseRequest>,
) -> Result<Json<MediaSummary>, ApiError> {
    let client = client_key(&headers, connect.map(|c| c.0));
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if ctx.monitor.is_suspicious(&client, user_agent) {
        tracing::warn!(client, "refusing suspicious request");
        return Err(ApiError::RateLimited);
    }

    let deadline = Duration::from_secs(ctx.config.extractor.request_deadline_secs);
    match tokio::time::timeout(deadline, ctx.pipeline.parse(&request.url, &client)).await {
        Ok(result) => result.map(Json).map_err(ApiError::from),
        Err(_) => {
            tracing::warn!(
                client,
                deadline_secs = deadline.as_secs(),
                "parse request exceeded deadline"
            );
            Err(ApiError::from(ParseError::Extraction(
                ExtractionKind::Transient,
            )))
        }
    }
}

async fn get_usage(
    State(ctx): State<AppContext>,
    Path(client): Path<String>,
) -> Json<UsageReport> {
    Json(ctx.ledger.report(&client))
}

async fn get_stats(State(ctx): State<AppContext>) -> Json<MonitorStats> {
    Json(ctx.monitor.stats())
}
