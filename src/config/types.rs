use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub extractor: ExtractorConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    /// Successful extractions per client before `LIMIT_REACHED`.
    #[serde(default = "default_usage_limit")]
    pub usage_limit: u32,

    /// Views reported against the usage endpoint's quota.
    #[serde(default = "default_view_limit")]
    pub view_limit: u32,

    /// Requests per window before a client is blocked outright.
    #[serde(default = "default_burst_threshold")]
    pub burst_threshold: usize,

    #[serde(default = "default_burst_window")]
    pub burst_window_secs: u64,

    /// How long request history is kept per client.
    #[serde(default = "default_history_retention")]
    pub history_retention_secs: u64,
}

fn default_usage_limit() -> u32 {
    2
}
fn default_view_limit() -> u32 {
    2
}
fn default_burst_threshold() -> usize {
    10
}
fn default_burst_window() -> u64 {
    60
}
fn default_history_retention() -> u64 {
    3600
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            usage_limit: default_usage_limit(),
            view_limit: default_view_limit(),
            burst_threshold: default_burst_threshold(),
            burst_window_secs: default_burst_window(),
            history_retention_secs: default_history_retention(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractorConfig {
    /// Resolver binary name or path.
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Total extraction attempts per request, including the first.
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default = "default_socket_timeout")]
    pub socket_timeout_secs: u64,

    /// Retries the resolver performs internally per attempt.
    #[serde(default = "default_engine_retries")]
    pub engine_retries: u32,

    /// Progressive formats are preferred up to this height.
    #[serde(default = "default_max_height")]
    pub max_height: u32,

    /// Embed page prefix for the YouTube fallback.
    #[serde(default = "default_embed_base")]
    pub embed_base: String,

    /// Overall deadline for one parse request.
    #[serde(default = "default_request_deadline")]
    pub request_deadline_secs: u64,
}

fn default_binary() -> String {
    "yt-dlp".to_string()
}
fn default_attempts() -> u32 {
    5
}
fn default_socket_timeout() -> u64 {
    30
}
fn default_engine_retries() -> u32 {
    3
}
fn default_max_height() -> u32 {
    720
}
fn default_embed_base() -> String {
    "https://www.youtube.com/embed".to_string()
}
fn default_request_deadline() -> u64 {
    120
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            attempts: default_attempts(),
            socket_timeout_secs: default_socket_timeout(),
            engine_retries: default_engine_retries(),
            max_height: default_max_height(),
            embed_base: default_embed_base(),
            request_deadline_secs: default_request_deadline(),
        }
    }
}
