//! Abusive traffic detection.
//!
//! Tracks request timestamps per client and permanently blocks clients that
//! burst past the frequency threshold. Automation-flavored User-Agent strings
//! are rejected outright without affecting the client's history.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

/// Substrings that mark a User-Agent as automated traffic.
const SUSPICIOUS_AGENT_MARKERS: &[&str] = &["bot", "crawler", "scraper", "automated"];

/// Point-in-time counters for the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStats {
    pub blocked_clients: usize,
    pub active_clients: usize,
    pub total_requests: usize,
}

#[derive(Default)]
struct MonitorState {
    history: HashMap<String, Vec<Instant>>,
    blocked: HashSet<String>,
}

pub struct AbuseMonitor {
    state: Mutex<MonitorState>,
    /// Requests allowed inside one window; exceeding it blocks the client.
    burst_threshold: usize,
    burst_window: Duration,
    /// How long per-client history is retained before pruning.
    retention: Duration,
}

impl AbuseMonitor {
    pub fn new(burst_threshold: usize, burst_window: Duration, retention: Duration) -> Self {
        Self {
            state: Mutex::new(MonitorState::default()),
            burst_threshold,
            burst_window,
            retention,
        }
    }

    /// Record one request from `client` and report whether it should be
    /// refused. Once a client trips the burst threshold it stays blocked for
    /// the life of the process.
    pub fn is_suspicious(&self, client: &str, user_agent: &str) -> bool {
        self.is_suspicious_at(client, user_agent, Instant::now())
    }

    /// Clock-injected variant of [`is_suspicious`](Self::is_suspicious).
    pub fn is_suspicious_at(&self, client: &str, user_agent: &str, now: Instant) -> bool {
        let mut state = self.state.lock();

        if state.blocked.contains(client) {
            return true;
        }

        let agent = user_agent.to_lowercase();
        if SUSPICIOUS_AGENT_MARKERS.iter().any(|m| agent.contains(m)) {
            tracing::debug!(client, user_agent, "refusing automated user agent");
            return true;
        }

        let recent = state
            .history
            .get(client)
            .map(|times| {
                times
                    .iter()
                    .filter(|t| now.duration_since(**t) < self.burst_window)
                    .count()
            })
            .unwrap_or(0);

        // Counting the request under evaluation, more than `burst_threshold`
        // requests inside the window blocks the client.
        if recent + 1 > self.burst_threshold {
            tracing::warn!(client, recent, "blocking client for request flooding");
            state.blocked.insert(client.to_string());
            return true;
        }

        let retention = self.retention;
        let times = state.history.entry(client.to_string()).or_default();
        times.push(now);
        times.retain(|t| now.duration_since(*t) < retention);
        false
    }

    pub fn stats(&self) -> MonitorStats {
        let state = self.state.lock();
        MonitorStats {
            blocked_clients: state.blocked.len(),
            active_clients: state.history.len(),
            total_requests: state.history.values().map(Vec::len).sum(),
        }
    }
}
