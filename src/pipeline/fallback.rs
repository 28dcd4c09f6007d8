//! Lightweight embed-page fallback for YouTube URLs.
//!
//! Before paying for a full extraction, YouTube URLs get one cheap shot: pull
//! the embed page and scrape a title out of it. The probe either yields a
//! minimal summary or reports itself unavailable; it never surfaces an error
//! to the caller, who falls through to the primary engine on `None`.

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{bail, Context};
use regex::Regex;
use reqwest::header;

use crate::engine::random_desktop_user_agent;
use crate::normalize::{FormatKind, ImageEntry, MediaFormat, MediaSummary};
use crate::platform::Platform;

const EMBED_TIMEOUT: Duration = Duration::from_secs(10);

/// URL shapes that carry an 11-character video ID, probed in order.
static VIDEO_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"[?&]v=([A-Za-z0-9_-]{11})",
        r"/embed/([A-Za-z0-9_-]{11})",
        r"youtu\.be/([A-Za-z0-9_-]{11})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("video id patterns are valid"))
    .collect()
});

static TITLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<title>(.*?)</title>").expect("title pattern is valid"));

pub struct EmbedProbe {
    client: reqwest::Client,
    embed_base: String,
}

impl EmbedProbe {
    /// `embed_base` is the page prefix the video ID is appended to, e.g.
    /// `https://www.youtube.com/embed`.
    pub fn new(embed_base: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(EMBED_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("failed to build embed HTTP client: {}, using default", e);
                reqwest::Client::new()
            });
        Self {
            client,
            embed_base: embed_base.into(),
        }
    }

    /// Try the embed page for `url`. `None` means the fallback is
    /// unavailable for this URL and the primary path should run.
    pub async fn probe(&self, url: &str) -> Option<MediaSummary> {
        let id = extract_video_id(url)?;
        match self.fetch_summary(&id, url).await {
            Ok(summary) => Some(summary),
            Err(err) => {
                tracing::debug!(video_id = %id, error = %err, "embed fallback unavailable");
                None
            }
        }
    }

    async fn fetch_summary(&self, id: &str, original_url: &str) -> anyhow::Result<MediaSummary> {
        let page_url = format!("{}/{id}", self.embed_base.trim_end_matches('/'));
        let response = self
            .client
            .get(&page_url)
            .header(header::USER_AGENT, random_desktop_user_agent())
            .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .context("embed page fetch failed")?;

        if response.status() != reqwest::StatusCode::OK {
            bail!("embed page returned {}", response.status());
        }

        let body = response.text().await.context("embed page body unreadable")?;
        let title = parse_embed_title(&body).context("embed page had no title")?;
        let thumbnail = format!("https://i.ytimg.com/vi/{id}/hqdefault.jpg");

        Ok(MediaSummary {
            platform: Platform::Youtube,
            title,
            thumbnail: thumbnail.clone(),
            formats: vec![MediaFormat {
                quality: "YouTube Link".to_string(),
                url: original_url.to_string(),
                kind: FormatKind::Video,
            }],
            images: vec![ImageEntry {
                label: "Thumbnail 480x360".to_string(),
                url: thumbnail,
            }],
        })
    }
}

/// Pull the 11-character video ID out of a YouTube URL, if present.
fn extract_video_id(url: &str) -> Option<String> {
    VIDEO_ID_PATTERNS
        .iter()
        .find_map(|p| p.captures(url))
        .map(|caps| caps[1].to_string())
}

fn parse_embed_title(body: &str) -> Option<String> {
    let raw = TITLE_PATTERN.captures(body)?.get(1)?.as_str();
    let title = unescape_unicode(raw);
    let title = title.trim_end_matches(" - YouTube").trim();
    if title.is_empty() {
        return None;
    }
    Some(title.to_string())
}

/// Replace literal `\uXXXX` escape sequences with their characters. Anything
/// that fails to decode is kept verbatim.
fn unescape_unicode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if ch == '\\' && matches!(chars.peek(), Some((_, 'u'))) {
            let hex = input[idx + 2..].get(..4);
            if let Some(code) = hex.and_then(|h| u32::from_str_radix(h, 16).ok()) {
                if let Some(decoded) = char::from_u32(code) {
                    out.push(decoded);
                    // Skip the 'u' and the four hex digits just decoded.
                    for _ in 0..5 {
                        chars.next();
                    }
                    continue;
                }
            }
        }
        out.push(ch);
    }
    out
}
