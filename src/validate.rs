//! Request admission rules for media URLs.
//!
//! Validation runs in two phases. Phase one inspects the URL string alone and
//! rejects unsupported hosts and anything that textually looks private or
//! live. Phase two runs after extraction, once the metadata document can say
//! authoritatively whether the content is live or private.

use std::sync::LazyLock;

use regex::{RegexSet, RegexSetBuilder};
use url::Url;

use crate::engine::RawMediaInfo;
use crate::error::{ParseError, Result};

/// Hosts we will extract from. Matched as substrings of the URL host so that
/// regional and `www.` prefixes pass.
const SUPPORTED_DOMAINS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "instagram.com",
    "facebook.com",
    "fb.watch",
];

/// URL shapes that imply the content needs a login or is otherwise private.
const PRIVATE_MARKERS: &[&str] = &[
    "private",
    "login",
    "signin",
    "auth",
    "/p/",
    "story",
    "reel/.*private",
    "account/login",
    "members-only",
    "subscriber",
];

/// URL shapes that imply live or scheduled content.
const LIVE_MARKERS: &[&str] = &[
    "live",
    "premiere",
    "shorts/.*private",
    "channel/.*private",
];

static PRIVATE_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSetBuilder::new(PRIVATE_MARKERS)
        .case_insensitive(true)
        .build()
        .expect("private marker patterns are valid")
});

static LIVE_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSetBuilder::new(LIVE_MARKERS)
        .case_insensitive(true)
        .build()
        .expect("live marker patterns are valid")
});

/// Phase one: decide from the URL alone whether extraction may proceed.
///
/// Checks run in order: host support, then private markers, then live
/// markers. A URL that trips both marker classes reports as private.
pub fn validate_public_url(url: &str) -> Result<()> {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .ok_or(ParseError::Unsupported)?;

    if !SUPPORTED_DOMAINS.iter().any(|d| host.contains(d)) {
        return Err(ParseError::Unsupported);
    }
    if PRIVATE_SET.is_match(url) {
        return Err(ParseError::private_url());
    }
    if LIVE_SET.is_match(url) {
        return Err(ParseError::live_url());
    }
    Ok(())
}

/// Phase two: reject content the metadata document reveals as non-public.
pub fn validate_content(info: &RawMediaInfo) -> Result<()> {
    if info.is_live == Some(true) {
        return Err(ParseError::live_content());
    }
    if info.availability.as_deref() == Some("private") {
        return Err(ParseError::private_content());
    }
    Ok(())
}
