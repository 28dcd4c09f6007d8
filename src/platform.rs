//! Supported media platforms and URL-based detection.

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Platform a media URL belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Instagram,
    Facebook,
}

impl Platform {
    /// Detect the platform from URL text.
    ///
    /// Matches on URL substrings rather than the parsed host so that share
    /// links and regional subdomains all resolve the same way.
    pub fn detect(url: &str) -> Result<Self, ParseError> {
        if url.contains("youtube.com") || url.contains("youtu.be") {
            Ok(Platform::Youtube)
        } else if url.contains("instagram.com") {
            Ok(Platform::Instagram)
        } else if url.contains("facebook.com") || url.contains("fb.watch") {
            Ok(Platform::Facebook)
        } else {
            Err(ParseError::Unsupported)
        }
    }

    /// Short lowercase tag, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
