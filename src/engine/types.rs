//! Raw metadata document types as produced by the external resolver.
//!
//! Nothing here is guaranteed by the producer: every field of every record may
//! be absent, so all fields are optional and unknown fields are ignored.

use serde::{Deserialize, Serialize};

/// Loosely-structured metadata document for a single media URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMediaInfo {
    /// Display title, if the resolver found one.
    pub title: Option<String>,
    /// Best-guess thumbnail URL chosen by the resolver.
    pub thumbnail: Option<String>,
    /// Format descriptors, in resolver order.
    #[serde(default)]
    pub formats: Vec<RawFormat>,
    /// Thumbnail descriptors, resolver-ordered worst to best.
    #[serde(default)]
    pub thumbnails: Vec<RawThumbnail>,
    /// Whether the content is currently live.
    pub is_live: Option<bool>,
    /// Availability tag (e.g. "public", "private").
    pub availability: Option<String>,
}

/// One format descriptor from the resolver's format list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawFormat {
    pub url: Option<String>,
    pub ext: Option<String>,
    pub protocol: Option<String>,
    pub acodec: Option<String>,
    pub vcodec: Option<String>,
    pub height: Option<u32>,
    pub format_note: Option<String>,
    pub format_id: Option<String>,
    pub resolution: Option<String>,
}

/// One thumbnail descriptor from the resolver's thumbnail list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawThumbnail {
    pub url: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}
