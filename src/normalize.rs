//! Format list normalization.
//!
//! Turns the resolver's sprawling format table into the compact download
//! menu the API returns: a handful of deduplicated video qualities sorted
//! best-first, up to two audio tracks, and the last few thumbnails. Pure
//! functions of the input document, so identical documents always produce
//! identical summaries.

use std::cmp::Reverse;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::engine::{RawFormat, RawMediaInfo};
use crate::platform::Platform;

const MAX_VIDEO_FORMATS: usize = 6;
const MAX_AUDIO_FORMATS: usize = 2;
const MAX_IMAGES: usize = 3;

/// Resolution markers probed, highest first, when a label must be inferred
/// from free-text fields.
const QUALITY_MARKERS: &[&str] = &["1080", "720", "480", "360", "240", "144"];

/// Container extensions accepted for standalone audio tracks.
const AUDIO_EXTENSIONS: &[&str] = &["m4a", "mp4"];

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSummary {
    pub platform: Platform,
    pub title: String,
    pub thumbnail: String,
    pub formats: Vec<MediaFormat>,
    pub images: Vec<ImageEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFormat {
    pub quality: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: FormatKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    Video,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub label: String,
    pub url: String,
}

// ============================================================================
// Normalization
// ============================================================================

/// Build the response summary for one resolved document.
pub fn normalize(info: &RawMediaInfo, platform: Platform) -> MediaSummary {
    let mut formats = collect_video_formats(info);
    formats.extend(collect_audio_formats(info));

    MediaSummary {
        platform,
        title: info
            .title
            .clone()
            .unwrap_or_else(|| "Unknown".to_string()),
        thumbnail: info.thumbnail.clone().unwrap_or_default(),
        formats,
        images: collect_images(info),
    }
}

/// Direct-play mp4 with both streams muxed in.
fn is_progressive(fmt: &RawFormat) -> bool {
    fmt.url.is_some()
        && fmt.ext.as_deref() == Some("mp4")
        && fmt.protocol.as_deref() == Some("https")
        && matches!(fmt.acodec.as_deref(), Some(c) if c != "none")
        && matches!(fmt.vcodec.as_deref(), Some(c) if c != "none")
}

/// Relaxed pass used when too few progressive formats exist: any mp4 whose
/// URL is not a streaming manifest.
fn is_direct_mp4(fmt: &RawFormat) -> bool {
    match (&fmt.url, fmt.ext.as_deref()) {
        (Some(url), Some("mp4")) => {
            let lowered = url.to_lowercase();
            !lowered.contains("manifest") && !lowered.contains(".m3u8")
        }
        _ => false,
    }
}

fn collect_video_formats(info: &RawMediaInfo) -> Vec<MediaFormat> {
    let mut candidates: Vec<&RawFormat> = info.formats.iter().filter(|f| is_progressive(f)).collect();

    // Some platforms expose almost nothing progressive; fall back to plain
    // mp4 entries. Duplicates are fine, label dedup below collapses them.
    if candidates.len() < 3 {
        candidates.extend(info.formats.iter().filter(|f| is_direct_mp4(f)));
    }

    // Stable sort keeps resolver order among equal heights.
    candidates.sort_by_key(|f| Reverse(f.height.unwrap_or(0)));

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for fmt in candidates {
        if out.len() >= MAX_VIDEO_FORMATS {
            break;
        }
        let Some(url) = fmt.url.as_ref() else { continue };
        let quality = quality_label(fmt);
        if quality != "unknown" && seen.insert(quality.clone()) {
            out.push(MediaFormat {
                quality,
                url: url.clone(),
                kind: FormatKind::Video,
            });
        }
    }
    out
}

fn collect_audio_formats(info: &RawMediaInfo) -> Vec<MediaFormat> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for fmt in &info.formats {
        let (Some(url), Some(ext)) = (fmt.url.as_ref(), fmt.ext.as_deref()) else {
            continue;
        };
        if !AUDIO_EXTENSIONS.contains(&ext)
            || !matches!(fmt.acodec.as_deref(), Some(c) if c != "none")
            || fmt.vcodec.as_deref() != Some("none")
        {
            continue;
        }
        let quality = format!("Audio ({})", ext.to_uppercase());
        if seen.insert(quality.clone()) {
            out.push(MediaFormat {
                quality,
                url: url.clone(),
                kind: FormatKind::Audio,
            });
            if out.len() >= MAX_AUDIO_FORMATS {
                break;
            }
        }
    }
    out
}

fn collect_images(info: &RawMediaInfo) -> Vec<ImageEntry> {
    let start = info.thumbnails.len().saturating_sub(MAX_IMAGES);
    info.thumbnails[start..]
        .iter()
        .filter_map(|thumb| {
            let url = thumb.url.clone()?;
            let width = thumb
                .width
                .map(|w| w.to_string())
                .unwrap_or_else(|| "HD".to_string());
            let height = thumb.height.map(|h| h.to_string()).unwrap_or_default();
            Some(ImageEntry {
                label: format!("Thumbnail {width}x{height}"),
                url,
            })
        })
        .collect()
}

/// Best-effort human label for one format, probing fields in fixed priority:
/// numeric height, then format note, then format id, then a WxH resolution
/// string. Returns "unknown" when nothing matches.
fn quality_label(fmt: &RawFormat) -> String {
    if let Some(height) = fmt.height.filter(|h| *h > 0) {
        return format!("{height}p");
    }

    if let Some(note) = fmt.format_note.as_deref().filter(|n| !n.is_empty()) {
        let lowered = note.to_lowercase();
        for marker in QUALITY_MARKERS {
            if lowered.contains(marker) {
                return format!("{marker}p");
            }
        }
        return lowered;
    }

    if let Some(id) = fmt.format_id.as_deref().filter(|i| !i.is_empty()) {
        let lowered = id.to_lowercase();
        for marker in QUALITY_MARKERS {
            if lowered.contains(marker) {
                return format!("{marker}p");
            }
        }
    }

    if let Some(resolution) = fmt.resolution.as_deref() {
        if let Some(height) = resolution.split('x').nth(1) {
            if let Ok(height) = height.trim().parse::<u32>() {
                return format!("{height}p");
            }
        }
    }

    fmt.format_note
        .clone()
        .unwrap_or_else(|| "unknown".to_string())
}
