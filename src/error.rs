//! Error types shared across the parsing pipeline.
//!
//! Every failure surfaced to a caller is one of the [`ParseError`] variants
//! below, rendered as a stable, user-readable string. Upstream resolver
//! failures are folded into [`ExtractionKind`] by a keyword table keyed on
//! the resolver's free-text wording.

/// Classified upstream extraction failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionKind {
    /// The upstream service refused the request (sign-in wall, captcha, bot check).
    Blocked,
    /// The content exists but is private.
    Private,
    /// The content was removed, deleted, or is otherwise gone.
    Unavailable,
    /// The content is age-restricted and needs an authenticated session.
    AgeRestricted,
    /// Anything else; worth retrying later.
    Transient,
}

impl std::fmt::Display for ExtractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ExtractionKind::Blocked => "blocked",
            ExtractionKind::Private => "private",
            ExtractionKind::Unavailable => "unavailable",
            ExtractionKind::AgeRestricted => "age-restricted",
            ExtractionKind::Transient => "transient, retry later",
        };
        f.write_str(text)
    }
}

/// Ordered classification rules: the first rule with a keyword contained in
/// the lowercased error text wins. Keywords track the resolver's current
/// wording and need updating when it shifts.
const CLASSIFY_RULES: &[(&[&str], ExtractionKind)] = &[
    (
        &["sign in", "bot", "captcha", "verify"],
        ExtractionKind::Blocked,
    ),
    (&["private"], ExtractionKind::Private),
    (
        &["unavailable", "removed", "deleted"],
        ExtractionKind::Unavailable,
    ),
    (&["age"], ExtractionKind::AgeRestricted),
];

/// Classify a raw resolver error message into an [`ExtractionKind`].
pub fn classify_engine_error(message: &str) -> ExtractionKind {
    let lowered = message.to_lowercase();
    for (keywords, kind) in CLASSIFY_RULES {
        if keywords.iter().any(|kw| lowered.contains(kw)) {
            return *kind;
        }
    }
    ExtractionKind::Transient
}

/// Failure of a parse request, in the order the pipeline can produce them.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The client has exhausted its free extraction quota.
    #[error("Free limit reached. Please sign in to continue.")]
    LimitReached,

    /// The URL's host is not one of the supported platforms.
    #[error("Unsupported platform")]
    Unsupported,

    /// The URL or document points at private / login-gated content.
    #[error("{0}")]
    PrivateOrAuth(String),

    /// The URL or document points at a live stream or premiere.
    #[error("{0}")]
    LiveOrPremiere(String),

    /// The upstream resolver failed after all retry attempts.
    #[error("Failed to extract media info: {0}")]
    Extraction(ExtractionKind),

    /// Unexpected internal fault. Details are logged, never surfaced.
    #[error("Failed to parse media URL")]
    Internal(#[source] anyhow::Error),
}

impl ParseError {
    /// Private/login-gated URL detected before any network call.
    pub fn private_url() -> Self {
        Self::PrivateOrAuth("Private or login-required URLs not supported".to_string())
    }

    /// Live/premiere URL detected before any network call.
    pub fn live_url() -> Self {
        Self::LiveOrPremiere("Live streams and premieres not supported".to_string())
    }

    /// Document declared itself private after extraction.
    pub fn private_content() -> Self {
        Self::PrivateOrAuth("Private content not accessible".to_string())
    }

    /// Document declared itself live after extraction.
    pub fn live_content() -> Self {
        Self::LiveOrPremiere("Live content not supported".to_string())
    }

    /// Machine-readable code for failures a client UI reacts to specifically.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            ParseError::LimitReached => Some("LIMIT_REACHED"),
            _ => None,
        }
    }
}

/// Result alias using the pipeline error type.
pub type Result<T> = std::result::Result<T, ParseError>;
