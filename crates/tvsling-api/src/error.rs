use thiserror::Error;

/// Top-level error type for the `tvsling-api` crate.
///
/// Covers every failure mode across all HTTP surfaces: device info,
/// enrollment, server info, and archive download. `tvsling-core` maps
/// these into per-operation error types.
#[derive(Debug, Error)]
pub enum ApiError {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Unexpected HTTP status from an endpoint.
    #[error("HTTP {status} from {endpoint}")]
    Http { status: u16, endpoint: String },

    // ── Enrollment ──────────────────────────────────────────────────
    /// The vendor enrollment endpoint rejected the request.
    #[error("Enrollment rejected (HTTP {status}): {message}")]
    Enrollment { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with a body preview for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Download ────────────────────────────────────────────────────
    /// Local file I/O while writing a download.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation aborted via the cancellation token.
    #[error("Operation cancelled")]
    Cancelled,
}

impl ApiError {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Http { status, .. } => *status >= 500,
            Self::Enrollment { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Build a deserialization error carrying a truncated body preview.
    pub(crate) fn deserialization(err: &serde_json::Error, body: &str) -> Self {
        let preview = truncate_body(body, 200);
        Self::Deserialization {
            message: format!("{err} (body preview: {preview:?})"),
            body: body.to_owned(),
        }
    }
}

/// Cap a response body at `max` bytes for error messages, backing off to
/// the nearest char boundary so multi-byte UTF-8 never splits.
pub(crate) fn truncate_body(body: &str, max: usize) -> &str {
    if body.len() <= max {
        return body;
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        let body = format!("{}€ rejected", "a".repeat(199));
        let preview = truncate_body(&body, 200);
        assert_eq!(preview.len(), 199);
        assert!(preview.chars().all(|c| c == 'a'));

        assert_eq!(truncate_body("short", 200), "short");
        assert_eq!(truncate_body("€€€", 4), "€");
    }
}
