//! Error types for bgvault
//!
//! The taxonomy mirrors the failure domains of the pipeline: the feed
//! (scope-level), individual asset fetches, the external transcoder
//! (never fatal), and the persisted state file.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for bgvault operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bgvault
#[derive(Debug, Error)]
pub enum Error {
    /// The remote feed was unreachable or returned a non-success status.
    ///
    /// Fatal to the current title scope; independent scopes are unaffected.
    #[error("feed unavailable for {scope}: {reason}")]
    FeedUnavailable {
        /// The title scope being polled when the failure occurred
        scope: String,
        /// What went wrong (connect error, HTTP status, timeout)
        reason: String,
    },

    /// The feed responded but the payload was missing required fields
    /// or could not be parsed.
    #[error("malformed feed: {reason}")]
    MalformedFeed {
        /// Which field or structure was missing/invalid
        reason: String,
    },

    /// Downloading an asset's video or thumbnail stream failed.
    ///
    /// Fatal to that asset only. The identifier is not committed, so the
    /// asset is retried on the next run.
    #[error("fetch failed for {url}: {reason}")]
    FetchFailed {
        /// The URL being fetched
        url: String,
        /// Network or disk error description
        reason: String,
    },

    /// No transcoder binary is available in the environment.
    ///
    /// Non-fatal: the original file remains the deliverable.
    #[error("transcoder unavailable: {0}")]
    TranscodeUnavailable(String),

    /// The transcoder ran but exited with failure.
    ///
    /// Non-fatal: the original file remains the deliverable.
    #[error("transcode failed for {path}: {reason}")]
    TranscodeFailed {
        /// The input video that could not be normalized
        path: PathBuf,
        /// Tool stderr or exit status description
        reason: String,
    },

    /// The persisted state file exists but cannot be parsed.
    ///
    /// The run fails loudly rather than silently resetting to an empty
    /// state, which would re-download every asset ever seen.
    #[error("state file {path} is corrupt: {reason}")]
    StateCorrupt {
        /// Path of the unreadable state file
        path: PathBuf,
        /// Parse error description
        reason: String,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "archive_root")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error is a transcoder problem, which the pipeline
    /// treats as a warning rather than an asset failure.
    pub fn is_transcode(&self) -> bool {
        matches!(
            self,
            Error::TranscodeUnavailable(_) | Error::TranscodeFailed { .. }
        )
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_scope_and_reason_for_feed_unavailable() {
        let err = Error::FeedUnavailable {
            scope: "all titles".into(),
            reason: "connection refused".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("all titles"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn display_includes_url_for_fetch_failed() {
        let err = Error::FetchFailed {
            url: "https://cdn.example.com/v.webm".into(),
            reason: "timed out".into(),
        };
        assert!(err.to_string().contains("https://cdn.example.com/v.webm"));
    }

    #[test]
    fn transcode_errors_are_classified_as_transcode() {
        assert!(Error::TranscodeUnavailable("no ffmpeg".into()).is_transcode());
        assert!(
            Error::TranscodeFailed {
                path: PathBuf::from("a.webm"),
                reason: "exit 1".into(),
            }
            .is_transcode()
        );
    }

    #[test]
    fn fetch_and_state_errors_are_not_transcode() {
        let fetch = Error::FetchFailed {
            url: "u".into(),
            reason: "r".into(),
        };
        let state = Error::StateCorrupt {
            path: PathBuf::from("last_check.json"),
            reason: "expected value at line 1".into(),
        };
        assert!(!fetch.is_transcode());
        assert!(!state.is_transcode());
    }

    #[test]
    fn io_errors_convert_via_from() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn serde_errors_convert_via_from() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = parse.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
