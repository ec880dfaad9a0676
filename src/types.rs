//! Core types for bgvault

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a title (a product whose background assets are
/// tracked independently)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TitleId(pub String);

impl TitleId {
    /// Create a new TitleId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TitleId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TitleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TitleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TitleId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

/// The set of titles a feed poll covers
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedScope {
    /// Every title the feed knows about
    All,
    /// A single title
    Title(TitleId),
}

impl std::fmt::Display for FeedScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedScope::All => write!(f, "all titles"),
            FeedScope::Title(id) => write!(f, "title {}", id),
        }
    }
}

/// A feed-supplied record naming one background asset for a title.
///
/// Produced fresh on every poll; never persisted. The video URL doubles
/// as the asset's identifier in the known-identifier set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetDescriptor {
    /// The title this asset belongs to
    pub title: TitleId,

    /// Video URL — the asset identifier
    pub video_url: String,

    /// Thumbnail image URL
    pub thumbnail_url: String,

    /// Optional theme audio/visual URL
    pub theme_url: Option<String>,
}

/// A fetched asset on local disk, ready for post-processing and commit
#[derive(Clone, Debug)]
pub struct DownloadedAsset {
    /// Local path of the downloaded video
    pub video_path: PathBuf,

    /// Local path of the thumbnail, if one was downloaded or derived
    pub thumbnail_path: Option<PathBuf>,

    /// Publish date derived from the video URL, or the time of download
    /// when the URL carries no valid date
    pub published: DateTime<Utc>,
}

/// Durable per-title record: which video identifiers have been processed
/// and when the title was last checked.
///
/// Serialized camelCase to match the on-disk state format:
/// `{ "videoIdentifiers": [...], "checkedAt": "..." }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleRecord {
    /// Video URLs already fetched and processed, in retention order
    pub video_identifiers: Vec<String>,

    /// When this title was last checked against the feed
    pub checked_at: DateTime<Utc>,
}

/// Terminal status of one asset unit within a run
#[derive(Clone, Debug)]
pub enum AssetStatus {
    /// Fetched, post-processed, and committed to state
    Archived {
        /// Final video path (normalized copy if transcoding ran)
        video_path: PathBuf,
        /// Whether the video was normalized by the transcoder
        normalized: bool,
    },
    /// Fetch or disk failure; identifier not committed, retried next run
    Failed {
        /// What went wrong
        reason: String,
    },
}

impl AssetStatus {
    /// True if the asset completed and was committed
    pub fn is_archived(&self) -> bool {
        matches!(self, AssetStatus::Archived { .. })
    }
}

/// Outcome of one asset unit (fetch → process → record)
#[derive(Clone, Debug)]
pub struct AssetOutcome {
    /// The title the asset belongs to
    pub title: TitleId,

    /// The asset identifier (video URL)
    pub video_url: String,

    /// How the unit ended
    pub status: AssetStatus,
}

/// Per-run summary: every asset outcome plus scope-level feed errors.
///
/// A run always attempts every title and every new asset it can
/// discover; this report is how per-asset results surface instead of a
/// whole-run failure.
#[derive(Clone, Debug, Default)]
pub struct RunReport {
    /// Number of titles seen in the feed (after exclusions)
    pub titles_seen: usize,

    /// Outcome of every new asset attempted this run
    pub outcomes: Vec<AssetOutcome>,
}

impl RunReport {
    /// Number of assets archived and committed this run
    pub fn archived(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status.is_archived())
            .count()
    }

    /// Number of assets that failed this run
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.archived()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_id_display_and_from_str_round_trip() {
        let id: TitleId = "4ziysqXOQ8".parse().unwrap();
        assert_eq!(id.to_string(), "4ziysqXOQ8");
        assert_eq!(id, TitleId::from("4ziysqXOQ8"));
    }

    #[test]
    fn title_record_serializes_camel_case() {
        let record = TitleRecord {
            video_identifiers: vec!["https://cdn.example.com/a.webm".into()],
            checked_at: "2024-05-01T12:00:00Z".parse().unwrap(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("videoIdentifiers").is_some());
        assert!(json.get("checkedAt").is_some());
        assert!(json.get("video_identifiers").is_none());
    }

    #[test]
    fn title_record_deserializes_from_wire_format() {
        let json = r#"{
            "videoIdentifiers": ["https://cdn.example.com/a.webm", "https://cdn.example.com/b.webm"],
            "checkedAt": "2024-05-01T12:00:00Z"
        }"#;
        let record: TitleRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.video_identifiers.len(), 2);
    }

    #[test]
    fn feed_scope_display() {
        assert_eq!(FeedScope::All.to_string(), "all titles");
        assert_eq!(
            FeedScope::Title(TitleId::from("abc")).to_string(),
            "title abc"
        );
    }

    #[test]
    fn run_report_counts_archived_and_failed() {
        let report = RunReport {
            titles_seen: 2,
            outcomes: vec![
                AssetOutcome {
                    title: TitleId::from("t1"),
                    video_url: "u1".into(),
                    status: AssetStatus::Archived {
                        video_path: PathBuf::from("archive/t1/20240501_a.webm"),
                        normalized: true,
                    },
                },
                AssetOutcome {
                    title: TitleId::from("t2"),
                    video_url: "u2".into(),
                    status: AssetStatus::Failed {
                        reason: "timed out".into(),
                    },
                },
            ],
        };
        assert_eq!(report.archived(), 1);
        assert_eq!(report.failed(), 1);
    }
}
