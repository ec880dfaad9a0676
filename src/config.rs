//! Configuration types for bgvault
//!
//! Configuration is an explicit value handed to [`crate::Archiver`];
//! nothing in the crate reads process-wide constants or environment
//! globals.

use crate::types::TitleId;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::PathBuf, time::Duration};

/// How newly seen identifiers are merged into a title's known set.
///
/// Both policies only ever grow the set; an identifier is never dropped.
/// A replace mode is deliberately not offered because it would shrink
/// the persisted set and break the pipeline's monotonicity guarantee.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// New identifiers go to the end of the stored sequence (default)
    #[default]
    Append,
    /// New identifiers go to the front, newest first
    Prepend,
}

/// Where an asset's thumbnail comes from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThumbnailSource {
    /// Download the thumbnail URL supplied by the feed (default)
    #[default]
    Feed,
    /// Extract a single frame from the downloaded video via the transcoder
    ExtractFromVideo,
}

/// External tool paths
///
/// Groups settings for the transcoder binary. Used as a nested
/// sub-config within [`ArchiverConfig`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for ffmpeg if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            search_path: true,
        }
    }
}

/// Retry behavior for transient network failures during fetches
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Main configuration for the archiver pipeline
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiverConfig {
    /// Root directory assets are archived under (default: "./archive")
    #[serde(default = "default_archive_root")]
    pub archive_root: PathBuf,

    /// Path of the JSON state file (default: "./last_check.json")
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Titles to skip entirely, even when the feed lists them
    #[serde(default)]
    pub excluded_titles: HashSet<TitleId>,

    /// How newly seen identifiers are merged into the known set
    #[serde(default)]
    pub retention: RetentionPolicy,

    /// Where thumbnails come from
    #[serde(default)]
    pub thumbnail_source: ThumbnailSource,

    /// Interval between scheduled runs (default: 15 minutes)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// HTTP timeout for feed and asset requests (default: 30 seconds)
    #[serde(default = "default_http_timeout", with = "duration_serde")]
    pub http_timeout: Duration,

    /// External tool paths
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Retry behavior for transient network failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            archive_root: default_archive_root(),
            state_file: default_state_file(),
            excluded_titles: HashSet::new(),
            retention: RetentionPolicy::default(),
            thumbnail_source: ThumbnailSource::default(),
            poll_interval: default_poll_interval(),
            http_timeout: default_http_timeout(),
            tools: ToolsConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl ArchiverConfig {
    /// Validate settings that would otherwise fail deep inside a run
    pub fn validate(&self) -> crate::Result<()> {
        if self.archive_root.as_os_str().is_empty() {
            return Err(crate::Error::Config {
                message: "archive_root must not be empty".into(),
                key: Some("archive_root".into()),
            });
        }
        if self.state_file.as_os_str().is_empty() {
            return Err(crate::Error::Config {
                message: "state_file must not be empty".into(),
                key: Some("state_file".into()),
            });
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(crate::Error::Config {
                message: format!(
                    "backoff_multiplier must be >= 1.0, got {}",
                    self.retry.backoff_multiplier
                ),
                key: Some("retry.backoff_multiplier".into()),
            });
        }
        Ok(())
    }
}

fn default_archive_root() -> PathBuf {
    PathBuf::from("./archive")
}

fn default_state_file() -> PathBuf {
    PathBuf::from("./last_check.json")
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        ArchiverConfig::default().validate().unwrap();
    }

    #[test]
    fn empty_archive_root_is_rejected() {
        let config = ArchiverConfig {
            archive_root: PathBuf::new(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, crate::Error::Config { key: Some(k), .. } if k == "archive_root"));
    }

    #[test]
    fn sub_unit_backoff_multiplier_is_rejected() {
        let config = ArchiverConfig {
            retry: RetryConfig {
                backoff_multiplier: 0.5,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_deserializes_with_all_fields_defaulted() {
        let config: ArchiverConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.archive_root, PathBuf::from("./archive"));
        assert_eq!(config.state_file, PathBuf::from("./last_check.json"));
        assert_eq!(config.retention, RetentionPolicy::Append);
        assert_eq!(config.thumbnail_source, ThumbnailSource::Feed);
        assert!(config.excluded_titles.is_empty());
        assert!(config.tools.search_path);
    }

    #[test]
    fn retention_and_thumbnail_source_use_snake_case_names() {
        let json = r#"{
            "retention": "prepend",
            "thumbnail_source": "extract_from_video"
        }"#;
        let config: ArchiverConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.retention, RetentionPolicy::Prepend);
        assert_eq!(config.thumbnail_source, ThumbnailSource::ExtractFromVideo);
    }

    #[test]
    fn durations_round_trip_as_seconds() {
        let config = ArchiverConfig {
            poll_interval: Duration::from_secs(600),
            ..Default::default()
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["poll_interval"], 600);
        let back: ArchiverConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back.poll_interval, Duration::from_secs(600));
    }

    #[test]
    fn excluded_titles_deserialize_as_plain_strings() {
        let json = r#"{ "excluded_titles": ["bxPTXSET5t", "g0mMIvshDb"] }"#;
        let config: ArchiverConfig = serde_json::from_str(json).unwrap();
        assert!(config.excluded_titles.contains(&TitleId::from("bxPTXSET5t")));
        assert_eq!(config.excluded_titles.len(), 2);
    }
}
