//! Asset fetching
//!
//! Streams a descriptor's video and thumbnail to the archive under a
//! deterministic dated path:
//! `{archive_root}/{titleId}/{YYYYMMDD}_{basename(videoUrl)}`. The date
//! tag comes from the video URL when it carries a valid calendar date,
//! otherwise from the clock. Destination files are opened with
//! create/truncate semantics, so a partial file from an interrupted run
//! is overwritten on retry, never appended to.

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::retry::retry_with_backoff;
use crate::types::{AssetDescriptor, DownloadedAsset};
use chrono::{DateTime, NaiveDate, Utc};
use futures::StreamExt;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Publish dates outside this range are treated as bogus URL noise
const MIN_PUBLISH_YEAR: i32 = 2020;
const MAX_PUBLISH_YEAR: i32 = 2050;

/// Extension used when a thumbnail URL has no parseable extension
const DEFAULT_THUMBNAIL_EXT: &str = "jpg";

/// Downloads feed assets into the archive layout
pub struct Fetcher {
    http_client: reqwest::Client,
    archive_root: PathBuf,
    retry: RetryConfig,
}

impl Fetcher {
    /// Create a fetcher writing under `archive_root`
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(archive_root: PathBuf, retry: RetryConfig, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("bgvault asset fetcher")
            .build()
            .map_err(Error::Network)?;

        Ok(Self {
            http_client,
            archive_root,
            retry,
        })
    }

    /// Derive the destination video path and publish date for a descriptor.
    ///
    /// Distinct video URLs within a title map to distinct paths as long
    /// as the remote scheme never reuses a basename on the same date.
    pub fn destination(&self, descriptor: &AssetDescriptor) -> Result<(PathBuf, DateTime<Utc>)> {
        let published = publish_date(&descriptor.video_url).unwrap_or_else(Utc::now);
        let basename = base_filename(&descriptor.video_url)?;
        let filename = format!("{}_{}", published.format("%Y%m%d"), basename);
        let path = self
            .archive_root
            .join(descriptor.title.as_str())
            .join(filename);
        Ok((path, published))
    }

    /// Stream the descriptor's video — and, when `want_thumbnail` is
    /// set, its thumbnail — into the archive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FetchFailed`] if either stream errors over the
    /// network or on disk. The partially-written file of the failed
    /// stream is removed so nothing downstream can reference it.
    pub async fn fetch(
        &self,
        descriptor: &AssetDescriptor,
        want_thumbnail: bool,
    ) -> Result<DownloadedAsset> {
        let (video_path, published) = self.destination(descriptor)?;
        if let Some(parent) = video_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!(
            url = %descriptor.video_url,
            dest = %video_path.display(),
            "Downloading new video"
        );
        self.download(&descriptor.video_url, &video_path).await?;

        let thumbnail_path = if want_thumbnail {
            let ext = url_extension(&descriptor.thumbnail_url)
                .unwrap_or_else(|| DEFAULT_THUMBNAIL_EXT.to_string());
            let path = video_path.with_extension(ext);
            debug!(
                url = %descriptor.thumbnail_url,
                dest = %path.display(),
                "Downloading thumbnail"
            );
            self.download(&descriptor.thumbnail_url, &path).await?;
            Some(path)
        } else {
            None
        };

        Ok(DownloadedAsset {
            video_path,
            thumbnail_path,
            published,
        })
    }

    /// Stream one URL to one file, retrying transient network failures.
    /// On final failure the partial file is removed.
    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let result = retry_with_backoff(&self.retry, || self.stream_to_file(url, dest)).await;

        if let Err(e) = result {
            if let Err(cleanup) = tokio::fs::remove_file(dest).await
                && cleanup.kind() != std::io::ErrorKind::NotFound
            {
                warn!(
                    path = %dest.display(),
                    error = %cleanup,
                    "Could not remove partial file"
                );
            }
            return Err(Error::FetchFailed {
                url: url.to_string(),
                reason: e.to_string(),
            });
        }
        Ok(())
    }

    async fn stream_to_file(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self.http_client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::FetchFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", status.as_u16()),
            });
        }

        // create() truncates, discarding any partial write from an
        // earlier attempt or an interrupted run
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

/// Extract a publish date from a URL of the form `.../2024/05/01/...`.
///
/// The date must be a real calendar date (no Feb 30) within a sane year
/// range; anything else is ignored and the caller falls back to now.
fn publish_date(url: &str) -> Option<DateTime<Utc>> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"/(\d{4})/(\d{2})/(\d{2})/").unwrap_or_else(|e| {
            // The pattern is a literal; this cannot fail at runtime
            unreachable!("invalid date pattern: {e}")
        })
    });

    let captures = pattern.captures(url)?;
    let year: i32 = captures[1].parse().ok()?;
    let month: u32 = captures[2].parse().ok()?;
    let day: u32 = captures[3].parse().ok()?;

    if !(MIN_PUBLISH_YEAR..=MAX_PUBLISH_YEAR).contains(&year) {
        return None;
    }

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    date.and_hms_opt(0, 0, 0)
        .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
}

/// The last path segment of a URL, used as the archived basename
fn base_filename(raw_url: &str) -> Result<String> {
    let parsed = url::Url::parse(raw_url).map_err(|e| Error::FetchFailed {
        url: raw_url.to_string(),
        reason: format!("not a valid URL: {e}"),
    })?;

    parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back().map(|s| s.to_string()))
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::FetchFailed {
            url: raw_url.to_string(),
            reason: "URL path has no filename".into(),
        })
}

/// The extension of a URL's last path segment, if any
fn url_extension(raw_url: &str) -> Option<String> {
    let parsed = url::Url::parse(raw_url).ok()?;
    let last = parsed.path_segments()?.next_back()?.to_string();
    Path::new(&last)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_string())
}
