//! The archiver pipeline
//!
//! Wires the stages together: poll the feed, diff against the known
//! sets, then run each new asset through fetch → post-process → commit.
//! Each asset unit is independent; a failed unit is logged, reported,
//! and retried on the next run because its identifier is only committed
//! after fetch and post-processing both succeed.

use crate::config::{ArchiverConfig, ThumbnailSource};
use crate::differ::diff_new_assets;
use crate::error::Result;
use crate::feed::FeedPoller;
use crate::fetcher::Fetcher;
use crate::state::StateStore;
use crate::transcode::{self, Transcoder};
use crate::types::{
    AssetDescriptor, AssetOutcome, AssetStatus, FeedScope, RunReport, TitleId,
};
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// The change-detection, idempotent-fetch, and state-persistence pipeline
///
/// # Example
///
/// ```no_run
/// use bgvault::{Archiver, ArchiverConfig, FeedScope, HttpFeedPoller};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ArchiverConfig::default();
///     let feed = HttpFeedPoller::new(
///         "https://launcher.example.com/api/getAllGameBasicInfo",
///         config.http_timeout,
///     )?;
///
///     let mut archiver = Archiver::new(config, Box::new(feed)).await?;
///     let report = archiver.run_once(&FeedScope::All).await?;
///     println!("archived {} assets", report.archived());
///     Ok(())
/// }
/// ```
pub struct Archiver {
    config: ArchiverConfig,
    feed: Box<dyn FeedPoller>,
    fetcher: Fetcher,
    transcoder: Box<dyn Transcoder>,
    state: StateStore,
}

impl std::fmt::Debug for Archiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archiver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Archiver {
    /// Create an archiver from configuration and a feed collaborator.
    ///
    /// Opens the state file and discovers the transcoder binary.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the state file
    /// is corrupt, or the HTTP client cannot be created.
    pub async fn new(config: ArchiverConfig, feed: Box<dyn FeedPoller>) -> Result<Self> {
        config.validate()?;

        let state = StateStore::open(&config.state_file, config.retention).await?;
        let fetcher = Fetcher::new(
            config.archive_root.clone(),
            config.retry.clone(),
            config.http_timeout,
        )?;
        let transcoder = transcode::from_tools_config(&config.tools);
        info!(
            transcoder = transcoder.name(),
            state_file = %config.state_file.display(),
            known_titles = state.title_count(),
            "Archiver initialized"
        );

        Ok(Self {
            config,
            feed,
            fetcher,
            transcoder,
            state,
        })
    }

    /// Replace the transcoder (custom implementations, tests)
    #[must_use]
    pub fn with_transcoder(mut self, transcoder: Box<dyn Transcoder>) -> Self {
        self.transcoder = transcoder;
        self
    }

    /// The configuration this archiver runs with
    pub fn config(&self) -> &ArchiverConfig {
        &self.config
    }

    /// Read access to the persisted state
    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Execute one full pipeline pass over `scope`.
    ///
    /// Always attempts every title and every new asset it can discover;
    /// per-asset failures are captured in the report, not propagated.
    ///
    /// # Errors
    ///
    /// Returns an error only for scope-level failures: the feed being
    /// unavailable or malformed, or the state file being unwritable.
    pub async fn run_once(&mut self, scope: &FeedScope) -> Result<RunReport> {
        let descriptors = self.feed.poll(scope).await?;

        let mut report = RunReport::default();
        for (title, title_descriptors) in group_by_title(descriptors) {
            if self.config.excluded_titles.contains(&title) {
                debug!(%title, "Title excluded, skipping");
                continue;
            }
            report.titles_seen += 1;

            let known = self.state.known(&title).to_vec();
            let new_assets = diff_new_assets(title_descriptors, &known);
            if new_assets.is_empty() {
                debug!(%title, "No new assets");
                continue;
            }
            info!(%title, count = new_assets.len(), "New assets detected");

            for descriptor in new_assets {
                let status = match self.process_asset(&descriptor).await {
                    Ok((video_path, normalized)) => {
                        // Commit only this identifier: siblings that
                        // failed earlier stay uncommitted and retry
                        self.state
                            .commit(
                                &title,
                                std::slice::from_ref(&descriptor.video_url),
                                Utc::now(),
                            )
                            .await?;
                        info!(%title, url = %descriptor.video_url, "Asset archived");
                        AssetStatus::Archived {
                            video_path,
                            normalized,
                        }
                    }
                    Err(e) => {
                        warn!(
                            %title,
                            url = %descriptor.video_url,
                            error = %e,
                            "Asset failed, will retry next run"
                        );
                        AssetStatus::Failed {
                            reason: e.to_string(),
                        }
                    }
                };
                report.outcomes.push(AssetOutcome {
                    title: title.clone(),
                    video_url: descriptor.video_url,
                    status,
                });
            }
        }

        info!(
            titles = report.titles_seen,
            archived = report.archived(),
            failed = report.failed(),
            "Run complete"
        );
        Ok(report)
    }

    /// Run several scopes independently.
    ///
    /// A feed failure in one scope is logged and reported without
    /// aborting the remaining scopes.
    pub async fn run_scopes(
        &mut self,
        scopes: &[FeedScope],
    ) -> Vec<(FeedScope, Result<RunReport>)> {
        let mut results = Vec::with_capacity(scopes.len());
        for scope in scopes {
            let result = self.run_once(scope).await;
            if let Err(e) = &result {
                error!(%scope, error = %e, "Scope failed");
            }
            results.push((scope.clone(), result));
        }
        results
    }

    /// One asset unit: fetch, then best-effort normalization and
    /// thumbnail derivation. Only fetch errors are fatal to the unit.
    async fn process_asset(&self, descriptor: &AssetDescriptor) -> Result<(PathBuf, bool)> {
        let want_feed_thumbnail = self.config.thumbnail_source == ThumbnailSource::Feed;
        let downloaded = self.fetcher.fetch(descriptor, want_feed_thumbnail).await?;

        let mut video_path = downloaded.video_path.clone();
        let mut normalized = false;
        if transcode::needs_normalization(&downloaded.video_path) {
            match self.transcoder.normalize(&downloaded.video_path).await {
                Ok(output) => {
                    info!(
                        input = %downloaded.video_path.display(),
                        output = %output.display(),
                        "Video normalized"
                    );
                    video_path = output;
                    normalized = true;
                }
                Err(e) => {
                    warn!(
                        path = %downloaded.video_path.display(),
                        error = %e,
                        "Skipping normalization, keeping original file"
                    );
                }
            }
        }

        if self.config.thumbnail_source == ThumbnailSource::ExtractFromVideo {
            match self.transcoder.extract_thumbnail(&video_path).await {
                Ok(thumb) => {
                    debug!(path = %thumb.display(), "Thumbnail extracted");
                }
                Err(e) => {
                    warn!(
                        path = %video_path.display(),
                        error = %e,
                        "Could not derive thumbnail"
                    );
                }
            }
        }

        Ok((video_path, normalized))
    }
}

/// Group descriptors per title, preserving feed order of both titles
/// and the assets within each title
fn group_by_title(descriptors: Vec<AssetDescriptor>) -> Vec<(TitleId, Vec<AssetDescriptor>)> {
    let mut order: Vec<TitleId> = Vec::new();
    let mut groups: HashMap<TitleId, Vec<AssetDescriptor>> = HashMap::new();
    for descriptor in descriptors {
        if !groups.contains_key(&descriptor.title) {
            order.push(descriptor.title.clone());
        }
        groups
            .entry(descriptor.title.clone())
            .or_default()
            .push(descriptor);
    }
    order
        .into_iter()
        .map(|title| {
            let group = groups.remove(&title).unwrap_or_default();
            (title, group)
        })
        .collect()
}
