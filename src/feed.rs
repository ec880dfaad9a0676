//! Feed polling
//!
//! The remote feed is a JSON document listing, per title, the
//! background entries currently on offer (video, thumbnail, optional
//! theme). [`FeedPoller`] is the seam the pipeline depends on;
//! [`HttpFeedPoller`] is the production implementation. The payload is
//! deserialized into typed structs — a required field that is absent is
//! an explicit [`Error::MalformedFeed`], never a silently-skipped item.

use crate::error::{Error, Result};
use crate::types::{AssetDescriptor, FeedScope, TitleId};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Produces the current asset descriptors for a title scope.
///
/// Implementations are expected to return a finite sequence per poll.
/// A failure is fatal for the polled scope but must not affect other,
/// independently polled scopes.
#[async_trait]
pub trait FeedPoller: Send + Sync {
    /// Poll the feed and return every asset descriptor in `scope`,
    /// in feed order.
    async fn poll(&self, scope: &FeedScope) -> Result<Vec<AssetDescriptor>>;
}

/// HTTP implementation of [`FeedPoller`] against the launcher feed endpoint
pub struct HttpFeedPoller {
    http_client: reqwest::Client,
    feed_url: String,
}

impl HttpFeedPoller {
    /// Create a poller for `feed_url`
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(feed_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("bgvault feed poller")
            .build()
            .map_err(Error::Network)?;

        Ok(Self {
            http_client,
            feed_url: feed_url.into(),
        })
    }
}

#[async_trait]
impl FeedPoller for HttpFeedPoller {
    async fn poll(&self, scope: &FeedScope) -> Result<Vec<AssetDescriptor>> {
        debug!(url = %self.feed_url, %scope, "Polling feed");

        let response = self
            .http_client
            .get(&self.feed_url)
            .send()
            .await
            .map_err(|e| Error::FeedUnavailable {
                scope: scope.to_string(),
                reason: e.to_string(),
            })?;

        // Check HTTP status before trying to parse the response body
        let status = response.status();
        if !status.is_success() {
            return Err(Error::FeedUnavailable {
                scope: scope.to_string(),
                reason: format!("feed returned HTTP {}", status.as_u16()),
            });
        }

        let content = response.text().await.map_err(|e| Error::FeedUnavailable {
            scope: scope.to_string(),
            reason: format!("failed to read feed body: {e}"),
        })?;

        let descriptors = parse_payload(&content)?;
        debug!(count = descriptors.len(), "Parsed feed payload");

        Ok(match scope {
            FeedScope::All => descriptors,
            FeedScope::Title(id) => descriptors
                .into_iter()
                .filter(|d| &d.title == id)
                .collect(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct FeedEnvelope {
    data: Option<FeedData>,
}

#[derive(Debug, Deserialize)]
struct FeedData {
    game_info_list: Option<Vec<TitleEntry>>,
}

#[derive(Debug, Deserialize)]
struct TitleEntry {
    game: Option<TitleRef>,
    #[serde(default)]
    backgrounds: Vec<BackgroundEntry>,
}

#[derive(Debug, Deserialize)]
struct TitleRef {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BackgroundEntry {
    background: Option<MediaRef>,
    video: Option<MediaRef>,
    theme: Option<MediaRef>,
}

#[derive(Debug, Deserialize)]
struct MediaRef {
    #[serde(default)]
    url: String,
}

/// Parse the raw feed payload into asset descriptors.
///
/// Entries without a video URL carry no fetchable asset and are
/// skipped. A video-bearing entry without a thumbnail URL, or a title
/// without an id, is malformed.
fn parse_payload(content: &str) -> Result<Vec<AssetDescriptor>> {
    let envelope: FeedEnvelope =
        serde_json::from_str(content).map_err(|e| Error::MalformedFeed {
            reason: format!("payload is not valid JSON: {e}"),
        })?;

    let titles = envelope
        .data
        .ok_or_else(|| Error::MalformedFeed {
            reason: "missing required field: data".into(),
        })?
        .game_info_list
        .ok_or_else(|| Error::MalformedFeed {
            reason: "missing required field: data.game_info_list".into(),
        })?;

    let mut descriptors = Vec::new();
    for entry in titles {
        let title_id = entry
            .game
            .and_then(|g| g.id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::MalformedFeed {
                reason: "title entry missing required field: game.id".into(),
            })?;
        let title = TitleId::from(title_id);

        for background in entry.backgrounds {
            let Some(video_url) = background
                .video
                .map(|v| v.url)
                .filter(|url| !url.is_empty())
            else {
                continue;
            };

            let thumbnail_url = background
                .background
                .map(|b| b.url)
                .filter(|url| !url.is_empty())
                .ok_or_else(|| Error::MalformedFeed {
                    reason: format!(
                        "background entry for title {title} has a video but no thumbnail URL"
                    ),
                })?;

            let theme_url = background.theme.map(|t| t.url).filter(|url| !url.is_empty());

            descriptors.push(AssetDescriptor {
                title: title.clone(),
                video_url,
                thumbnail_url,
                theme_url,
            });
        }
    }

    Ok(descriptors)
}
