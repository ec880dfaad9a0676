//! Durable per-title state: the known-identifier sets
//!
//! State lives in a single JSON file mapping title id to
//! `{ videoIdentifiers, checkedAt }`. Commits rewrite the whole file
//! through a temp-then-rename so a crash mid-write never corrupts
//! previously-committed state. The known set only ever grows; the
//! pipeline never removes an identifier once recorded.

use crate::config::RetentionPolicy;
use crate::error::{Error, Result};
use crate::types::{TitleId, TitleRecord};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads and persists the per-title known-identifier sets
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    retention: RetentionPolicy,
    records: BTreeMap<TitleId, TitleRecord>,
}

impl StateStore {
    /// Open the state file at `path`, or start empty if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StateCorrupt`] if the file exists but cannot be
    /// parsed — the caller is expected to fail the run loudly rather
    /// than silently resetting state.
    pub async fn open(path: impl Into<PathBuf>, retention: RetentionPolicy) -> Result<Self> {
        let path = path.into();
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| Error::StateCorrupt {
                    path: path.clone(),
                    reason: e.to_string(),
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No state file yet, starting empty");
                BTreeMap::new()
            }
            Err(e) => return Err(Error::Io(e)),
        };

        Ok(Self {
            path,
            retention,
            records,
        })
    }

    /// The known identifiers for a title, empty if the title is unseen.
    ///
    /// Order reflects the configured retention policy.
    pub fn known(&self, title: &TitleId) -> &[String] {
        self.records
            .get(title)
            .map(|r| r.video_identifiers.as_slice())
            .unwrap_or(&[])
    }

    /// The full persisted record for a title, if any
    pub fn record(&self, title: &TitleId) -> Option<&TitleRecord> {
        self.records.get(title)
    }

    /// Number of titles with a persisted record
    pub fn title_count(&self) -> usize {
        self.records.len()
    }

    /// Merge `new_identifiers` into the title's known set and persist.
    ///
    /// Identifiers already present are ignored, so the set is
    /// monotonically non-decreasing. The title's `checkedAt` timestamp
    /// is set to `observed_at`. The write is atomic with respect to a
    /// single process: the full state is serialized to a temp file and
    /// renamed over the previous one.
    pub async fn commit(
        &mut self,
        title: &TitleId,
        new_identifiers: &[String],
        observed_at: DateTime<Utc>,
    ) -> Result<()> {
        let record = self
            .records
            .entry(title.clone())
            .or_insert_with(|| TitleRecord {
                video_identifiers: Vec::new(),
                checked_at: observed_at,
            });

        let fresh: Vec<String> = new_identifiers
            .iter()
            .filter(|id| !record.video_identifiers.contains(id))
            .cloned()
            .collect();

        match self.retention {
            RetentionPolicy::Append => record.video_identifiers.extend(fresh),
            // New block goes to the front, keeping its feed-relative order
            RetentionPolicy::Prepend => {
                record.video_identifiers.splice(0..0, fresh);
            }
        }
        record.checked_at = observed_at;

        self.persist().await
    }

    async fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(&self.records)?;
        let tmp = temp_path(&self.path);
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(
            path = %self.path.display(),
            titles = self.records.len(),
            "State persisted"
        );
        Ok(())
    }
}

/// Sibling temp path used for the atomic rewrite: `last_check.json.tmp`
fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
