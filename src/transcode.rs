//! Video normalization via an external transcoder
//!
//! The transcoder is an opaque external tool (ffmpeg). It is invoked to
//! re-encode downloaded videos into a portable H.264 container and to
//! derive a single-frame thumbnail. Transcoding is strictly best-effort:
//! a missing binary or a failed run is reported as a warning by the
//! pipeline and the original file remains the deliverable.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Container extensions that require normalization before archiving
const NORMALIZE_EXTENSIONS: &[&str] = &["webm"];

/// Extension of normalized output videos
const NORMALIZED_EXT: &str = "mp4";

/// Extension of extracted thumbnail frames
const THUMBNAIL_EXT: &str = "jpg";

/// Whether a video's container format requires normalization
#[must_use]
pub fn needs_normalization(video: &Path) -> bool {
    video
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            NORMALIZE_EXTENSIONS
                .iter()
                .any(|n| ext.eq_ignore_ascii_case(n))
        })
        .unwrap_or(false)
}

/// External video transcoder
///
/// Implementations normalize a video into the standardized codec and
/// can derive a single-frame thumbnail image from it.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Re-encode `video` into the standardized codec.
    ///
    /// Returns the path of the normalized copy, written at the same
    /// stem with a new extension. The original file is left in place.
    async fn normalize(&self, video: &Path) -> Result<PathBuf>;

    /// Derive a single-frame thumbnail image from `video`, at the same
    /// stem with an image extension.
    async fn extract_thumbnail(&self, video: &Path) -> Result<PathBuf>;

    /// Handler name for logging
    fn name(&self) -> &'static str;
}

/// CLI-based transcoder using an external ffmpeg binary
pub struct CliTranscoder {
    binary_path: PathBuf,
}

impl CliTranscoder {
    /// Create a transcoder with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find ffmpeg in PATH
    ///
    /// Returns `Some(CliTranscoder)` if the binary is found, `None` otherwise.
    pub fn from_path() -> Option<Self> {
        which::which("ffmpeg").ok().map(Self::new)
    }

    async fn run(&self, video: &Path, args: &[&str], output: &Path) -> Result<()> {
        let result = Command::new(&self.binary_path)
            .arg("-i")
            .arg(video)
            .args(args)
            .arg("-y")
            .arg(output)
            .output()
            .await
            .map_err(|e| Error::TranscodeFailed {
                path: video.to_path_buf(),
                reason: format!("failed to execute {}: {e}", self.binary_path.display()),
            })?;

        if !result.status.success() {
            return Err(Error::TranscodeFailed {
                path: video.to_path_buf(),
                reason: stderr_summary(&result.stderr, result.status.code()),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Transcoder for CliTranscoder {
    async fn normalize(&self, video: &Path) -> Result<PathBuf> {
        let output = video.with_extension(NORMALIZED_EXT);
        self.run(
            video,
            &[
                "-c:v",
                "libx264",
                "-profile:v",
                "high",
                "-level",
                "4.0",
                "-pix_fmt",
                "yuv420p",
                "-preset",
                "medium",
                "-crf",
                "23",
            ],
            &output,
        )
        .await?;
        Ok(output)
    }

    async fn extract_thumbnail(&self, video: &Path) -> Result<PathBuf> {
        let output = video.with_extension(THUMBNAIL_EXT);
        self.run(video, &["-frames:v", "1", "-q:v", "2"], &output)
            .await?;
        Ok(output)
    }

    fn name(&self) -> &'static str {
        "cli-ffmpeg"
    }
}

/// No-op transcoder used when no ffmpeg binary is available
///
/// Provides graceful degradation: both operations return
/// [`Error::TranscodeUnavailable`], which the pipeline downgrades to a
/// warning while keeping the original file.
pub struct NoOpTranscoder;

#[async_trait]
impl Transcoder for NoOpTranscoder {
    async fn normalize(&self, _video: &Path) -> Result<PathBuf> {
        Err(Error::TranscodeUnavailable(
            "video normalization requires ffmpeg. \
             Configure tools.ffmpeg_path or ensure ffmpeg is in PATH."
                .into(),
        ))
    }

    async fn extract_thumbnail(&self, _video: &Path) -> Result<PathBuf> {
        Err(Error::TranscodeUnavailable(
            "thumbnail extraction requires ffmpeg. \
             Configure tools.ffmpeg_path or ensure ffmpeg is in PATH."
                .into(),
        ))
    }

    fn name(&self) -> &'static str {
        "no-op"
    }
}

/// Build a transcoder from tool configuration: explicit path wins,
/// then PATH discovery, then the no-op fallback.
pub fn from_tools_config(tools: &crate::config::ToolsConfig) -> Box<dyn Transcoder> {
    if let Some(path) = &tools.ffmpeg_path {
        return Box::new(CliTranscoder::new(path.clone()));
    }
    if tools.search_path
        && let Some(transcoder) = CliTranscoder::from_path()
    {
        return Box::new(transcoder);
    }
    Box::new(NoOpTranscoder)
}

/// Last non-empty stderr line, or the exit code when stderr is silent
fn stderr_summary(stderr: &[u8], code: Option<i32>) -> String {
    let text = String::from_utf8_lossy(stderr);
    text.lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim().to_string())
        .unwrap_or_else(|| match code {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".to_string(),
        })
}
