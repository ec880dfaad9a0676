//! # bgvault
//!
//! Library for archiving launcher background media assets.
//!
//! bgvault polls a remote feed describing per-title background assets
//! (video, thumbnail, theme), detects assets it has not seen before,
//! streams them into a dated archive layout, normalizes video via an
//! external transcoder when one is available, and durably records what
//! has been processed so repeated runs do no redundant work.
//!
//! ## Design Philosophy
//!
//! - **Idempotent** - an unchanged feed means a no-op run
//! - **Per-asset isolation** - one failed download never blocks siblings
//! - **Commit-after-success** - an identifier is recorded only once its
//!   fetch and post-processing completed, so failures retry next run
//! - **Library-first** - no CLI or UI, purely a Rust crate for embedding
//!
//! ## Quick Start
//!
//! ```no_run
//! use bgvault::{Archiver, ArchiverConfig, FeedScope, HttpFeedPoller};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ArchiverConfig {
//!         archive_root: "./archive".into(),
//!         state_file: "./last_check.json".into(),
//!         ..Default::default()
//!     };
//!
//!     let feed = HttpFeedPoller::new(
//!         "https://launcher.example.com/api/getAllGameBasicInfo",
//!         config.http_timeout,
//!     )?;
//!
//!     let mut archiver = Archiver::new(config, Box::new(feed)).await?;
//!     let report = archiver.run_once(&FeedScope::All).await?;
//!     println!("archived {}, failed {}", report.archived(), report.failed());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// New-asset detection
pub mod differ;
/// Error types
pub mod error;
/// Feed polling
pub mod feed;
/// Asset fetching into the archive layout
pub mod fetcher;
/// The archiver pipeline
pub mod pipeline;
/// Retry logic with exponential backoff
pub mod retry;
/// Periodic pipeline scheduling
pub mod scheduler;
/// Durable per-title state
pub mod state;
/// Video normalization via an external transcoder
pub mod transcode;
/// Core types
pub mod types;

// Re-export commonly used types
pub use config::{ArchiverConfig, RetentionPolicy, RetryConfig, ThumbnailSource, ToolsConfig};
pub use error::{Error, Result};
pub use feed::{FeedPoller, HttpFeedPoller};
pub use fetcher::Fetcher;
pub use pipeline::Archiver;
pub use scheduler::Scheduler;
pub use state::StateStore;
pub use transcode::{CliTranscoder, NoOpTranscoder, Transcoder};
pub use types::{
    AssetDescriptor, AssetOutcome, AssetStatus, DownloadedAsset, FeedScope, RunReport, TitleId,
    TitleRecord,
};

/// Helper function to run a scheduler with graceful signal handling.
///
/// Spawns the scheduling loop, waits for a termination signal, then
/// flips the scheduler's shutdown flag and waits for the loop to exit.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use bgvault::{Archiver, ArchiverConfig, FeedScope, HttpFeedPoller, Scheduler};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ArchiverConfig::default();
///     let feed = HttpFeedPoller::new("https://example.com/feed", config.http_timeout)?;
///     let archiver = Archiver::new(config, Box::new(feed)).await?;
///
///     let scheduler = Scheduler::new(archiver, FeedScope::All);
///     bgvault::run_with_shutdown(scheduler).await;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(scheduler: Scheduler) {
    let shutdown = scheduler.shutdown_handle();
    let handle = tokio::spawn(scheduler.run());

    wait_for_signal().await;
    shutdown.store(true, std::sync::atomic::Ordering::SeqCst);

    if let Err(e) = handle.await {
        tracing::error!(error = %e, "Scheduler task ended abnormally");
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
