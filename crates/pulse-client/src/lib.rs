//! # pulse-client
//!
//! REST client and reconciliation layer for the PULSE task-run monitoring
//! library.
//!
//! This crate provides:
//! - [`api`] - HTTP client for the backend task-summary endpoint
//! - [`reconciler`] - Normalize/diff layer with a typed notice side channel
//! - [`feed`] - The [`TaskFeed`] facade a view consumer holds
//!
//! ## Example
//!
//! ```no_run
//! use pulse_client::api::{ApiConfig, SummaryApi};
//! use pulse_client::feed::{FeedConfig, TaskFeed};
//!
//! # async fn demo() -> pulse_core::Result<()> {
//! let api = SummaryApi::new(ApiConfig::new("https://backend.example.com/api"))?;
//! let (feed, mut notices) = TaskFeed::new(api, FeedConfig::new("user-42"));
//!
//! feed.refresh().await;
//! feed.start_polling();
//!
//! while let Some(notice) = notices.recv().await {
//!     tracing::info!(task_id = notice.task_id(), "task notice");
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod feed;
pub mod reconciler;

// Re-export main types for convenience
pub use api::{ApiConfig, SummaryApi, SummaryQuery};
pub use feed::{FeedConfig, TaskFeed};
pub use reconciler::{Notice, ReconcilerConfig, SummaryFilter, SummaryReconciler, SummarySnapshot};
