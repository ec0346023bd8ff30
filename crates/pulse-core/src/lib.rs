//! # pulse-core
//!
//! Core types, errors, and the polling machinery for the PULSE task-run
//! monitoring library.
//!
//! This crate provides:
//! - [`PulseError`] - Error types for all PULSE operations
//! - [`logging`] - Tracing setup utilities
//! - [`types`] - Canonical task status and summary types with normalization
//! - [`engine`] - Single-flight periodic polling with bounded retry
//! - [`activity`] - Visibility/interaction-driven suspend and resume
//!
//! ## Example
//!
//! ```no_run
//! use pulse_core::types::{RawStatus, TaskStatus};
//!
//! let raw = RawStatus::Name("processing".to_string());
//! assert_eq!(TaskStatus::from_raw(&raw), TaskStatus::Running);
//! assert!(!TaskStatus::Running.is_terminal());
//! ```

pub mod activity;
pub mod engine;
pub mod error;
pub mod logging;
pub mod types;

// Re-export main types for convenience
pub use activity::{ActivityConfig, ActivityMonitor, Interaction};
pub use engine::{EngineConfig, FetchKind, PollFetcher, PollOutcome, PollingEngine};
pub use error::{PulseError, Result};
pub use logging::{LogGuard, init_logging};
pub use types::{RawStatus, RefundInfo, TaskStatus, TaskSummary};
