//! Single-flight periodic polling engine.
//!
//! The engine owns one logical polling loop per session: it schedules
//! periodic fetches through a caller-supplied [`PollFetcher`], retries
//! failures up to a bounded budget, and stops on its own once every fetched
//! item has reached a terminal state (unless configured to always poll).
//!
//! ## Guarantees
//!
//! - **Single-flight**: the loop awaits each fetch cycle before scheduling
//!   the next, so no two engine-driven fetches overlap.
//! - **Idempotent controls**: `start()` while polling and `stop()` while
//!   stopped are no-ops. At most one loop task exists per engine.
//! - **Clean teardown**: dropping the engine aborts the loop task, so no
//!   callback fires after the owner is gone.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pulse_core::engine::{EngineConfig, FetchKind, PollFetcher, PollOutcome, PollingEngine};
//!
//! struct NoopFetcher;
//!
//! #[async_trait::async_trait]
//! impl PollFetcher for NoopFetcher {
//!     async fn poll(&self, _kind: FetchKind) -> pulse_core::Result<PollOutcome> {
//!         Ok(PollOutcome::settled())
//!     }
//! }
//!
//! # async fn demo() {
//! let engine = PollingEngine::new(Arc::new(NoopFetcher), EngineConfig::default());
//! engine.start();
//! // ... later
//! engine.stop();
//! # }
//! ```

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::Result;

/// Default interval between fetch cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default retry budget for failed fetch cycles.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Marks a fetch as engine-driven polling or an explicit one-shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// Explicit user-triggered or initial fetch; state is replaced
    /// unconditionally downstream.
    Manual,
    /// Periodic engine-driven fetch; downstream may diff and skip updates.
    Polling,
}

impl FetchKind {
    /// Returns true for engine-driven polling fetches.
    pub fn is_polling(&self) -> bool {
        matches!(self, Self::Polling)
    }
}

/// Result of one fetch cycle, as far as the engine cares: how many fetched
/// items are still in a non-terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// Number of non-terminal items in the fetched page
    pub active_items: usize,
}

impl PollOutcome {
    /// Outcome with the given number of non-terminal items.
    pub fn with_active(active_items: usize) -> Self {
        Self { active_items }
    }

    /// Outcome where every item is terminal.
    pub fn settled() -> Self {
        Self { active_items: 0 }
    }

    /// Returns true if any item still needs polling.
    pub fn has_active(&self) -> bool {
        self.active_items > 0
    }
}

/// The fetch seam between the engine and whatever produces summaries.
///
/// Implementations must swallow nothing: transport and API failures are
/// returned as errors so the engine's retry counter stays authoritative.
#[async_trait]
pub trait PollFetcher: Send + Sync + 'static {
    /// Run one fetch cycle and report whether active items remain.
    async fn poll(&self, kind: FetchKind) -> Result<PollOutcome>;
}

/// Configuration for a polling engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval between fetch cycles (and between retries)
    pub interval: Duration,
    /// Consecutive failures tolerated before the session stops
    pub max_retries: u32,
    /// Keep polling even when every item is terminal (live-view consumers)
    pub always_poll: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
            always_poll: false,
        }
    }
}

impl EngineConfig {
    /// Set the polling interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Disable the terminal-state stop condition.
    pub fn with_always_poll(mut self, always_poll: bool) -> Self {
        self.always_poll = always_poll;
        self
    }
}

/// Transient per-session polling state.
struct SessionState {
    is_polling: bool,
    retry_count: u32,
    /// Loop task handle; at most one exists at any time
    task: Option<JoinHandle<()>>,
}

struct EngineInner {
    fetcher: Arc<dyn PollFetcher>,
    config: EngineConfig,
    state: Mutex<SessionState>,
}

/// Single-flight periodic fetch loop with bounded retry.
///
/// Cheaply cloneable; clones share the same session.
#[derive(Clone)]
pub struct PollingEngine {
    inner: Arc<EngineInner>,
}

impl PollingEngine {
    /// Create an engine over the given fetcher. The engine is idle until
    /// [`start`](Self::start) is called.
    pub fn new(fetcher: Arc<dyn PollFetcher>, config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                fetcher,
                config,
                state: Mutex::new(SessionState {
                    is_polling: false,
                    retry_count: 0,
                    task: None,
                }),
            }),
        }
    }

    /// Start the polling loop. No-op if a session is already polling;
    /// multiple call sites may start without creating overlapping timers.
    pub fn start(&self) {
        let mut state = self.inner.state.lock().unwrap();
        if state.is_polling {
            debug!("start() while already polling, ignoring");
            return;
        }

        // A previous loop may have exited on its own; drop the stale handle.
        if let Some(task) = state.task.take() {
            task.abort();
        }

        state.is_polling = true;
        state.retry_count = 0;

        // The loop holds only a weak reference so dropping the last engine
        // handle tears the session down instead of leaking a cycle.
        let inner = Arc::downgrade(&self.inner);
        state.task = Some(tokio::spawn(async move {
            run_loop(inner).await;
        }));
        debug!("polling started");
    }

    /// Stop the polling loop and reset the session. Idempotent.
    pub fn stop(&self) {
        let mut state = self.inner.state.lock().unwrap();
        if let Some(task) = state.task.take() {
            task.abort();
        }
        state.is_polling = false;
        state.retry_count = 0;
        debug!("polling stopped");
    }

    /// Whether a session is currently polling.
    pub fn is_polling(&self) -> bool {
        self.inner.state.lock().unwrap().is_polling
    }

    /// Current consecutive-failure count.
    pub fn retry_count(&self) -> u32 {
        self.inner.state.lock().unwrap().retry_count
    }

    /// The configured polling interval.
    pub fn interval(&self) -> Duration {
        self.inner.config.interval
    }

    /// Run one manual (non-polling) fetch cycle outside the loop.
    ///
    /// Used by the activity monitor for its immediate-refresh fetch; does not
    /// touch the session state, so it may race a scheduled cycle. That race
    /// is accepted: reconciliation is idempotent for equivalent data.
    pub async fn poll_once(&self) -> Result<PollOutcome> {
        self.inner.fetcher.poll(FetchKind::Manual).await
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock()
            && let Some(task) = state.task.take()
        {
            task.abort();
        }
    }
}

/// The loop body. Exits on its own when items settle, the retry budget is
/// exhausted, or the engine is dropped; `stop()` aborts it externally.
async fn run_loop(inner: Weak<EngineInner>) {
    loop {
        // Upgrade per cycle and release before sleeping so the strong count
        // reaches zero promptly when the last engine handle is dropped.
        let interval = {
            let Some(inner) = inner.upgrade() else { return };
            match run_cycle(&inner).await {
                Some(interval) => interval,
                None => return,
            }
        };

        tokio::time::sleep(interval).await;
    }
}

/// Run one fetch cycle. Returns the delay before the next cycle, or `None`
/// when the session should end.
async fn run_cycle(inner: &Arc<EngineInner>) -> Option<Duration> {
    match inner.fetcher.poll(FetchKind::Polling).await {
        Ok(outcome) => {
            inner.state.lock().unwrap().retry_count = 0;
            if !outcome.has_active() && !inner.config.always_poll {
                inner.state.lock().unwrap().is_polling = false;
                debug!("all items terminal, polling stopped");
                return None;
            }
        }
        Err(e) => {
            let retries = {
                let mut state = inner.state.lock().unwrap();
                state.retry_count += 1;
                state.retry_count
            };
            if retries >= inner.config.max_retries {
                warn!(
                    error = %e,
                    retries,
                    "poll retry budget exhausted, stopping session"
                );
                inner.state.lock().unwrap().is_polling = false;
                return None;
            }
            debug!(error = %e, retries, recoverable = e.is_recoverable(), "poll cycle failed, will retry");
        }
    }

    Some(inner.config.interval)
}
