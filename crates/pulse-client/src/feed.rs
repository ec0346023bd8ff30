//! Consumer-facing wiring: reconciler + engine + activity monitor.
//!
//! A [`TaskFeed`] is what a view consumer (dashboard, history table) holds:
//! it exposes the reactive snapshot, pagination and filter setters, explicit
//! refresh, polling controls, and the visibility/interaction entry points,
//! while the notice side channel is handed back at construction for
//! cross-cutting consumers (e.g. a wallet balance widget).
//!
//! Per the error-handling design, nothing a view calls here can fail: fetch
//! errors are logged and the snapshot keeps the last good list.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use pulse_core::activity::{ActivityConfig, ActivityMonitor, Interaction};
use pulse_core::engine::{EngineConfig, PollingEngine};

use crate::api::SummaryApi;
use crate::reconciler::{
    Notice, ReconcilerConfig, SummaryFilter, SummaryReconciler, SummarySnapshot,
};

/// Configuration for a task feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Reconciler settings (user, page size)
    pub reconciler: ReconcilerConfig,
    /// Engine settings (interval, retry budget, always-poll)
    pub engine: EngineConfig,
    /// Activity monitor settings
    pub activity: ActivityConfig,
}

impl FeedConfig {
    /// Create a config with default engine and activity settings.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            reconciler: ReconcilerConfig::new(user_id),
            engine: EngineConfig::default(),
            activity: ActivityConfig::default(),
        }
    }

    /// Replace the engine settings.
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Replace the activity settings.
    pub fn with_activity(mut self, activity: ActivityConfig) -> Self {
        self.activity = activity;
        self
    }
}

/// Live task-summary feed for one view consumer.
pub struct TaskFeed {
    reconciler: Arc<SummaryReconciler>,
    engine: PollingEngine,
    monitor: ActivityMonitor,
}

impl TaskFeed {
    /// Build a feed over the given API client.
    ///
    /// Returns the feed and the receiver for refund/failure notices.
    pub fn new(api: SummaryApi, config: FeedConfig) -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (reconciler, notices) = SummaryReconciler::new(api, config.reconciler);
        let engine = PollingEngine::new(reconciler.clone(), config.engine);
        let monitor = ActivityMonitor::new(engine.clone(), config.activity);
        (
            Self {
                reconciler,
                engine,
                monitor,
            },
            notices,
        )
    }

    /// Force an immediate manual re-fetch of the first page; if the result
    /// still contains non-terminal items, (re)start polling.
    ///
    /// Errors are logged, never surfaced: the snapshot keeps the last good
    /// list and the view simply stops seeing updates.
    pub async fn refresh(&self) {
        match self.reconciler.refresh().await {
            Ok(true) => self.engine.start(),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "manual refresh failed"),
        }
    }

    /// Start periodic polling. No-op while already polling.
    pub fn start_polling(&self) {
        self.engine.start();
    }

    /// Stop periodic polling. Idempotent.
    pub fn stop_polling(&self) {
        self.engine.stop();
    }

    /// Whether periodic polling is active.
    pub fn is_polling(&self) -> bool {
        self.engine.is_polling()
    }

    /// Current reactive state for rendering.
    pub fn snapshot(&self) -> SummarySnapshot {
        self.reconciler.snapshot()
    }

    /// Replace list filters; changed filters reset to the first page.
    pub fn set_filter(&self, filter: SummaryFilter) {
        self.reconciler.set_filter(filter);
    }

    /// Set the page for the next fetch.
    pub fn set_page(&self, page: u32) {
        self.reconciler.set_page(page);
    }

    /// Set the page size for the next fetch.
    pub fn set_page_size(&self, size: u32) {
        self.reconciler.set_page_size(size);
    }

    /// Report a visibility change from the host.
    pub fn set_hidden(&self, hidden: bool) {
        self.monitor.set_hidden(hidden);
    }

    /// Report a user interaction from the host.
    pub fn interaction(&self, kind: Interaction) {
        self.monitor.on_interaction(kind);
    }

    /// Whether any interaction has occurred this session. Sticky.
    pub fn has_interacted(&self) -> bool {
        self.monitor.has_interacted()
    }
}
