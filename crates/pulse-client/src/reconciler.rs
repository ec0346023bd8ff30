//! Normalizes, diffs, and surfaces meaningful changes between fetches.
//!
//! The reconciler sits between the [`SummaryApi`] and view consumers. Manual
//! fetches replace the whole snapshot; polling fetches are diffed against the
//! previous list first, and a structurally identical result skips the state
//! update entirely so the shared list keeps its identity (consumers can use
//! pointer equality to avoid redundant re-renders).
//!
//! When a polling fetch shows that a task's `failed_count` increased, the
//! reconciler emits a one-time [`Notice`] on its side channel: a refund
//! breakdown when the task carries refund data, otherwise a generic sub-task
//! failure. The channel replaces the ambient DOM-event bus of a browser
//! client with an explicit typed receiver.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use pulse_core::engine::{FetchKind, PollFetcher, PollOutcome};
use pulse_core::error::Result;
use pulse_core::types::{RefundInfo, TaskStatus, TaskSummary, display_name};

use crate::api::{RawTask, SummaryApi, SummaryQuery};

/// Default page size for summary fetches.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Side-channel notification raised by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A sub-task failure triggered a partial refund
    Refund {
        task_id: String,
        total: i64,
        temp: i64,
        recharge: i64,
    },
    /// A sub-task failed without refund data
    SubTaskFailed { task_id: String },
}

impl Notice {
    /// The task this notice refers to.
    pub fn task_id(&self) -> &str {
        match self {
            Self::Refund { task_id, .. } => task_id,
            Self::SubTaskFailed { task_id } => task_id,
        }
    }
}

/// List filters applied to summary fetches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryFilter {
    /// Restrict to one action type
    pub action: Option<String>,
    /// Restrict to one canonical status
    pub status: Option<TaskStatus>,
    /// Free-text search
    pub search: Option<String>,
}

/// Configuration for a reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Owner of the tasks being listed
    pub user_id: String,
    /// Page size for fetches
    pub page_size: u32,
}

impl ReconcilerConfig {
    /// Create a config with the default page size.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Set the page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }
}

/// Reactive state exposed to view consumers.
#[derive(Debug, Clone)]
pub struct SummarySnapshot {
    /// Current summary list; identity is preserved across no-op polls
    pub items: Arc<Vec<TaskSummary>>,
    /// True while a manual fetch is in flight
    pub loading: bool,
    pub total: u64,
    pub page: u32,
    pub size: u32,
    pub total_pages: u32,
    pub has_next: bool,
}

struct ReconcilerState {
    items: Arc<Vec<TaskSummary>>,
    loading: bool,
    total: u64,
    page: u32,
    size: u32,
    total_pages: u32,
    has_next: bool,
    filter: SummaryFilter,
}

/// Fetch-and-diff layer over the summary endpoint.
pub struct SummaryReconciler {
    api: SummaryApi,
    config: ReconcilerConfig,
    state: Mutex<ReconcilerState>,
    notice_tx: mpsc::UnboundedSender<Notice>,
}

impl SummaryReconciler {
    /// Create a reconciler.
    ///
    /// Returns the reconciler and the receiver for its notice side channel.
    pub fn new(
        api: SummaryApi,
        config: ReconcilerConfig,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<Notice>) {
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let size = config.page_size;
        (
            Arc::new(Self {
                api,
                config,
                state: Mutex::new(ReconcilerState {
                    items: Arc::new(Vec::new()),
                    loading: false,
                    total: 0,
                    page: 0,
                    size,
                    total_pages: 0,
                    has_next: false,
                    filter: SummaryFilter::default(),
                }),
                notice_tx,
            }),
            notice_rx,
        )
    }

    /// Fetch one page and reconcile it into the snapshot.
    ///
    /// Returns the number of non-terminal items in the fetched page.
    /// Transport and API errors propagate so the engine's retry counter
    /// stays authoritative; the snapshot keeps the last good list.
    pub async fn fetch(&self, kind: FetchKind) -> Result<usize> {
        let query = {
            let mut state = self.state.lock().unwrap();
            if !kind.is_polling() {
                state.loading = true;
            }
            let mut query = SummaryQuery::new(&self.config.user_id, state.page, state.size);
            query.action = state.filter.action.clone();
            query.status = state.filter.status;
            query.search = state.filter.search.clone();
            if kind.is_polling() {
                query.poll_ts = Some(Utc::now().timestamp_millis());
            }
            query
        };

        let page = match self.api.fetch_summaries(&query).await {
            Ok(page) => page,
            Err(e) => {
                if !kind.is_polling() {
                    self.state.lock().unwrap().loading = false;
                }
                return Err(e);
            }
        };

        let summaries: Vec<TaskSummary> = page.items.into_iter().map(normalize).collect();
        let active = summaries
            .iter()
            .filter(|s| !s.status.is_terminal())
            .count();

        let notices = {
            let mut state = self.state.lock().unwrap();

            if kind.is_polling() {
                if lists_equal(&state.items, &summaries) {
                    // Identical result: skip the update entirely so the list
                    // keeps its identity.
                    debug!("polling fetch unchanged, skipping state update");
                    return Ok(active);
                }
                let notices = failure_notices(&state.items, &summaries);
                state.items = Arc::new(summaries);
                state.total = page.total;
                state.total_pages = page.total_pages;
                state.has_next = page.has_next;
                notices
            } else {
                state.items = Arc::new(summaries);
                state.total = page.total;
                state.total_pages = page.total_pages;
                state.has_next = page.has_next;
                state.loading = false;
                Vec::new()
            }
        };

        for notice in notices {
            // Best-effort: a dropped receiver must not break the data path
            if self.notice_tx.send(notice).is_err() {
                debug!("notice receiver dropped, discarding notice");
            }
        }

        Ok(active)
    }

    /// Unconditional re-fetch of the first page.
    ///
    /// Returns true when the result still contains non-terminal items, i.e.
    /// the caller should (re)start polling.
    pub async fn refresh(&self) -> Result<bool> {
        self.state.lock().unwrap().page = 0;
        let active = self.fetch(FetchKind::Manual).await?;
        Ok(active > 0)
    }

    /// Replace the list filters. A changed filter resets pagination to the
    /// first page before the next fetch.
    pub fn set_filter(&self, filter: SummaryFilter) {
        let mut state = self.state.lock().unwrap();
        if state.filter != filter {
            state.filter = filter;
            state.page = 0;
        }
    }

    /// Set the page for the next fetch.
    pub fn set_page(&self, page: u32) {
        self.state.lock().unwrap().page = page;
    }

    /// Set the page size for the next fetch.
    pub fn set_page_size(&self, size: u32) {
        self.state.lock().unwrap().size = size;
    }

    /// Current reactive state.
    pub fn snapshot(&self) -> SummarySnapshot {
        let state = self.state.lock().unwrap();
        SummarySnapshot {
            items: Arc::clone(&state.items),
            loading: state.loading,
            total: state.total,
            page: state.page,
            size: state.size,
            total_pages: state.total_pages,
            has_next: state.has_next,
        }
    }
}

#[async_trait]
impl PollFetcher for SummaryReconciler {
    async fn poll(&self, kind: FetchKind) -> Result<PollOutcome> {
        let active = self.fetch(kind).await?;
        Ok(PollOutcome::with_active(active))
    }
}

/// Normalize a raw backend item into a canonical summary.
fn normalize(raw: RawTask) -> TaskSummary {
    let status = match &raw.status {
        Some(raw_status) => TaskStatus::from_raw(raw_status),
        None => {
            warn!(task_id = %raw.task_id, "task without status, treating as pending");
            TaskStatus::Pending
        }
    };

    let summary = TaskSummary {
        display_name: display_name(&raw.action, &raw.task_id),
        id: raw.task_id,
        status,
        action: raw.action,
        success_count: raw.success_count,
        failed_count: raw.failed_count,
        running_count: raw.running_count,
        pending_count: raw.pending_count,
        sub_task_count: raw.sub_task_count,
        refund: raw.refund.map(|r| RefundInfo {
            total: r.amount,
            temp: r.temp,
            recharge: r.recharge,
        }),
        created_at: raw.created_at,
        updated_at: raw.updated_at,
        progress: raw.progress,
        result_url: raw.result_url,
    };

    if summary.sub_task_count > 0 && !summary.counts_consistent() {
        debug!(task_id = %summary.id, "sub-task counters do not add up, trusting backend");
    }

    summary
}

/// Structural diff: same length and every position the same summary.
fn lists_equal(old: &[TaskSummary], new: &[TaskSummary]) -> bool {
    old.len() == new.len()
        && old
            .iter()
            .zip(new.iter())
            .all(|(a, b)| a.same_summary(b))
}

/// Notices for every task whose `failed_count` increased since the prior
/// fetch. Tasks are matched by id; new tasks produce no notice.
fn failure_notices(old: &[TaskSummary], new: &[TaskSummary]) -> Vec<Notice> {
    new.iter()
        .filter_map(|item| {
            let prior = old.iter().find(|o| o.id == item.id)?;
            if item.failed_count <= prior.failed_count {
                return None;
            }
            Some(match &item.refund {
                Some(refund) => Notice::Refund {
                    task_id: item.id.clone(),
                    total: refund.total,
                    temp: refund.temp,
                    recharge: refund.recharge,
                },
                None => Notice::SubTaskFailed {
                    task_id: item.id.clone(),
                },
            })
        })
        .collect()
}
