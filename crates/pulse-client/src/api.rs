//! HTTP client for the backend task-summary endpoint.
//!
//! The endpoint contract (consumed, not defined, by this crate):
//!
//! - Request: `GET {base_url}/tasks/summary` with query parameters `userId`,
//!   `page` (0-based), `size`, optional `action`, `status`, `search`, and
//!   `pollTs` (a client timestamp hint set on polling requests).
//! - Response: `{ items: RawTask[], total, totalPages, hasNext }` where each
//!   item carries `taskId` (or legacy `id`) and a status that may arrive as
//!   a string in any case or a numeric legacy code.
//!
//! Failure mapping: transport errors, timeouts, and
//! non-2xx responses surface as [`PulseError`] so the polling engine's retry
//! counter sees them; a response body that is not the expected shape degrades
//! to an empty page with a warning.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use pulse_core::error::{PulseError, Result};
use pulse_core::types::{RawStatus, TaskStatus};

/// Default client-side request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for the summary API client.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the backend, without trailing slash
    pub base_url: String,
    /// Client-side request timeout in seconds
    pub timeout_secs: u64,
}

impl ApiConfig {
    /// Create a config with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Set the request timeout.
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Query parameters for one summary fetch.
#[derive(Debug, Clone)]
pub struct SummaryQuery {
    /// Owner of the tasks being listed
    pub user_id: String,
    /// 0-based page index
    pub page: u32,
    /// Page size
    pub size: u32,
    /// Filter by action type
    pub action: Option<String>,
    /// Filter by canonical status
    pub status: Option<TaskStatus>,
    /// Free-text search
    pub search: Option<String>,
    /// Client timestamp hint, set on polling fetches
    pub poll_ts: Option<i64>,
}

impl SummaryQuery {
    /// Create a query with no filters.
    pub fn new(user_id: impl Into<String>, page: u32, size: u32) -> Self {
        Self {
            user_id: user_id.into(),
            page,
            size,
            action: None,
            status: None,
            search: None,
            poll_ts: None,
        }
    }

    /// Encode as request query parameters.
    fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("userId", self.user_id.clone()),
            ("page", self.page.to_string()),
            ("size", self.size.to_string()),
        ];
        if let Some(action) = &self.action {
            params.push(("action", action.clone()));
        }
        if let Some(status) = &self.status {
            params.push(("status", status.to_string()));
        }
        if let Some(search) = &self.search {
            params.push(("search", search.clone()));
        }
        if let Some(poll_ts) = self.poll_ts {
            params.push(("pollTs", poll_ts.to_string()));
        }
        params
    }
}

/// One page of raw task summaries as returned by the backend.
///
/// Every field is defaulted so partial responses degrade to an empty page
/// rather than a decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SummaryPage {
    pub items: Vec<RawTask>,
    pub total: u64,
    pub total_pages: u32,
    pub has_next: bool,
}

/// A raw task item as reported by the backend, before normalization.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawTask {
    /// Task identifier; legacy responses use `id`
    #[serde(alias = "id")]
    pub task_id: String,
    /// Status in any of the historical shapes
    pub status: Option<RawStatus>,
    /// Backend action type
    pub action: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub progress: Option<f32>,
    pub result_url: Option<String>,
    pub success_count: u32,
    pub failed_count: u32,
    pub running_count: u32,
    pub pending_count: u32,
    pub sub_task_count: u32,
    pub refund: Option<RawRefund>,
}

impl Default for RawTask {
    fn default() -> Self {
        Self {
            task_id: String::new(),
            status: None,
            action: String::new(),
            created_at: None,
            updated_at: None,
            progress: None,
            result_url: None,
            success_count: 0,
            failed_count: 0,
            running_count: 0,
            pending_count: 0,
            sub_task_count: 0,
            refund: None,
        }
    }
}

/// Refund payload attached to a task that triggered a partial refund.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawRefund {
    /// Total refunded points (wire name `amount`)
    pub amount: i64,
    pub temp: i64,
    pub recharge: i64,
}

/// Client for the task-summary endpoint.
#[derive(Clone)]
pub struct SummaryApi {
    client: reqwest::Client,
    config: ApiConfig,
}

impl SummaryApi {
    /// Create a client with a fixed request timeout.
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PulseError::http("building HTTP client", e))?;

        Ok(Self { client, config })
    }

    /// Fetch one page of task summaries.
    pub async fn fetch_summaries(&self, query: &SummaryQuery) -> Result<SummaryPage> {
        let url = format!(
            "{}/tasks/summary",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .get(&url)
            .query(&query.to_params())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PulseError::Timeout {
                        timeout_secs: self.config.timeout_secs,
                    }
                } else {
                    PulseError::http("requesting task summaries", e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PulseError::api(
                status.as_u16(),
                format!("task summary request to {url} failed"),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PulseError::http("reading task summary response", e))?;

        // Malformed body is not worth a retry cycle; treat it as "no items"
        match serde_json::from_str::<SummaryPage>(&body) {
            Ok(page) => {
                debug!(
                    items = page.items.len(),
                    total = page.total,
                    "fetched task summary page"
                );
                Ok(page)
            }
            Err(e) => {
                warn!(error = %e, "malformed task summary response, treating as empty");
                Ok(SummaryPage::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_params_encoding() {
        let mut query = SummaryQuery::new("u-1", 2, 20);
        query.action = Some("generate".to_string());
        query.status = Some(TaskStatus::Running);
        query.poll_ts = Some(1700000000000);

        let params = query.to_params();
        assert!(params.contains(&("userId", "u-1".to_string())));
        assert!(params.contains(&("page", "2".to_string())));
        assert!(params.contains(&("size", "20".to_string())));
        assert!(params.contains(&("action", "generate".to_string())));
        assert!(params.contains(&("status", "RUNNING".to_string())));
        assert!(params.contains(&("pollTs", "1700000000000".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "search"));
    }

    #[test]
    fn test_raw_task_accepts_task_id_or_id() {
        let a: RawTask = serde_json::from_str(r#"{"taskId": "t-1"}"#).unwrap();
        assert_eq!(a.task_id, "t-1");

        let b: RawTask = serde_json::from_str(r#"{"id": "t-2"}"#).unwrap();
        assert_eq!(b.task_id, "t-2");
    }

    #[test]
    fn test_raw_task_status_string_or_number() {
        let s: RawTask =
            serde_json::from_str(r#"{"taskId": "t", "status": "Processing"}"#).unwrap();
        assert_eq!(s.status, Some(RawStatus::Name("Processing".to_string())));

        let n: RawTask = serde_json::from_str(r#"{"taskId": "t", "status": 3}"#).unwrap();
        assert_eq!(n.status, Some(RawStatus::Code(3)));
    }

    #[test]
    fn test_page_missing_items_is_empty() {
        let page: SummaryPage = serde_json::from_str(r#"{"total": 5}"#).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 5);
        assert!(!page.has_next);
    }

    #[test]
    fn test_refund_wire_shape() {
        let task: RawTask = serde_json::from_str(
            r#"{"taskId": "t", "failedCount": 1, "refund": {"amount": 50, "temp": 20, "recharge": 30}}"#,
        )
        .unwrap();
        let refund = task.refund.unwrap();
        assert_eq!(refund.amount, 50);
        assert_eq!(refund.temp, 20);
        assert_eq!(refund.recharge, 30);
        assert_eq!(task.failed_count, 1);
    }
}
