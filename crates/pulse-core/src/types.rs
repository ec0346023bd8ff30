//! Canonical task types shared across PULSE crates.
//!
//! The backend reports task status in several historical shapes: lowercase
//! strings (`"pending"`), mixed-case strings (`"Processing"`), legacy names
//! (`"processing"` for running), and numeric codes. [`TaskStatus::from_raw`]
//! is the single place all of them are folded into the canonical enum.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Unique identifier for a backend task.
pub type TaskId = String;

/// Canonical task status.
///
/// Normalized from heterogeneous backend representations. Serialized in the
/// canonical uppercase form (`"PENDING"`, `"RUNNING"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Task is queued, no sub-task has started yet
    #[default]
    Pending,
    /// At least one sub-task is executing
    Running,
    /// All sub-tasks finished successfully
    Completed,
    /// Task finished with failures
    Failed,
    /// Task was canceled before completion
    Canceled,
}

/// Raw status value as it arrives on the wire: a string alias or a legacy
/// numeric code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawStatus {
    /// Legacy numeric code (0 pending, 1 running, 2 completed, 3 failed, 4 canceled)
    Code(i64),
    /// Status name, any case
    Name(String),
}

impl TaskStatus {
    /// Normalize a raw backend status into the canonical enum.
    ///
    /// String matching is case-insensitive and covers every alias the backend
    /// has ever emitted. Unrecognized inputs fall back to [`Pending`]: an
    /// unknown status is most likely a newly introduced in-flight state, and
    /// treating it as non-terminal keeps a live view polling instead of
    /// silently freezing it. The fallback is logged at WARN.
    ///
    /// [`Pending`]: TaskStatus::Pending
    pub fn from_raw(raw: &RawStatus) -> Self {
        match raw {
            RawStatus::Code(code) => match code {
                0 => Self::Pending,
                1 => Self::Running,
                2 => Self::Completed,
                3 => Self::Failed,
                4 => Self::Canceled,
                other => {
                    warn!(code = other, "unrecognized numeric task status, treating as pending");
                    Self::Pending
                }
            },
            RawStatus::Name(name) => match name.to_ascii_lowercase().as_str() {
                "pending" | "queued" | "waiting" => Self::Pending,
                "running" | "processing" | "in_progress" | "active" => Self::Running,
                "completed" | "success" | "succeeded" | "done" => Self::Completed,
                "failed" | "error" => Self::Failed,
                "canceled" | "cancelled" | "aborted" => Self::Canceled,
                other => {
                    warn!(status = other, "unrecognized task status, treating as pending");
                    Self::Pending
                }
            },
        }
    }

    /// Returns true if no further status transitions are expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }

    /// Returns the canonical uppercase label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Refund issued when a sub-task failure triggered a partial refund.
///
/// Amounts are in points; `total = temp + recharge` is backend-authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundInfo {
    /// Total refunded points
    pub total: i64,
    /// Portion refunded to the temporary balance
    pub temp: i64,
    /// Portion refunded to the recharged balance
    pub recharge: i64,
}

/// Summary of one backend task: a unit of asynchronous work with sub-tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    /// Stable task identifier
    pub id: TaskId,
    /// Canonical status
    pub status: TaskStatus,
    /// Backend action type (e.g. "generate", "upscale")
    pub action: String,
    /// Human-readable name: action label + first 8 chars of the id
    pub display_name: String,
    /// Sub-tasks finished successfully
    pub success_count: u32,
    /// Sub-tasks that failed
    pub failed_count: u32,
    /// Sub-tasks currently executing
    pub running_count: u32,
    /// Sub-tasks not yet started
    pub pending_count: u32,
    /// Total sub-task count
    pub sub_task_count: u32,
    /// Present only when a failure triggered a partial refund
    pub refund: Option<RefundInfo>,
    /// Creation timestamp
    pub created_at: Option<DateTime<Utc>>,
    /// Last update timestamp
    pub updated_at: Option<DateTime<Utc>>,
    /// Completion fraction in [0, 1] if reported
    pub progress: Option<f32>,
    /// Result artifact URL once available
    pub result_url: Option<String>,
}

impl TaskSummary {
    /// Create a summary with derived display name and zeroed counters.
    pub fn new(id: impl Into<TaskId>, status: TaskStatus, action: impl Into<String>) -> Self {
        let id = id.into();
        let action = action.into();
        let display_name = display_name(&action, &id);
        Self {
            id,
            status,
            action,
            display_name,
            success_count: 0,
            failed_count: 0,
            running_count: 0,
            pending_count: 0,
            sub_task_count: 0,
            refund: None,
            created_at: None,
            updated_at: None,
            progress: None,
            result_url: None,
        }
    }

    /// Structural equality used by the reconciler diff: same id, status, and
    /// sub-task counters. Timestamps and progress are excluded so heartbeat
    /// touches alone do not force a UI update.
    pub fn same_summary(&self, other: &Self) -> bool {
        self.id == other.id
            && self.status == other.status
            && self.success_count == other.success_count
            && self.failed_count == other.failed_count
            && self.running_count == other.running_count
            && self.pending_count == other.pending_count
            && self.sub_task_count == other.sub_task_count
    }

    /// Whether the reported counters add up. The client trusts backend
    /// values either way; this exists for debug logging.
    pub fn counts_consistent(&self) -> bool {
        self.success_count + self.failed_count + self.running_count + self.pending_count
            == self.sub_task_count
    }
}

/// Derive the display name for a task: human label for the action type plus
/// the first 8 characters of the task id.
pub fn display_name(action: &str, id: &str) -> String {
    let prefix: String = id.chars().take(8).collect();
    format!("{} {}", action_label(action), prefix)
}

/// Human label for a backend action type.
fn action_label(action: &str) -> &str {
    match action {
        "generate" => "Generation",
        "upscale" => "Upscale",
        "inpaint" => "Inpaint",
        "outpaint" => "Outpaint",
        "variation" => "Variation",
        "" => "Task",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> RawStatus {
        RawStatus::Name(s.to_string())
    }

    #[test]
    fn test_normalize_string_aliases() {
        assert_eq!(TaskStatus::from_raw(&name("pending")), TaskStatus::Pending);
        assert_eq!(TaskStatus::from_raw(&name("Pending")), TaskStatus::Pending);
        assert_eq!(TaskStatus::from_raw(&name("PENDING")), TaskStatus::Pending);
        assert_eq!(TaskStatus::from_raw(&name("processing")), TaskStatus::Running);
        assert_eq!(TaskStatus::from_raw(&name("RUNNING")), TaskStatus::Running);
        assert_eq!(TaskStatus::from_raw(&name("completed")), TaskStatus::Completed);
        assert_eq!(TaskStatus::from_raw(&name("failed")), TaskStatus::Failed);
        assert_eq!(TaskStatus::from_raw(&name("cancelled")), TaskStatus::Canceled);
    }

    #[test]
    fn test_normalize_numeric_codes() {
        assert_eq!(TaskStatus::from_raw(&RawStatus::Code(0)), TaskStatus::Pending);
        assert_eq!(TaskStatus::from_raw(&RawStatus::Code(1)), TaskStatus::Running);
        assert_eq!(TaskStatus::from_raw(&RawStatus::Code(2)), TaskStatus::Completed);
        assert_eq!(TaskStatus::from_raw(&RawStatus::Code(3)), TaskStatus::Failed);
        assert_eq!(TaskStatus::from_raw(&RawStatus::Code(4)), TaskStatus::Canceled);
    }

    #[test]
    fn test_normalize_unknown_is_non_terminal() {
        let status = TaskStatus::from_raw(&name("rehydrating"));
        assert_eq!(status, TaskStatus::Pending);
        assert!(!status.is_terminal());

        let status = TaskStatus::from_raw(&RawStatus::Code(99));
        assert!(!status.is_terminal());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Canceled.is_terminal());
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_string(&TaskStatus::Running).unwrap();
        assert_eq!(json, r#""RUNNING""#);
    }

    #[test]
    fn test_raw_status_accepts_string_or_number() {
        let s: RawStatus = serde_json::from_str(r#""processing""#).unwrap();
        assert_eq!(s, RawStatus::Name("processing".to_string()));

        let n: RawStatus = serde_json::from_str("2").unwrap();
        assert_eq!(n, RawStatus::Code(2));
    }

    #[test]
    fn test_display_name_truncates_id() {
        assert_eq!(
            display_name("generate", "abcdef1234567890"),
            "Generation abcdef12"
        );
        // Short ids are kept whole
        assert_eq!(display_name("upscale", "t1"), "Upscale t1");
        // Unknown actions pass through
        assert_eq!(display_name("restyle", "abcdefgh"), "restyle abcdefgh");
    }

    #[test]
    fn test_same_summary_ignores_timestamps() {
        let mut a = TaskSummary::new("t1", TaskStatus::Running, "generate");
        let mut b = a.clone();
        b.updated_at = Some(Utc::now());
        assert!(a.same_summary(&b));

        b.failed_count = 1;
        assert!(!a.same_summary(&b));

        a.failed_count = 1;
        b.status = TaskStatus::Failed;
        assert!(!a.same_summary(&b));
    }

    #[test]
    fn test_counts_consistent() {
        let mut s = TaskSummary::new("t1", TaskStatus::Running, "generate");
        s.success_count = 2;
        s.running_count = 1;
        s.pending_count = 1;
        s.sub_task_count = 4;
        assert!(s.counts_consistent());

        s.sub_task_count = 5;
        assert!(!s.counts_consistent());
    }
}
