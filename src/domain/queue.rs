use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

use super::error::PipelineError;

/// Lifecycle of a `crm_push_queue` row. Entries are never deleted —
/// `SENT` and an exhausted `FAILED` row are both permanent sinks, kept for
/// the audit trail (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrmQueueStatus {
    Pending,
    Failed,
    Sent,
}

impl CrmQueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Failed => "FAILED",
            Self::Sent => "SENT",
        }
    }
}

impl fmt::Display for CrmQueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for CrmQueueStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "FAILED" => Ok(Self::Failed),
            "SENT" => Ok(Self::Sent),
            other => Err(PipelineError::Validation(format!(
                "unknown crm_push_queue status: {other}"
            ))),
        }
    }
}

/// `#[sqlx(try_from = "String")]` on `CrmQueueItem::status` resolves through
/// this impl, not the `&str` one above.
impl TryFrom<String> for CrmQueueStatus {
    type Error = PipelineError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::try_from(s.as_str())
    }
}

/// A unit of work for the CRM sender loop: "push this payment's
/// authorization to the CRM". `operation` plus `payment_id` carries the
/// `ON CONFLICT (payment_id, operation) DO NOTHING` idempotency key from
/// §4.4 — re-enqueuing an in-flight operation is a no-op by construction,
/// not something the sender needs to guard against.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CrmQueueItem {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub operation: String,
    #[sqlx(try_from = "String")]
    pub status: CrmQueueStatus,
    pub payload: serde_json::Value,
    pub attempts: i32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub response_code: Option<i32>,
    pub crm_id: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// What the sender loop should do with one claimed queue item after
/// attempting a push, per §4.7's backoff schedule.
#[derive(Debug, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Retry budget remains: reschedule `next_attempt_at` using the
    /// backoff list indexed by the post-increment attempt count.
    RetryScheduled { next_attempt_at: DateTime<Utc> },
    /// Backoff list exhausted: the row becomes a permanent `FAILED` sink
    /// with `next_attempt_at = NULL` (§9 decision 2).
    PermanentlyFailed,
}

/// Picks the backoff delay for the attempt about to be made, given the
/// attempt count the row will have *after* this try. A row that has failed
/// `len(backoff)` times is a permanent `FAILED` sink with no further
/// retry — `attempts_after >= backoff_seconds.len()` is the exact boundary,
/// so a single-entry schedule never reschedules past its one backoff.
pub fn next_send_outcome(
    sent: bool,
    attempts_after: i32,
    backoff_seconds: &[u64],
    now: DateTime<Utc>,
) -> SendOutcome {
    if sent {
        return SendOutcome::Sent;
    }
    if attempts_after as usize >= backoff_seconds.len() {
        return SendOutcome::PermanentlyFailed;
    }
    let delay = backoff_seconds[attempts_after as usize - 1];
    SendOutcome::RetryScheduled {
        next_attempt_at: now + chrono::Duration::seconds(delay as i64),
    }
}
