use {
    super::money::AmountMinor,
    super::status::CanonicalStatus,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

/// Row-shaped read model for a payment, as returned by the repository to
/// the poller. Mutated only by the poller; never deleted.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub provider: String,
    pub token: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: CanonicalStatus,
    pub amount_minor: i64,
    pub context: serde_json::Value,
    pub product_id: Option<String>,
    pub authorization_code: Option<String>,
    pub status_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub first_authorized_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub abandoned_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn amount(&self) -> Option<AmountMinor> {
        AmountMinor::new(self.amount_minor).ok()
    }
}

/// What the poller should do after a single reconciliation attempt.
/// Pure decision, taken once the adapter has answered — a small enum
/// describing the next repository call rather than letting the call site
/// interleave logic and I/O.
#[derive(Debug, PartialEq, Eq)]
pub enum ReconcileDecision {
    /// Adapter call failed, or mapped to no canonical status, and the
    /// retry budget is not yet exhausted. Nothing to persist besides the
    /// status_check/event rows already written.
    NoTransition,
    /// Adapter reported a new canonical status that differs from the
    /// current one. Carries whether the new status is `AUTHORIZED`, which
    /// is the only terminal status that enqueues a CRM push (§4.6).
    Advance {
        new_status: CanonicalStatus,
        enqueue_crm: bool,
    },
    /// Adapter call failed (or mapped to nothing) and the retry budget is
    /// now exhausted: the payment should be marked `ABANDONED`.
    AbandonRetriesExhausted,
    /// The payment is older than `ABANDONED_TIMEOUT_MINUTES`, independent
    /// of the retry-offset schedule (§9 decision 4).
    AbandonTimedOut,
}

impl Payment {
    /// Decide what to do given the outcome of one status-check attempt.
    /// `checks_so_far` is the count of status_check rows that now exist
    /// for this payment, including the one just recorded.
    pub fn decide(
        &self,
        mapped_status: Option<CanonicalStatus>,
        success: bool,
        checks_so_far: u32,
        retry_offsets_len: u32,
    ) -> ReconcileDecision {
        if success {
            if let Some(new_status) = mapped_status {
                if new_status != self.status {
                    return ReconcileDecision::Advance {
                        new_status,
                        enqueue_crm: new_status == CanonicalStatus::Authorized,
                    };
                }
                return ReconcileDecision::NoTransition;
            }
        }

        if checks_so_far >= retry_offsets_len {
            ReconcileDecision::AbandonRetriesExhausted
        } else {
            ReconcileDecision::NoTransition
        }
    }
}

/// The normalized result every `PspAdapter::status` call returns, per
/// spec §4.2. Adapters never raise; every failure becomes
/// `success = false` with a populated `error_message`.
#[derive(Debug, Clone)]
pub struct PspStatusResult {
    pub success: bool,
    pub provider_status: Option<String>,
    pub mapped_status: Option<CanonicalStatus>,
    pub response_code: Option<i32>,
    pub raw_payload: serde_json::Value,
    pub error_message: Option<String>,
    pub authorization_code: Option<String>,
    pub status_reason: Option<String>,
    /// The full URL the adapter called, for the `provider_event_log`
    /// forensic record (§3). Empty when no outbound call was attempted
    /// (e.g. a missing token rejected before any request went out).
    pub request_url: String,
    /// Unmasked outbound headers; masking is applied centrally when the
    /// event-log row is constructed (`domain::event_log::mask_headers`).
    pub request_headers: serde_json::Value,
    /// The request body sent, if any — `None` for the GET-only status
    /// calls every adapter here happens to make.
    pub request_body: Option<serde_json::Value>,
    /// Unmasked response headers. `Value::Null` when no response was
    /// received (transport failure or no call attempted).
    pub response_headers: serde_json::Value,
}

impl PspStatusResult {
    /// A failure with no outbound call to report (e.g. a missing token).
    pub fn failure(error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            provider_status: None,
            mapped_status: None,
            response_code: None,
            raw_payload: serde_json::Value::Null,
            error_message: Some(error_message.into()),
            authorization_code: None,
            status_reason: None,
            request_url: String::new(),
            request_headers: serde_json::Value::Null,
            request_body: None,
            response_headers: serde_json::Value::Null,
        }
    }

    /// A failure after an outbound call was actually attempted — carries
    /// the URL/headers that went out even though no usable response came
    /// back, so the forensic record still shows what was sent.
    pub fn transport_failure(
        request_url: impl Into<String>,
        request_headers: serde_json::Value,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            provider_status: None,
            mapped_status: None,
            response_code: None,
            raw_payload: serde_json::Value::Null,
            error_message: Some(error_message.into()),
            authorization_code: None,
            status_reason: None,
            request_url: request_url.into(),
            request_headers,
            request_body: None,
            response_headers: serde_json::Value::Null,
        }
    }
}

/// Fields needed to append a `status_check` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCheckRecord {
    pub payment_id: Uuid,
    pub provider: String,
    pub success: bool,
    pub provider_status: Option<String>,
    pub mapped_status: Option<String>,
    pub response_code: Option<i32>,
    pub raw_payload: serde_json::Value,
    pub error_message: Option<String>,
}
