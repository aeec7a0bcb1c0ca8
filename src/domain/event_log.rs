use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    serde_json::Value,
    uuid::Uuid,
};

/// Headers that must never reach a persisted event row in the clear.
/// Matched case-insensitively; masking happens centrally here rather than
/// at each adapter call site, so a new adapter cannot forget it (§6.4, §9).
const SENSITIVE_HEADERS: [&str; 3] = ["authorization", "x-api-key", "api-key"];

/// Replace the value of any sensitive header (by name, case-insensitive)
/// in a JSON object of headers with `"***"`. Non-object input passes
/// through unchanged — callers that have no headers to mask pass
/// `Value::Null`.
pub fn mask_headers(headers: &Value) -> Value {
    let Value::Object(map) = headers else {
        return headers.clone();
    };
    let masked = map
        .iter()
        .map(|(k, v)| {
            let v = if SENSITIVE_HEADERS.contains(&k.to_lowercase().as_str()) {
                Value::String("***".to_string())
            } else {
                v.clone()
            };
            (k.clone(), v)
        })
        .collect();
    Value::Object(masked)
}

/// One row of `provider_event_log`: the full forensic record of a single
/// outbound PSP status call — URL, headers, optional body, response
/// headers, response body, error, latency, timestamp (§3) — independent of
/// whether the call changed the payment's status (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEventRecord {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub provider: String,
    pub request_url: String,
    pub request_headers: Value,
    pub request_body: Option<Value>,
    pub response_status: Option<i32>,
    pub response_headers: Value,
    pub response_body: Value,
    pub success: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ProviderEventRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        payment_id: Uuid,
        provider: impl Into<String>,
        request_url: impl Into<String>,
        request_headers: Value,
        request_body: Option<Value>,
        response_status: Option<i32>,
        response_headers: Value,
        response_body: Value,
        success: bool,
        error_message: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            payment_id,
            provider: provider.into(),
            request_url: request_url.into(),
            request_headers: mask_headers(&request_headers),
            request_body,
            response_status,
            response_headers: mask_headers(&response_headers),
            response_body,
            success,
            error_message,
            created_at: Utc::now(),
        }
    }
}

/// One row of `crm_event_log`: the same forensic shape as
/// `ProviderEventRecord`, keyed to the `crm_push_queue` item that produced
/// it (§3, §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmEventRecord {
    pub id: Uuid,
    pub queue_item_id: Uuid,
    pub request_url: String,
    pub request_headers: Value,
    pub request_payload: Value,
    pub response_status: Option<i32>,
    pub response_headers: Value,
    pub response_body: Value,
    pub success: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CrmEventRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue_item_id: Uuid,
        request_url: impl Into<String>,
        request_headers: Value,
        request_payload: Value,
        response_status: Option<i32>,
        response_headers: Value,
        response_body: Value,
        success: bool,
        error_message: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            queue_item_id,
            request_url: request_url.into(),
            request_headers: mask_headers(&request_headers),
            request_payload,
            response_status,
            response_headers: mask_headers(&response_headers),
            response_body,
            success,
            error_message,
            created_at: Utc::now(),
        }
    }
}
