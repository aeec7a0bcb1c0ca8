use {
    crate::domain::{
        payment::PspStatusResult,
        provider::PspAdapter,
        status::CanonicalStatus,
    },
    serde::Deserialize,
    serde_json::Value,
    std::{future::Future, pin::Pin, time::Duration},
};

/// Models a Stripe-like card PSP: one token shape (a PaymentIntent id), one
/// status field on the response body. A single `GET` by id, mapped through a
/// small status table; every failure path is caught here and turned into
/// `PspStatusResult { success: false, .. }` — the adapter contract is that it
/// must never let an error escape `status`.
pub struct CardPspAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CardPspAdapter {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("card-psp http client"),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn request_url(&self, token: &str) -> String {
        format!("{}/payment_intents/{token}", self.base_url)
    }

    fn request_headers(&self) -> Value {
        serde_json::json!({ "Authorization": format!("Bearer {}", self.api_key) })
    }

    async fn fetch(&self, url: &str) -> Result<(i32, Value, CardPspResponse), String> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| format!("transport error: {e}"))?;

        let status_code = resp.status().as_u16() as i32;
        let response_headers = super::headers_to_json(resp.headers());
        let body: Value = resp
            .json()
            .await
            .map_err(|e| format!("parse error: {e}"))?;

        let parsed: CardPspResponse =
            serde_json::from_value(body.clone()).map_err(|e| format!("decode error: {e}"))?;
        Ok((status_code, response_headers, parsed))
    }
}

#[derive(Debug, Deserialize)]
struct CardPspResponse {
    status: String,
    #[serde(default)]
    authorization_code: Option<String>,
    #[serde(default)]
    failure_reason: Option<String>,
}

/// Raw status vocabulary → canonical status, per spec §4.1. Unknown raw
/// statuses deliberately fall through to `None` ("no transition") rather
/// than erroring — the closed-set match has no catch-all arm that maps to
/// a variant.
fn canonicalize(raw: &str) -> Option<CanonicalStatus> {
    match raw {
        "requires_payment_method" | "requires_confirmation" | "requires_action" => {
            Some(CanonicalStatus::Pending)
        }
        "processing" | "requires_capture" => Some(CanonicalStatus::ToConfirm),
        "succeeded" => Some(CanonicalStatus::Authorized),
        "canceled" => Some(CanonicalStatus::Canceled),
        "failed" => Some(CanonicalStatus::Failed),
        _ => None,
    }
}

impl PspAdapter for CardPspAdapter {
    fn status(
        &self,
        token: Option<&str>,
        _context: &Value,
    ) -> Pin<Box<dyn Future<Output = PspStatusResult> + Send + '_>> {
        let token = token.map(str::to_string);
        Box::pin(async move {
            let Some(token) = token else {
                return PspStatusResult::failure("card-psp: missing token");
            };

            let url = self.request_url(&token);
            let request_headers = self.request_headers();

            match self.fetch(&url).await {
                Ok((status_code, response_headers, parsed)) => {
                    let raw_payload = serde_json::to_value(&parsed).unwrap_or(Value::Null);
                    PspStatusResult {
                        success: true,
                        provider_status: Some(parsed.status.clone()),
                        mapped_status: canonicalize(&parsed.status),
                        response_code: Some(status_code),
                        raw_payload,
                        error_message: None,
                        authorization_code: parsed.authorization_code,
                        status_reason: parsed.failure_reason,
                        request_url: url,
                        request_headers,
                        request_body: None,
                        response_headers,
                    }
                }
                Err(err) => PspStatusResult::transport_failure(url, request_headers, format!("card-psp: {err}")),
            }
        })
    }
}
