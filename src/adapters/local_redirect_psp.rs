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

/// Models a local redirect-based PSP (the merchant's checkout redirects the
/// shopper to the provider, which later confirms out of band). Two token
/// shapes are accepted — a checkout `session_id` or a settled `intent_id` —
/// normalized internally before the call goes out, per §4.2's "an adapter
/// may accept multiple token shapes": the token's prefix picks which
/// resource path to call before the request ever goes out.
pub struct LocalRedirectPspAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl LocalRedirectPspAdapter {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("local-redirect-psp http client"),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn path_for(&self, token: &str) -> Result<String, String> {
        if let Some(session) = token.strip_prefix("sess_") {
            Ok(format!("{}/checkout_sessions/{session}", self.base_url))
        } else if let Some(intent) = token.strip_prefix("lri_") {
            Ok(format!("{}/local_intents/{intent}", self.base_url))
        } else {
            Err(format!("unrecognized token shape: {token}"))
        }
    }

    fn request_headers(&self) -> Value {
        serde_json::json!({ "Api-Key": self.api_key })
    }

    async fn fetch(&self, url: &str) -> Result<(i32, Value, LocalRedirectResponse), String> {
        let resp = self
            .client
            .get(url)
            .header("Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| format!("transport error: {e}"))?;

        let status_code = resp.status().as_u16() as i32;
        let response_headers = super::headers_to_json(resp.headers());
        let parsed = resp
            .json()
            .await
            .map_err(|e| format!("parse error: {e}"))?;
        Ok((status_code, response_headers, parsed))
    }
}

#[derive(Debug, Deserialize)]
struct LocalRedirectResponse {
    situation: String,
    #[serde(default)]
    reason: Option<String>,
}

fn canonicalize(raw: &str) -> Option<CanonicalStatus> {
    match raw {
        "opened" | "redirected" => Some(CanonicalStatus::Pending),
        "settling" => Some(CanonicalStatus::ToConfirm),
        "settled" => Some(CanonicalStatus::Authorized),
        "rejected" | "expired" => Some(CanonicalStatus::Failed),
        "abandoned_by_shopper" => Some(CanonicalStatus::Canceled),
        _ => None,
    }
}

impl PspAdapter for LocalRedirectPspAdapter {
    fn status(
        &self,
        token: Option<&str>,
        _context: &Value,
    ) -> Pin<Box<dyn Future<Output = PspStatusResult> + Send + '_>> {
        let token = token.map(str::to_string);
        Box::pin(async move {
            let Some(token) = token else {
                return PspStatusResult::failure("local-redirect-psp: missing token");
            };

            let url = match self.path_for(&token) {
                Ok(url) => url,
                Err(err) => return PspStatusResult::failure(format!("local-redirect-psp: {err}")),
            };
            let request_headers = self.request_headers();

            match self.fetch(&url).await {
                Ok((status_code, response_headers, parsed)) => {
                    let raw_payload = serde_json::to_value(&parsed).unwrap_or(Value::Null);
                    PspStatusResult {
                        success: true,
                        provider_status: Some(parsed.situation.clone()),
                        mapped_status: canonicalize(&parsed.situation),
                        response_code: Some(status_code),
                        raw_payload,
                        error_message: None,
                        authorization_code: None,
                        status_reason: parsed.reason,
                        request_url: url,
                        request_headers,
                        request_body: None,
                        response_headers,
                    }
                }
                Err(err) => PspStatusResult::transport_failure(url, request_headers, format!("local-redirect-psp: {err}")),
            }
        })
    }
}
