use {
    crate::domain::{
        payment::PspStatusResult,
        provider::PspAdapter,
        status::CanonicalStatus,
    },
    chrono::{DateTime, Utc},
    serde::Deserialize,
    serde_json::Value,
    std::{future::Future, pin::Pin, time::Duration},
    tokio::sync::RwLock,
};

/// Models a wallet/redirect PSP that requires an OAuth client-credentials
/// round-trip before any status call (§4.2: "an adapter may require a prior
/// authentication round-trip"). The token cache is adapter-internal and
/// must only promise thread/task safety of its own calls, per §5's
/// "shared-resource policy" — a `tokio::sync::RwLock` around an `Option` is
/// enough since refreshes are rare relative to status calls.
pub struct WalletPspAdapter {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    cached_token: RwLock<Option<CachedToken>>,
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl WalletPspAdapter {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("wallet-psp http client"),
            base_url: base_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cached_token: RwLock::new(None),
        }
    }

    async fn access_token(&self) -> Result<String, String> {
        {
            let guard = self.cached_token.read().await;
            if let Some(cached) = guard.as_ref() {
                if cached.expires_at > Utc::now() {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let url = format!("{}/oauth/token", self.base_url);
        let resp = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| format!("oauth transport error: {e}"))?;

        let token: OAuthTokenResponse = resp
            .json()
            .await
            .map_err(|e| format!("oauth parse error: {e}"))?;

        let mut guard = self.cached_token.write().await;
        let access_token = token.access_token.clone();
        *guard = Some(CachedToken {
            access_token: access_token.clone(),
            expires_at: Utc::now() + chrono::Duration::seconds(token.expires_in),
        });
        Ok(access_token)
    }

    fn request_url(&self, wallet_ref: &str) -> String {
        format!("{}/wallet_charges/{wallet_ref}", self.base_url)
    }

    async fn fetch(&self, url: &str, access_token: &str) -> Result<(i32, Value, WalletPspResponse), String> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(access_token)
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
struct OAuthTokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct WalletPspResponse {
    state: String,
    #[serde(default)]
    decline_reason: Option<String>,
}

fn canonicalize(raw: &str) -> Option<CanonicalStatus> {
    match raw {
        "created" | "awaiting_redirect" => Some(CanonicalStatus::Pending),
        "authorizing" => Some(CanonicalStatus::ToConfirm),
        "completed" => Some(CanonicalStatus::Authorized),
        "declined" | "expired" => Some(CanonicalStatus::Failed),
        "voided" => Some(CanonicalStatus::Canceled),
        _ => None,
    }
}

impl PspAdapter for WalletPspAdapter {
    fn status(
        &self,
        token: Option<&str>,
        _context: &Value,
    ) -> Pin<Box<dyn Future<Output = PspStatusResult> + Send + '_>> {
        let token = token.map(str::to_string);
        Box::pin(async move {
            let Some(token) = token else {
                return PspStatusResult::failure("wallet-psp: missing token");
            };

            // The bearer token isn't known until the OAuth round-trip
            // resolves, so the real `Authorization` header can only be
            // built once that succeeds — if it fails, no status call was
            // ever attempted and there is no outbound request to report.
            let access_token = match self.access_token().await {
                Ok(t) => t,
                Err(e) => return PspStatusResult::failure(format!("wallet-psp: {e}")),
            };

            let url = self.request_url(&token);
            let request_headers = serde_json::json!({ "Authorization": format!("Bearer {access_token}") });

            match self.fetch(&url, &access_token).await {
                Ok((status_code, response_headers, parsed)) => {
                    let raw_payload = serde_json::to_value(&parsed).unwrap_or(Value::Null);
                    PspStatusResult {
                        success: true,
                        provider_status: Some(parsed.state.clone()),
                        mapped_status: canonicalize(&parsed.state),
                        response_code: Some(status_code),
                        raw_payload,
                        error_message: None,
                        authorization_code: None,
                        status_reason: parsed.decline_reason,
                        request_url: url,
                        request_headers,
                        request_body: None,
                        response_headers,
                    }
                }
                Err(err) => PspStatusResult::transport_failure(url, request_headers, format!("wallet-psp: {err}")),
            }
        })
    }
}
