pub mod card_psp;
pub mod local_redirect_psp;
pub mod registry;
pub mod wallet_psp;

/// Renders a response's headers as a JSON object of string values, for the
/// `provider_event_log`/`crm_event_log` forensic record (§3). Masking of
/// sensitive header names happens later, centrally, in
/// `domain::event_log::mask_headers`.
pub(crate) fn headers_to_json(headers: &reqwest::header::HeaderMap) -> serde_json::Value {
    let map = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                serde_json::Value::String(value.to_str().unwrap_or("").to_string()),
            )
        })
        .collect();
    serde_json::Value::Object(map)
}
