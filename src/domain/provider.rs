use {
    super::error::PipelineError,
    super::payment::PspStatusResult,
    serde_json::Value,
    std::{future::Future, pin::Pin},
};

/// The one operation every PSP adapter exposes: given a payment's token and
/// its opaque context bag, return a normalized status result. Adapters are
/// selected by the payment's `provider` column via a table lookup built at
/// startup (`adapters::registry::build`) — no runtime reflection, no
/// dynamic loading.
///
/// Adapters must never propagate an error out of `status`: every failure —
/// transport, parse, auth — is caught inside the adapter and turned into a
/// `PspStatusResult { success: false, .. }`.
pub trait PspAdapter: Send + Sync {
    fn status(
        &self,
        token: Option<&str>,
        context: &Value,
    ) -> Pin<Box<dyn Future<Output = PspStatusResult> + Send + '_>>;
}

/// Returned when the selection query includes a provider the poller has no
/// adapter for — a defensive fallback, since the query itself already
/// restricts to the configured provider whitelist (§4.2, §7).
pub fn adapter_not_configured(provider: &str) -> PipelineError {
    PipelineError::Config(format!("no adapter configured for provider: {provider}"))
}
