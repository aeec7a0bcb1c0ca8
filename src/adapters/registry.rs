use {
    super::{card_psp::CardPspAdapter, local_redirect_psp::LocalRedirectPspAdapter, wallet_psp::WalletPspAdapter},
    crate::{config::Config, domain::provider::PspAdapter},
    std::{collections::HashMap, sync::Arc, time::Duration},
};

/// Table lookup from a payment's `provider` column to its adapter instance,
/// built once at startup — the "no runtime reflection, no dynamic loading"
/// dispatch mechanism §9 asks for.
pub type AdapterRegistry = HashMap<String, Arc<dyn PspAdapter>>;

const DEFAULT_ADAPTER_TIMEOUT: Duration = Duration::from_secs(20);

/// Builds the registry from configuration. Only adapters whose credentials
/// are present in `config` are registered; the poller's selection query
/// already restricts to `RECONCILE_POLLING_PROVIDERS`, but a provider
/// listed there without a configured adapter will hit the defensive
/// `adapter_not_configured` fallback in the poller (§4.2, §7).
pub fn build(config: &Config) -> AdapterRegistry {
    let mut registry: AdapterRegistry = HashMap::new();

    if let Some(api_key) = &config.card_psp_api_key {
        registry.insert(
            "card-psp".to_string(),
            Arc::new(CardPspAdapter::new(
                "https://card-psp.invalid/v1",
                api_key.clone(),
                DEFAULT_ADAPTER_TIMEOUT,
            )),
        );
    }

    if let (Some(client_id), Some(client_secret)) =
        (&config.wallet_psp_client_id, &config.wallet_psp_client_secret)
    {
        registry.insert(
            "wallet-psp".to_string(),
            Arc::new(WalletPspAdapter::new(
                "https://wallet-psp.invalid",
                client_id.clone(),
                client_secret.clone(),
                DEFAULT_ADAPTER_TIMEOUT,
            )),
        );
    }

    if let Some(api_key) = &config.local_redirect_psp_api_key {
        registry.insert(
            "local-redirect-psp".to_string(),
            Arc::new(LocalRedirectPspAdapter::new(
                "https://local-redirect-psp.invalid",
                api_key.clone(),
                DEFAULT_ADAPTER_TIMEOUT,
            )),
        );
    }

    registry
}
