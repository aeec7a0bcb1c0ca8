use {
    crate::{
        adapters::registry::AdapterRegistry,
        config::Config,
        domain::runtime_log::{RuntimeLogKind, RuntimeLogRecord},
        infra::postgres::runtime_log_repo,
        services::{
            crm_sender::{self, SenderSettings},
            poller::{self, PollerSettings},
        },
    },
    sqlx::PgPool,
    std::time::Duration,
    tokio::sync::watch,
};

/// Starts the poller and sender as independent, cooperatively-cancellable
/// tasks sharing one `watch::Sender<bool>`, and emits the lifecycle rows of
/// §4.8. Blocks until `shutdown_signal` resolves, then waits (bounded by
/// `shutdown_deadline`) for both loops to finish their in-flight batch.
pub async fn run(
    pool: PgPool,
    config: Config,
    adapters: AdapterRegistry,
    shutdown_signal: impl std::future::Future<Output = ()>,
    shutdown_deadline: Duration,
) {
    runtime_log_repo::insert(
        &pool,
        &RuntimeLogRecord::new(RuntimeLogKind::Startup, None, serde_json::json!({})),
    )
    .await
    .ok();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles = Vec::new();

    if config.reconcile_enabled {
        let settings = PollerSettings {
            interval: Duration::from_secs(config.reconcile_interval_seconds),
            batch_size: config.reconcile_batch_size,
            attempt_offsets: config.reconcile_attempt_offsets.clone(),
            providers: config.reconcile_polling_providers.clone(),
            abandoned_timeout_minutes: config.abandoned_timeout_minutes,
        };
        let pool = pool.clone();
        let adapters = adapters.clone();
        let rx = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            poller::run_poller(pool, adapters, settings, rx).await;
        }));
    } else {
        tracing::info!("reconcile loop disabled via RECONCILE_ENABLED");
    }

    if config.crm_enabled {
        let settings = SenderSettings {
            interval: Duration::from_secs(config.reconcile_interval_seconds),
            batch_size: 1,
            base_url: config.crm_base_url.clone(),
            pagar_path: config.crm_pagar_path.clone(),
            auth_bearer: config.crm_auth_bearer.clone(),
            retry_backoff: config.crm_retry_backoff.clone(),
            http_timeout: Duration::from_secs(20),
        };
        let pool = pool.clone();
        let rx = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            crm_sender::run_sender(pool, settings, rx).await;
        }));
    } else {
        tracing::info!("crm sender loop disabled via CRM_ENABLED");
    }

    let heartbeat_pool = pool.clone();
    let mut heartbeat_rx = shutdown_rx.clone();
    let heartbeat_interval = Duration::from_secs(config.heartbeat_interval_seconds);
    handles.push(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = heartbeat_rx.changed() => break,
                _ = tokio::time::sleep(heartbeat_interval) => {
                    runtime_log_repo::insert(
                        &heartbeat_pool,
                        &RuntimeLogRecord::new(RuntimeLogKind::Heartbeat, None, serde_json::json!({})),
                    )
                    .await
                    .ok();
                }
            }
        }
    }));

    shutdown_signal.await;
    tracing::info!("shutdown signal received, stopping reconciliation loops");
    let _ = shutdown_tx.send(true);

    let joined = tokio::time::timeout(shutdown_deadline, futures_join_all(handles)).await;
    if joined.is_err() {
        tracing::warn!("shutdown deadline exceeded, some loops may not have finished their batch");
    }

    runtime_log_repo::insert(
        &pool,
        &RuntimeLogRecord::new(RuntimeLogKind::Shutdown, None, serde_json::json!({})),
    )
    .await
    .ok();
}

async fn futures_join_all(handles: Vec<tokio::task::JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.await;
    }
}
