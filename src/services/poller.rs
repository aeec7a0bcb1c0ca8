use {
    super::crm_payload,
    crate::{
        adapters::registry::AdapterRegistry,
        domain::{
            error::PipelineError,
            event_log::ProviderEventRecord,
            payment::{Payment, ReconcileDecision},
            runtime_log::{RuntimeLogKind, RuntimeLogRecord},
        },
        infra::postgres::{crm_queue_repo, payment_repo, runtime_log_repo},
    },
    sqlx::PgPool,
    std::time::{Duration, Instant},
    tokio::sync::watch,
};

/// Everything the poller needs out of `Config`, narrowed to what this loop
/// actually reads — a small, purpose-built struct passed into the worker
/// rather than the whole `Config`.
#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub interval: Duration,
    pub batch_size: i64,
    pub attempt_offsets: Vec<u64>,
    pub providers: Vec<String>,
    pub abandoned_timeout_minutes: i64,
}

/// The CRM operation name every qualifying transition enqueues (§4.6).
const PAGAR_OPERATION: &str = "PAGAR";

/// Drives reconciliation cycles until the shutdown signal fires
/// (`tokio::select!` between a sleep and `shutdown.changed()`), per spec
/// §4.6: claim a batch, process each payment, and only sleep the full
/// interval when a cycle claimed nothing — a busy cycle loops immediately
/// to drain the backlog.
pub async fn run_poller(
    pool: PgPool,
    adapters: AdapterRegistry,
    settings: PollerSettings,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!("psp poller started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let claimed = match run_cycle(&pool, &adapters, &settings).await {
            Ok(claimed) => claimed,
            Err(e) => {
                tracing::error!(error = %e, "poller cycle failed");
                log_loop_error(&pool, "psp_poller", &e).await;
                0
            }
        };

        if claimed > 0 {
            continue;
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(settings.interval) => {}
        }
    }

    tracing::info!("psp poller shutting down");
}

async fn run_cycle(
    pool: &PgPool,
    adapters: &AdapterRegistry,
    settings: &PollerSettings,
) -> Result<usize, PipelineError> {
    run_timeout_sweep(pool, settings).await?;

    let offsets: Vec<i64> = settings.attempt_offsets.iter().map(|&s| s as i64).collect();

    let mut tx = pool.begin().await?;
    let payments = payment_repo::select_payments_for_reconciliation(
        &mut tx,
        settings.batch_size,
        &settings.providers,
        &offsets,
    )
    .await?;
    let claimed = payments.len();

    for payment in &payments {
        // Each payment gets its own savepoint: a failure here rolls back
        // only this payment's writes while the outer transaction — and the
        // row locks it holds — stays intact for the rest of the batch.
        let mut savepoint = tx.begin().await?;
        match reconcile_one(&mut savepoint, adapters, settings, payment).await {
            Ok(()) => savepoint.commit().await?,
            Err(e) => {
                tracing::error!(payment_id = %payment.id, error = %e, "reconciliation attempt failed, will retry next cycle");
                savepoint.rollback().await?;
            }
        }
    }

    tx.commit().await?;
    Ok(claimed)
}

/// Abandons `PENDING` payments that have outlived `ABANDONED_TIMEOUT_MINUTES`
/// regardless of their retry-offset progress — the independent timeout
/// trigger from DESIGN.md's §9 decision 4. Each timed-out payment is its
/// own transaction since it doesn't interact with the retry-schedule batch.
async fn run_timeout_sweep(pool: &PgPool, settings: &PollerSettings) -> Result<(), PipelineError> {
    let mut tx = pool.begin().await?;
    let timed_out = payment_repo::select_timed_out_payments(
        &mut tx,
        settings.abandoned_timeout_minutes,
        settings.batch_size,
    )
    .await?;

    for payment in &timed_out {
        payment_repo::mark_abandoned(&mut tx, payment.id, "abandoned timeout exceeded").await?;
    }

    tx.commit().await?;
    Ok(())
}

async fn reconcile_one(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    adapters: &AdapterRegistry,
    settings: &PollerSettings,
    payment: &Payment,
) -> Result<(), PipelineError> {
    let adapter = adapters
        .get(&payment.provider)
        .ok_or_else(|| crate::domain::provider::adapter_not_configured(&payment.provider))?;

    let started = Instant::now();
    let result = adapter.status(payment.token.as_deref(), &payment.context).await;
    let latency_ms = started.elapsed().as_millis() as i64;

    let event = ProviderEventRecord::new(
        payment.id,
        payment.provider.clone(),
        result.request_url.clone(),
        result.request_headers.clone(),
        result.request_body.clone(),
        result.response_code,
        result.response_headers.clone(),
        result.raw_payload.clone(),
        result.success,
        result.error_message.clone(),
    );
    payment_repo::record_provider_event(tx, &event, latency_ms).await?;

    payment_repo::record_status_check(
        tx,
        payment.id,
        &payment.provider,
        result.success,
        result.provider_status.as_deref(),
        result.mapped_status.map(|s| s.as_str()),
        result.response_code,
        &result.raw_payload,
        result.error_message.as_deref(),
    )
    .await?;

    let checks_so_far = payment_repo::count_status_checks(tx, payment.id).await?;
    let decision = payment.decide(
        result.mapped_status,
        result.success,
        checks_so_far as u32,
        settings.attempt_offsets.len() as u32,
    );

    match decision {
        ReconcileDecision::NoTransition => {}
        ReconcileDecision::Advance {
            new_status,
            enqueue_crm,
        } => {
            payment_repo::update_payment_status(
                tx,
                payment.id,
                new_status,
                result.status_reason.as_deref(),
                result.authorization_code.as_deref(),
            )
            .await?;

            if enqueue_crm {
                let mut updated = payment.clone();
                updated.status = new_status;
                if let Some(code) = &result.authorization_code {
                    updated.authorization_code = Some(code.clone());
                }
                let payload = crm_payload::build(&updated);
                crm_queue_repo::enqueue(tx, payment.id, PAGAR_OPERATION, &payload).await?;
            }
        }
        ReconcileDecision::AbandonRetriesExhausted => {
            payment_repo::mark_abandoned(tx, payment.id, "reconcile attempts exhausted").await?;
        }
        ReconcileDecision::AbandonTimedOut => {
            payment_repo::mark_abandoned(tx, payment.id, "abandoned timeout exceeded").await?;
        }
    }

    Ok(())
}

/// Records an uncaught cycle failure as a `LOOP_ERROR` runtime log row
/// (§7, §4.8) — best-effort: if even the log write fails there is nowhere
/// left to report it but `tracing`.
async fn log_loop_error(pool: &PgPool, loop_name: &str, error: &PipelineError) {
    let record = RuntimeLogRecord::new(
        RuntimeLogKind::LoopError,
        Some(loop_name),
        serde_json::json!({ "error": error.to_string() }),
    );
    if let Err(e) = runtime_log_repo::insert(pool, &record).await {
        tracing::error!(error = %e, "failed to record LOOP_ERROR runtime log row");
    }
}
