use {
    crate::{
        domain::{
            error::PipelineError,
            event_log::CrmEventRecord,
            queue::{next_send_outcome, SendOutcome},
            runtime_log::{RuntimeLogKind, RuntimeLogRecord},
        },
        infra::postgres::{crm_queue_repo, runtime_log_repo},
    },
    sqlx::PgPool,
    std::time::Duration,
    tokio::sync::watch,
};

#[derive(Debug, Clone)]
pub struct SenderSettings {
    pub interval: Duration,
    pub batch_size: i64,
    pub base_url: String,
    pub pagar_path: String,
    pub auth_bearer: String,
    pub retry_backoff: Vec<u64>,
    pub http_timeout: Duration,
}

/// Drains the CRM push queue until the shutdown signal fires, mirroring
/// the poller's loop shape, per spec §4.7: reactivate due `FAILED` items,
/// claim a `PENDING` batch, POST each, and sleep the full interval only
/// when the claimed batch was empty.
pub async fn run_sender(pool: PgPool, settings: SenderSettings, mut shutdown: watch::Receiver<bool>) {
    tracing::info!("crm sender started");

    let client = reqwest::Client::builder()
        .timeout(settings.http_timeout)
        .build()
        .expect("crm http client");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let claimed = match run_cycle(&pool, &client, &settings).await {
            Ok(claimed) => claimed,
            Err(e) => {
                tracing::error!(error = %e, "crm sender cycle failed");
                log_loop_error(&pool, "crm_sender", &e).await;
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

    tracing::info!("crm sender shutting down");
}

async fn run_cycle(
    pool: &PgPool,
    client: &reqwest::Client,
    settings: &SenderSettings,
) -> Result<usize, PipelineError> {
    crm_queue_repo::reactivate_due_failed(pool).await?;

    let mut tx = pool.begin().await?;
    let items = crm_queue_repo::claim_pending(&mut tx, settings.batch_size).await?;
    let claimed = items.len();

    for item in &items {
        let mut savepoint = tx.begin().await?;
        if let Err(e) = send_one(&mut savepoint, client, settings, item).await {
            tracing::error!(queue_item_id = %item.id, error = %e, "crm send attempt failed, will retry");
            savepoint.rollback().await?;
        } else {
            savepoint.commit().await?;
        }
    }

    tx.commit().await?;
    Ok(claimed)
}

async fn send_one(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    client: &reqwest::Client,
    settings: &SenderSettings,
    item: &crate::domain::queue::CrmQueueItem,
) -> Result<(), PipelineError> {
    let url = format!("{}{}", settings.base_url, settings.pagar_path);

    let send_result = client
        .post(&url)
        .bearer_auth(&settings.auth_bearer)
        .json(&item.payload)
        .send()
        .await;

    let request_headers = serde_json::json!({
        "Authorization": format!("Bearer {}", settings.auth_bearer),
    });

    match send_result {
        Ok(response) => {
            let status_code = response.status().as_u16() as i32;
            let is_2xx = response.status().is_success();
            let response_headers = crate::adapters::headers_to_json(response.headers());
            let body: serde_json::Value = response.json().await.unwrap_or(serde_json::Value::Null);

            let event = CrmEventRecord::new(
                item.id,
                url.clone(),
                request_headers,
                item.payload.clone(),
                Some(status_code),
                response_headers,
                body.clone(),
                is_2xx,
                None,
            );
            crm_queue_repo::record_crm_event(tx, &event).await?;

            if is_2xx {
                let crm_id = body.get("id").and_then(|v| v.as_str());
                crm_queue_repo::mark_sent(tx, item.id, status_code, crm_id).await?;
            } else {
                finalize_failure(
                    tx,
                    item,
                    settings,
                    Some(status_code),
                    &format!("crm responded with status {status_code}"),
                )
                .await?;
            }
        }
        Err(err) => {
            let error_message = format!("crm transport error: {err}");
            let event = CrmEventRecord::new(
                item.id,
                url.clone(),
                request_headers,
                item.payload.clone(),
                None,
                serde_json::Value::Null,
                serde_json::Value::Null,
                false,
                Some(error_message.clone()),
            );
            crm_queue_repo::record_crm_event(tx, &event).await?;

            finalize_failure(tx, item, settings, None, &error_message).await?;
        }
    }

    Ok(())
}

async fn finalize_failure(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    item: &crate::domain::queue::CrmQueueItem,
    settings: &SenderSettings,
    response_code: Option<i32>,
    error: &str,
) -> Result<(), PipelineError> {
    let attempts_after = item.attempts + 1;
    let outcome = next_send_outcome(false, attempts_after, &settings.retry_backoff, chrono::Utc::now());

    let next_attempt_at = match outcome {
        SendOutcome::RetryScheduled { next_attempt_at } => Some(next_attempt_at),
        SendOutcome::PermanentlyFailed | SendOutcome::Sent => None,
    };

    crm_queue_repo::mark_failed(tx, item.id, attempts_after, next_attempt_at, response_code, error).await?;
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
