use {
    crate::domain::{error::PipelineError, event_log::CrmEventRecord, queue::CrmQueueItem},
    chrono::{DateTime, Utc},
    sqlx::{PgPool, Postgres, Transaction},
    uuid::Uuid,
};

/// Idempotent on `(payment_id, operation)` — a second enqueue for the same
/// pair is a no-op that keeps the first payload, per spec §4.4 and
/// DESIGN.md's decision on the §9 open question (`ON CONFLICT ... DO
/// NOTHING`). Takes the poller's in-flight transaction so the enqueue
/// commits (or rolls back) atomically with the status transition that
/// triggered it.
pub async fn enqueue(
    tx: &mut Transaction<'_, Postgres>,
    payment_id: Uuid,
    operation: &str,
    payload: &serde_json::Value,
) -> Result<(), PipelineError> {
    sqlx::query!(
        r#"
        INSERT INTO crm_push_queue (id, payment_id, operation, status, payload, attempts)
        VALUES ($1, $2, $3, 'PENDING', $4, 0)
        ON CONFLICT (payment_id, operation) DO NOTHING
        "#,
        Uuid::now_v7(),
        payment_id,
        operation,
        payload,
    )
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Transitions `FAILED` items whose `next_attempt_at` has elapsed back to
/// `PENDING`, per spec §4.4. Permanently-failed rows (`next_attempt_at =
/// NULL`) are untouched — `NULL <= now()` is never true, so the `WHERE`
/// clause excludes them without a separate check. A single blanket sweep
/// over the pool.
pub async fn reactivate_due_failed(pool: &PgPool) -> Result<u64, PipelineError> {
    let result = sqlx::query!(
        r#"
        UPDATE crm_push_queue
        SET status = 'PENDING', updated_at = now()
        WHERE status = 'FAILED' AND next_attempt_at <= now()
        "#
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Claims up to `batch` `PENDING` items with skip-locked semantics, per
/// spec §4.4/§4.7. Locks rows for the lifetime of `tx`, mirroring
/// `payment_repo::select_payments_for_reconciliation`.
pub async fn claim_pending(
    tx: &mut Transaction<'_, Postgres>,
    batch: i64,
) -> Result<Vec<CrmQueueItem>, PipelineError> {
    let rows = sqlx::query_as::<_, CrmQueueItem>(
        r#"
        SELECT id, payment_id, operation, status, payload, attempts,
               next_attempt_at, last_attempt_at, response_code, crm_id, last_error,
               created_at, updated_at, sent_at
        FROM crm_push_queue
        WHERE id IN (
            SELECT id FROM crm_push_queue
            WHERE status = 'PENDING'
            ORDER BY created_at
            LIMIT $1
            FOR UPDATE SKIP LOCKED
        )
        "#,
    )
    .bind(batch)
    .fetch_all(&mut **tx)
    .await?;
    Ok(rows)
}

/// Marks a queue item permanently sent — a terminal sink (§3, §4.4).
pub async fn mark_sent(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    response_code: i32,
    crm_id: Option<&str>,
) -> Result<(), PipelineError> {
    sqlx::query!(
        r#"
        UPDATE crm_push_queue
        SET status = 'SENT', attempts = attempts + 1, last_attempt_at = now(),
            response_code = $2, crm_id = $3, sent_at = now(), next_attempt_at = NULL,
            updated_at = now()
        WHERE id = $1
        "#,
        id,
        response_code,
        crm_id,
    )
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Records a failed send attempt. `next_attempt_at = None` marks the item
/// permanently `FAILED` (backoff schedule exhausted, §4.7, §9 decision 2);
/// otherwise it schedules the next try.
pub async fn mark_failed(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    attempts: i32,
    next_attempt_at: Option<DateTime<Utc>>,
    response_code: Option<i32>,
    error: &str,
) -> Result<(), PipelineError> {
    sqlx::query!(
        r#"
        UPDATE crm_push_queue
        SET status = 'FAILED', attempts = $2, last_attempt_at = now(),
            next_attempt_at = $3, response_code = $4, last_error = $5, updated_at = now()
        WHERE id = $1
        "#,
        id,
        attempts,
        next_attempt_at,
        response_code,
        error,
    )
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Appends one `crm_event_log` row, mirroring `record_provider_event`
/// (§3, §4.7). `record`'s `request_headers` are already masked —
/// `CrmEventRecord::new` applies `domain::event_log::mask_headers` at
/// construction.
pub async fn record_crm_event(
    tx: &mut Transaction<'_, Postgres>,
    record: &CrmEventRecord,
) -> Result<(), PipelineError> {
    sqlx::query!(
        r#"
        INSERT INTO crm_event_log
            (id, queue_item_id, request_url, request_headers, request_payload,
             response_status, response_headers, response_body, success, error_message,
             created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
        record.id,
        record.queue_item_id,
        record.request_url,
        record.request_headers,
        record.request_payload,
        record.response_status,
        record.response_headers,
        record.response_body,
        record.success,
        record.error_message,
        record.created_at,
    )
    .execute(&mut **tx)
    .await?;
    Ok(())
}
