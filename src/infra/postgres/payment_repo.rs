use {
    crate::domain::{error::PipelineError, event_log::ProviderEventRecord, payment::Payment, status::CanonicalStatus},
    sqlx::{Postgres, Transaction},
    uuid::Uuid,
};

/// Claims up to `batch_size` payments eligible for their next PSP poll,
/// per spec §4.3/§4.6: non-terminal status, provider in the configured
/// whitelist, and the k-th retry offset (`k` = prior `status_checks` count)
/// has elapsed since `created_at`. `FOR UPDATE SKIP LOCKED` is the
/// horizontal-partitioning mechanism, locking a time-windowed batch
/// without contending with concurrent claimers. Rows stay locked for the
/// lifetime of `tx`.
pub async fn select_payments_for_reconciliation(
    tx: &mut Transaction<'_, Postgres>,
    batch_size: i64,
    providers: &[String],
    offsets_seconds: &[i64],
) -> Result<Vec<Payment>, PipelineError> {
    if offsets_seconds.is_empty() || providers.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, Payment>(
        r#"
        WITH eligible AS (
            SELECT
                p.*,
                (SELECT COUNT(*) FROM status_checks sc WHERE sc.payment_id = p.id) AS checks_count
            FROM payments p
            WHERE p.status IN ('PENDING', 'TO_CONFIRM')
              AND p.provider = ANY($1)
        )
        SELECT id, provider, token, status, amount_minor, context, product_id,
               authorization_code, status_reason, created_at, updated_at,
               first_authorized_at, failed_at, canceled_at, refunded_at, abandoned_at
        FROM eligible
        WHERE checks_count < array_length($2::bigint[], 1)
          AND now() >= created_at + make_interval(secs => (($2::bigint[])[checks_count + 1])::double precision)
        ORDER BY created_at
        LIMIT $3
        FOR UPDATE SKIP LOCKED
        "#,
    )
    .bind(providers)
    .bind(offsets_seconds)
    .bind(batch_size)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows)
}

/// Claims `PENDING` payments older than `timeout_minutes`, independent of
/// the retry-offset schedule (§6 `ABANDONED_TIMEOUT_MINUTES`, design
/// decision 4 in DESIGN.md: the two abandonment triggers are evaluated
/// independently, not reconciled into one countdown).
pub async fn select_timed_out_payments(
    tx: &mut Transaction<'_, Postgres>,
    timeout_minutes: i64,
    batch_size: i64,
) -> Result<Vec<Payment>, PipelineError> {
    let rows = sqlx::query_as::<_, Payment>(
        r#"
        SELECT id, provider, token, status, amount_minor, context, product_id,
               authorization_code, status_reason, created_at, updated_at,
               first_authorized_at, failed_at, canceled_at, refunded_at, abandoned_at
        FROM payments
        WHERE status = 'PENDING'
          AND created_at < now() - make_interval(mins => $1)
        ORDER BY created_at
        LIMIT $2
        FOR UPDATE SKIP LOCKED
        "#,
    )
    .bind(timeout_minutes as i32)
    .bind(batch_size)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows)
}

/// Appends one `status_checks` row. Never modified after insert (§3).
pub async fn record_status_check(
    tx: &mut Transaction<'_, Postgres>,
    payment_id: Uuid,
    provider: &str,
    success: bool,
    provider_status: Option<&str>,
    mapped_status: Option<&str>,
    response_code: Option<i32>,
    raw_payload: &serde_json::Value,
    error_message: Option<&str>,
) -> Result<(), PipelineError> {
    sqlx::query!(
        r#"
        INSERT INTO status_checks
            (id, payment_id, provider, success, provider_status, mapped_status,
             response_code, raw_payload, error_message, requested_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())
        "#,
        Uuid::now_v7(),
        payment_id,
        provider,
        success,
        provider_status,
        mapped_status,
        response_code,
        raw_payload,
        error_message,
    )
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Appends one `provider_event_log` row regardless of call outcome (§3,
/// §4.6 step b). `record`'s `request_headers` are already masked —
/// `ProviderEventRecord::new` applies `domain::event_log::mask_headers`
/// at construction, so no adapter call site can forget it.
pub async fn record_provider_event(
    tx: &mut Transaction<'_, Postgres>,
    record: &ProviderEventRecord,
    latency_ms: i64,
) -> Result<(), PipelineError> {
    sqlx::query!(
        r#"
        INSERT INTO provider_event_log
            (id, payment_id, provider, request_url, request_headers, request_body,
             response_status, response_headers, response_body, success, error_message,
             latency_ms, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
        record.id,
        record.payment_id,
        record.provider,
        record.request_url,
        record.request_headers,
        record.request_body,
        record.response_status,
        record.response_headers,
        record.response_body,
        record.success,
        record.error_message,
        latency_ms,
        record.created_at,
    )
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Returns how many `status_checks` rows exist for a payment — the `k`
/// that drives the retry-offset index (§4.6).
pub async fn count_status_checks(
    tx: &mut Transaction<'_, Postgres>,
    payment_id: Uuid,
) -> Result<i64, PipelineError> {
    let count = sqlx::query_scalar!(
        "SELECT COUNT(*) FROM status_checks WHERE payment_id = $1",
        payment_id
    )
    .fetch_one(&mut **tx)
    .await?
    .unwrap_or(0);
    Ok(count)
}

/// Advances a payment's status, setting exactly the terminal timestamp
/// column the new status requires (or none, for the non-terminal
/// statuses) and always bumping `updated_at`. The column name is selected
/// from the closed `CanonicalStatus::terminal_timestamp_column()` set,
/// never from caller-supplied input, so building the UPDATE by format! is
/// safe.
pub async fn update_payment_status(
    tx: &mut Transaction<'_, Postgres>,
    payment_id: Uuid,
    new_status: CanonicalStatus,
    status_reason: Option<&str>,
    authorization_code: Option<&str>,
) -> Result<(), PipelineError> {
    match new_status.terminal_timestamp_column() {
        Some(column) => {
            let sql = format!(
                "UPDATE payments SET status = $1, status_reason = $2, authorization_code = \
                 COALESCE($3, authorization_code), {column} = now(), updated_at = now() WHERE id = $4"
            );
            sqlx::query(&sql)
                .bind(new_status.as_str())
                .bind(status_reason)
                .bind(authorization_code)
                .bind(payment_id)
                .execute(&mut **tx)
                .await?;
        }
        None => {
            sqlx::query!(
                r#"
                UPDATE payments
                SET status = $1, status_reason = $2, updated_at = now()
                WHERE id = $3
                "#,
                new_status.as_str(),
                status_reason,
                payment_id,
            )
            .execute(&mut **tx)
            .await?;
        }
    }
    Ok(())
}

/// Transitions a payment to `ABANDONED` with a fixed reason, per §4.6 step
/// e and the timeout sweep in §6. A thin wrapper over
/// `update_payment_status` kept separate because both callers (retry
/// exhaustion and timeout) want a named, intention-revealing call site.
pub async fn mark_abandoned(
    tx: &mut Transaction<'_, Postgres>,
    payment_id: Uuid,
    reason: &str,
) -> Result<(), PipelineError> {
    update_payment_status(tx, payment_id, CanonicalStatus::Abandoned, Some(reason), None).await
}
