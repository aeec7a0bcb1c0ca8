use {
    crate::domain::{error::PipelineError, runtime_log::RuntimeLogRecord},
    sqlx::PgPool,
};

/// Appends one `service_runtime_log` row (§3, §4.8). Never updated or
/// deleted — the supervisor's only write to this table.
pub async fn insert(pool: &PgPool, record: &RuntimeLogRecord) -> Result<(), PipelineError> {
    sqlx::query!(
        r#"
        INSERT INTO service_runtime_log (id, kind, loop_name, detail, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
        record.id,
        record.kind.as_str(),
        record.loop_name,
        record.detail,
        record.created_at,
    )
    .execute(pool)
    .await?;
    Ok(())
}
