mod common;

use common::*;
use psp_reconciler::{
    domain::status::CanonicalStatus,
    services::crm_sender::{run_sender, SenderSettings},
};
use std::time::Duration;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

fn settings_for(server: &MockServer) -> SenderSettings {
    SenderSettings {
        interval: Duration::from_millis(20),
        batch_size: 10,
        base_url: server.uri(),
        pagar_path: "/api/pagar".to_string(),
        auth_bearer: "test-bearer".to_string(),
        retry_backoff: vec![1, 2],
        http_timeout: Duration::from_secs(5),
    }
}

/// A 2xx response marks the queue item `SENT` and records the CRM-assigned
/// id, per §4.7.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn successful_push_marks_sent() {
    let pool = setup_pool("psp_reconciler_test_crm_sent").await;
    let payment_id = insert_payment(&pool, "card-psp", CanonicalStatus::Authorized, None).await;
    sqlx::query(
        "INSERT INTO crm_push_queue (id, payment_id, operation, status, payload, attempts) \
         VALUES (gen_random_uuid(), $1, 'PAGAR', 'PENDING', '{}'::jsonb, 0)",
    )
    .bind(payment_id)
    .execute(&pool)
    .await
    .unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/pagar"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "crm_123"})))
        .mount(&server)
        .await;

    let settings = settings_for(&server);
    drive_one_cycle(|rx| {
        let pool = pool.clone();
        async move { run_sender(pool, settings, rx).await }
    })
    .await;

    assert_eq!(crm_queue_status(&pool, payment_id).await, Some("SENT".to_string()));
}

/// A non-2xx response schedules a retry (stays `FAILED` with a
/// `next_attempt_at`), not a permanent failure, while attempts remain — §4.7,
/// §9 decision 2.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn error_response_schedules_retry() {
    let pool = setup_pool("psp_reconciler_test_crm_retry").await;
    let payment_id = insert_payment(&pool, "card-psp", CanonicalStatus::Authorized, None).await;
    sqlx::query(
        "INSERT INTO crm_push_queue (id, payment_id, operation, status, payload, attempts) \
         VALUES (gen_random_uuid(), $1, 'PAGAR', 'PENDING', '{}'::jsonb, 0)",
    )
    .bind(payment_id)
    .execute(&pool)
    .await
    .unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/pagar"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let settings = settings_for(&server);
    drive_one_cycle(|rx| {
        let pool = pool.clone();
        async move { run_sender(pool, settings, rx).await }
    })
    .await;

    assert_eq!(crm_queue_status(&pool, payment_id).await, Some("FAILED".to_string()));

    let next_attempt_at: Option<chrono::DateTime<chrono::Utc>> = sqlx::query_scalar(
        "SELECT next_attempt_at FROM crm_push_queue WHERE payment_id = $1",
    )
    .bind(payment_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(next_attempt_at.is_some(), "first failure should still have a next_attempt_at");
}

/// Once every backoff slot is spent the item is permanently `FAILED` with no
/// `next_attempt_at`, and the reactivation sweep never picks it back up.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn exhausted_backoff_is_permanent_failure() {
    let pool = setup_pool("psp_reconciler_test_crm_permanent").await;
    let payment_id = insert_payment(&pool, "card-psp", CanonicalStatus::Authorized, None).await;
    sqlx::query(
        "INSERT INTO crm_push_queue (id, payment_id, operation, status, payload, attempts) \
         VALUES (gen_random_uuid(), $1, 'PAGAR', 'PENDING', '{}'::jsonb, 1)",
    )
    .bind(payment_id)
    .execute(&pool)
    .await
    .unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/pagar"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut settings = settings_for(&server);
    settings.retry_backoff = vec![1];

    drive_one_cycle(|rx| {
        let pool = pool.clone();
        async move { run_sender(pool, settings, rx).await }
    })
    .await;

    assert_eq!(crm_queue_status(&pool, payment_id).await, Some("FAILED".to_string()));
    let next_attempt_at: Option<chrono::DateTime<chrono::Utc>> = sqlx::query_scalar(
        "SELECT next_attempt_at FROM crm_push_queue WHERE payment_id = $1",
    )
    .bind(payment_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(next_attempt_at.is_none(), "exhausted backoff should never be reactivated");
}
