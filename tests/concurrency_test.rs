mod common;

use common::*;
use psp_reconciler::{
    domain::status::CanonicalStatus,
    infra::postgres::payment_repo,
    services::poller::{run_poller, PollerSettings},
};
use std::{collections::HashSet, sync::Arc, time::Duration};

/// `select_payments_for_reconciliation` respects `FOR UPDATE SKIP LOCKED`:
/// two concurrent transactions claiming against the same eligible set split
/// the work rather than double-claiming a row, mirroring
/// `crm_queue_test.rs`'s `claim_pending_does_not_double_claim_under_concurrency`
/// for the `payments` table's own claim query (§4.3, §5).
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn select_payments_for_reconciliation_does_not_double_claim_under_concurrency() {
    let pool = setup_pool("psp_reconciler_test_concurrency_claim").await;
    let mut payment_ids = Vec::new();
    for _ in 0..10 {
        payment_ids.push(insert_payment(&pool, "card-psp", CanonicalStatus::Pending, Some("tok")).await);
    }

    let providers = vec!["card-psp".to_string()];
    let offsets = vec![0i64];

    let pool_a = pool.clone();
    let pool_b = pool.clone();
    let providers_a = providers.clone();
    let providers_b = providers.clone();
    let offsets_a = offsets.clone();
    let offsets_b = offsets.clone();

    let (a, b) = tokio::join!(
        tokio::spawn(async move {
            let mut tx = pool_a.begin().await.unwrap();
            let claimed =
                payment_repo::select_payments_for_reconciliation(&mut tx, 5, &providers_a, &offsets_a)
                    .await
                    .unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            tx.commit().await.unwrap();
            claimed.into_iter().map(|p| p.id).collect::<Vec<_>>()
        }),
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let mut tx = pool_b.begin().await.unwrap();
            let claimed =
                payment_repo::select_payments_for_reconciliation(&mut tx, 5, &providers_b, &offsets_b)
                    .await
                    .unwrap();
            tx.commit().await.unwrap();
            claimed.into_iter().map(|p| p.id).collect::<Vec<_>>()
        }),
    );

    let (claimed_a, claimed_b) = (a.unwrap(), b.unwrap());
    let total = claimed_a.len() + claimed_b.len();
    assert_eq!(total, 10, "every eligible payment claimed exactly once across both transactions");

    let seen: HashSet<_> = claimed_a.iter().chain(claimed_b.iter()).collect();
    assert_eq!(seen.len(), 10, "no payment claimed by both transactions");
    for id in &payment_ids {
        assert!(seen.contains(id), "every inserted payment was claimed by one worker or the other");
    }
}

/// Full end-to-end version of spec.md §8 scenario 4: two competing poller
/// workers against ten eligible payments. Exactly ten adapter calls total,
/// and each payment is updated (to `AUTHORIZED`) exactly once — no payment
/// is processed twice and none are left behind.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn two_workers_process_ten_payments_exactly_once() {
    let pool = setup_pool("psp_reconciler_test_concurrency_workers").await;
    let mut payment_ids = Vec::new();
    for _ in 0..10 {
        payment_ids.push(insert_payment(&pool, "card-psp", CanonicalStatus::Pending, Some("tok")).await);
    }

    let adapter = Arc::new(CountingAdapter::new());
    let settings = PollerSettings {
        interval: Duration::from_millis(20),
        batch_size: 10,
        attempt_offsets: vec![0],
        providers: vec!["card-psp".to_string()],
        abandoned_timeout_minutes: 1440,
    };

    let pool_a = pool.clone();
    let pool_b = pool.clone();
    let adapters_a = registry_with_shared("card-psp", adapter.clone());
    let adapters_b = registry_with_shared("card-psp", adapter.clone());
    let settings_a = settings.clone();
    let settings_b = settings.clone();

    let (worker_a, rx_a) = {
        let (tx, rx) = tokio::sync::watch::channel(false);
        (
            tokio::spawn(async move { run_poller(pool_a, adapters_a, settings_a, rx).await }),
            tx,
        )
    };
    let (worker_b, rx_b) = {
        let (tx, rx) = tokio::sync::watch::channel(false);
        (
            tokio::spawn(async move { run_poller(pool_b, adapters_b, settings_b, rx).await }),
            tx,
        )
    };

    tokio::time::sleep(Duration::from_millis(300)).await;
    let _ = rx_a.send(true);
    let _ = rx_b.send(true);
    worker_a.await.expect("worker a panicked");
    worker_b.await.expect("worker b panicked");

    assert_eq!(adapter.call_count(), 10, "exactly ten adapter calls across both workers");

    for id in payment_ids {
        assert_eq!(payment_status(&pool, id).await, "AUTHORIZED");
        assert_eq!(count_status_checks(&pool, id).await, 1, "each payment updated exactly once");
    }
}
