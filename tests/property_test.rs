use proptest::prelude::*;
use psp_reconciler::domain::{
    money::AmountMinor,
    queue::{next_send_outcome, SendOutcome},
    status::CanonicalStatus,
};

fn arb_status() -> impl Strategy<Value = CanonicalStatus> {
    prop_oneof![
        Just(CanonicalStatus::Pending),
        Just(CanonicalStatus::ToConfirm),
        Just(CanonicalStatus::Authorized),
        Just(CanonicalStatus::Failed),
        Just(CanonicalStatus::Canceled),
        Just(CanonicalStatus::Refunded),
        Just(CanonicalStatus::Abandoned),
    ]
}

proptest! {
    /// `as_str` → `TryFrom<&str>` roundtrips to the same variant for every
    /// canonical status.
    #[test]
    fn status_roundtrip(status in arb_status()) {
        let roundtripped = CanonicalStatus::try_from(status.as_str()).unwrap();
        prop_assert_eq!(roundtripped, status);
    }

    /// A status is terminal if and only if it is not one of the two
    /// non-terminal variants — the two partitions are always complementary.
    #[test]
    fn terminal_and_non_terminal_partition_every_status(status in arb_status()) {
        prop_assert_eq!(status.is_terminal(), !status.is_non_terminal());
    }

    /// Every terminal status names a timestamp column to stamp; every
    /// non-terminal status names none — mechanical grounding for the
    /// "exactly one terminal timestamp set" invariant.
    #[test]
    fn terminal_timestamp_column_matches_terminality(status in arb_status()) {
        prop_assert_eq!(status.terminal_timestamp_column().is_some(), status.is_terminal());
    }

    /// `AmountMinor::new` accepts every non-negative value and round-trips
    /// through `get()`.
    #[test]
    fn amount_minor_accepts_non_negative(units in 0i64..=i64::MAX) {
        let amount = AmountMinor::new(units).unwrap();
        prop_assert_eq!(amount.get(), units);
    }

    /// `AmountMinor::new` rejects every negative value.
    #[test]
    fn amount_minor_rejects_negative(units in i64::MIN..0i64) {
        prop_assert!(AmountMinor::new(units).is_err());
    }

    /// An attempt count equal to (or past) the backoff list length is
    /// always a permanent failure, for any schedule — a row that has
    /// failed `len(backoff)` times never gets another retry.
    #[test]
    fn backoff_schedule_permanently_fails_at_and_past_its_length(
        backoff in prop::collection::vec(1u64..=3600, 0..8),
        overshoot in 0i32..10,
    ) {
        let attempts_after = backoff.len() as i32 + overshoot;
        let outcome = next_send_outcome(false, attempts_after, &backoff, chrono::Utc::now());
        prop_assert_eq!(outcome, SendOutcome::PermanentlyFailed);
    }

    /// An attempt count short of the backoff list length always reschedules
    /// using that attempt's slot in the schedule.
    #[test]
    fn backoff_schedule_retries_before_its_length(
        backoff in prop::collection::vec(1u64..=3600, 1..8),
        offset in 0usize..8,
    ) {
        let attempts_after = (offset % backoff.len()) as i32 + 1;
        prop_assume!(attempts_after < backoff.len() as i32);
        let now = chrono::Utc::now();
        let outcome = next_send_outcome(false, attempts_after, &backoff, now);
        prop_assert_eq!(
            outcome,
            SendOutcome::RetryScheduled {
                next_attempt_at: now + chrono::Duration::seconds(backoff[attempts_after as usize - 1] as i64)
            }
        );
    }

    /// A successful send always wins regardless of attempt count or
    /// backoff schedule shape.
    #[test]
    fn success_always_wins(
        attempts_after in 1i32..20,
        backoff in prop::collection::vec(1u64..=3600, 0..8),
    ) {
        let outcome = next_send_outcome(true, attempts_after, &backoff, chrono::Utc::now());
        prop_assert_eq!(outcome, SendOutcome::Sent);
    }
}
