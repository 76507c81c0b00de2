//! Invariants tested:
//! - Within one window the guard trips exactly when the threshold is exceeded,
//!   and only once
//! - The guard re-arms once the counted attempts age out of the window

use proptest::prelude::*;
use std::time::Duration;
use tidewire_reconnect::{ReconnectRateGuard, RECONNECT_RATE_WINDOW};
use tokio::time::Instant;

proptest! {
    #[test]
    fn trips_once_per_window(
        threshold in 1usize..30,
        attempts in 0usize..60,
        spacing_ms in 0u64..2_000,
    ) {
        let mut guard = ReconnectRateGuard::new(threshold);
        let start = Instant::now();
        let mut trips = Vec::new();

        for i in 0..attempts {
            // All attempts fit inside the first window.
            let at = start + Duration::from_millis(spacing_ms * i as u64);
            if let Some(count) = guard.record_attempt(at) {
                trips.push(count);
            }
        }

        if attempts > threshold {
            prop_assert_eq!(trips, vec![threshold + 1]);
        } else {
            prop_assert!(trips.is_empty());
        }
    }
}

#[test]
fn rearms_after_attempts_age_out() {
    let mut guard = ReconnectRateGuard::new(1);
    let start = Instant::now();

    assert_eq!(guard.record_attempt(start), None);
    assert_eq!(guard.record_attempt(start + Duration::from_secs(1)), Some(2));
    assert_eq!(guard.record_attempt(start + Duration::from_secs(2)), None);

    let later = start + RECONNECT_RATE_WINDOW + Duration::from_secs(2);
    assert_eq!(guard.record_attempt(later), None);
    assert_eq!(guard.attempts_in_window(later), 1);
    assert_eq!(guard.record_attempt(later + Duration::from_secs(1)), Some(2));
}

#[test]
fn still_tripped_while_burst_continues() {
    let mut guard = ReconnectRateGuard::new(2);
    let start = Instant::now();

    // One attempt every 30s keeps six in any 3-minute span.
    let trips: Vec<_> = (0..40)
        .filter_map(|i| guard.record_attempt(start + Duration::from_secs(30 * i)))
        .collect();
    assert_eq!(trips, vec![3]);
}
