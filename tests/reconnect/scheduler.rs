//! Invariants tested:
//! - Quick delay k lies in [initial * (k - 1), initial * k)
//! - The quick phase lasts exactly `quick_max_retries` attempts
//! - Atypical quick delays and every post-quick delay are at least 10s
//! - Truncated exponential delays never exceed the configured cap

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use tidewire_reconnect::{
    ReconnectConfig, ReconnectPhase, ReconnectPolicy, ReconnectScheduler, ATYPICAL_DELAY_FLOOR,
};

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

proptest! {
    #[test]
    fn quick_delays_stay_in_their_slot(
        initial_ms in 1u64..10_000,
        retries in 1u32..10,
        seed in any::<u64>(),
    ) {
        let config = ReconnectConfig::builder()
            .quick_reconnect_initial_delay(ms(initial_ms))
            .quick_reconnect_max_retries(retries)
            .build();
        let mut scheduler = ReconnectScheduler::new(config);
        let mut rng = StdRng::seed_from_u64(seed);

        for k in 1..=u64::from(retries) {
            let delay = scheduler.next_delay(false, &mut rng);
            prop_assert!(delay >= ms(initial_ms * (k - 1)));
            prop_assert!(delay < ms(initial_ms * k));
            prop_assert_eq!(scheduler.context().phase, ReconnectPhase::Quick);
        }

        scheduler.next_delay(false, &mut rng);
        prop_assert_eq!(scheduler.context().phase, ReconnectPhase::PostQuick);
        prop_assert_eq!(scheduler.context().attempt_count, 1);
    }

    #[test]
    fn atypical_quick_delays_are_floored(
        initial_ms in 1u64..5_000,
        seed in any::<u64>(),
    ) {
        let config = ReconnectConfig::builder()
            .quick_reconnect_initial_delay(ms(initial_ms))
            .build();
        let mut scheduler = ReconnectScheduler::new(config);
        let mut rng = StdRng::seed_from_u64(seed);

        for _ in 0..3 {
            prop_assert!(scheduler.next_delay(true, &mut rng) >= ATYPICAL_DELAY_FLOOR);
        }
    }

    #[test]
    fn constant_policy_uses_interval(
        interval_s in 1u64..600,
        seed in any::<u64>(),
    ) {
        let config = ReconnectConfig::builder()
            .quick_reconnect_max_retries(0)
            .policy(ReconnectPolicy::ConstantWindowBackoff)
            .reconnect_time_interval(Duration::from_secs(interval_s))
            .unwrap()
            .build();
        let mut scheduler = ReconnectScheduler::new(config);
        let mut rng = StdRng::seed_from_u64(seed);
        let expected = Duration::from_secs(interval_s).max(ATYPICAL_DELAY_FLOOR);

        for _ in 0..5 {
            prop_assert_eq!(scheduler.next_delay(false, &mut rng), expected);
        }
    }

    #[test]
    fn truncated_exponential_is_bounded(
        interval_s in 1u64..120,
        max_s in 10u64..1_000,
        seed in any::<u64>(),
    ) {
        let max_delay = Duration::from_secs(max_s);
        let config = ReconnectConfig::builder()
            .quick_reconnect_max_retries(0)
            .policy(ReconnectPolicy::TruncatedExponentialBackoff)
            .reconnect_time_interval(Duration::from_secs(interval_s))
            .unwrap()
            .reconnect_max_delay(max_delay)
            .unwrap()
            .build();
        let mut scheduler = ReconnectScheduler::new(config);
        let mut rng = StdRng::seed_from_u64(seed);

        for _ in 0..40 {
            let delay = scheduler.next_delay(false, &mut rng);
            prop_assert!(delay >= ATYPICAL_DELAY_FLOOR);
            prop_assert!(delay <= max_delay);
        }
    }
}
