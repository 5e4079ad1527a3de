//! Property tests for the debounce decision

use std::time::Duration;

use chrono::{DateTime, TimeDelta};
use proptest::prelude::*;
use recocache::coordinator::should_refresh;

proptest! {
    #[test]
    fn forced_requests_always_refresh(
        last_secs in 0i64..4_000_000_000,
        offset_ms in -86_400_000i64..86_400_000,
        debounce_secs in 0u64..86_400,
    ) {
        let last = DateTime::from_timestamp(last_secs, 0).unwrap();
        let now = last + TimeDelta::milliseconds(offset_ms);
        prop_assert!(should_refresh(true, now, last, Duration::from_secs(debounce_secs)));
    }

    #[test]
    fn soft_requests_refresh_only_past_window(
        last_secs in 0i64..4_000_000_000,
        elapsed_ms in -86_400_000i64..86_400_000,
        debounce_secs in 0u64..86_400,
    ) {
        let last = DateTime::from_timestamp(last_secs, 0).unwrap();
        let now = last + TimeDelta::milliseconds(elapsed_ms);
        let expected = elapsed_ms > (debounce_secs as i64) * 1000;
        prop_assert_eq!(should_refresh(false, now, last, Duration::from_secs(debounce_secs)), expected);
    }
}
