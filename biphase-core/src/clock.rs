//! Monotonic wall-clock approximation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// A millisecond clock that never goes backwards.
///
/// The wall clock is sampled once and subsequent readings advance it by the
/// elapsed monotonic time, so NTP adjustments and manual clock changes
/// cannot make timestamps regress. Readings are only used for
/// observability (acquisition and release dates); they are never used for
/// timeouts or for ordering XA events.
#[derive(Debug)]
pub struct MonotonicClock;

struct Anchor {
    epoch_millis: u64,
    instant: Instant,
}

impl MonotonicClock {
    /// Returns the current time in milliseconds since the Unix epoch.
    ///
    /// Successive calls never return a smaller value, across all threads.
    pub fn now_millis() -> u64 {
        static ANCHOR: OnceLock<Anchor> = OnceLock::new();
        static LAST: AtomicU64 = AtomicU64::new(0);

        let anchor = ANCHOR.get_or_init(|| Anchor {
            epoch_millis: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
            instant: Instant::now(),
        });

        let now = anchor.epoch_millis + anchor.instant.elapsed().as_millis() as u64;
        let previous = LAST.fetch_max(now, Ordering::AcqRel);
        previous.max(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_nonzero() {
        assert!(MonotonicClock::now_millis() > 0);
    }

    #[test]
    fn test_never_goes_backwards() {
        let mut previous = MonotonicClock::now_millis();
        for _ in 0..10_000 {
            let now = MonotonicClock::now_millis();
            assert!(now >= previous);
            previous = now;
        }
    }

    #[test]
    fn test_never_goes_backwards_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                std::thread::spawn(|| {
                    let mut previous = MonotonicClock::now_millis();
                    for _ in 0..10_000 {
                        let now = MonotonicClock::now_millis();
                        assert!(now >= previous);
                        previous = now;
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_tracks_elapsed_time() {
        let before = MonotonicClock::now_millis();
        std::thread::sleep(std::time::Duration::from_millis(20));
        let after = MonotonicClock::now_millis();
        assert!(after >= before + 15);
    }
}
