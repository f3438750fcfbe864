// =============================================================================
// Per-category rate limiting
// =============================================================================
//
// Bybit enforces independent limits per market category. The source tracked
// Binance's `X-MBX-USED-WEIGHT-1M` header; Bybit does not expose an
// equivalent header worth parsing, so this is a simple token-bucket pacer:
// callers ask `should_pace()` before firing a request and get back how long
// to sleep to stay under the configured request rate.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

pub struct RateLimitTracker {
    /// Minimum gap between requests, in milliseconds.
    min_interval_ms: u64,
    last_request_ms: AtomicI64,
    request_count: AtomicU64,
    rejected_count: AtomicU64,
}

impl RateLimitTracker {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            min_interval_ms,
            last_request_ms: AtomicI64::new(0),
            request_count: AtomicU64::new(0),
            rejected_count: AtomicU64::new(0),
        }
    }

    /// How long the caller should sleep before issuing the next request to
    /// respect the configured pacing. Updates the internal clock as a side
    /// effect so back-to-back calls accumulate correctly.
    pub fn pace(&self, now_ms: i64) -> Duration {
        let last = self.last_request_ms.swap(now_ms, Ordering::SeqCst);
        let elapsed = (now_ms - last).max(0) as u64;
        self.request_count.fetch_add(1, Ordering::Relaxed);
        if elapsed < self.min_interval_ms {
            Duration::from_millis(self.min_interval_ms - elapsed)
        } else {
            Duration::from_millis(0)
        }
    }

    pub fn record_rejection(&self) {
        self.rejected_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        RateLimitSnapshot {
            request_count: self.request_count.load(Ordering::Relaxed),
            rejected_count: self.rejected_count.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitSnapshot {
    pub request_count: u64,
    pub rejected_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_request_never_waits() {
        let tracker = RateLimitTracker::new(300);
        assert_eq!(tracker.pace(0), Duration::from_millis(300));
    }

    #[test]
    fn immediate_second_request_is_paced() {
        let tracker = RateLimitTracker::new(300);
        tracker.pace(1000);
        let wait = tracker.pace(1100);
        assert_eq!(wait, Duration::from_millis(200));
    }

    #[test]
    fn request_spaced_out_enough_does_not_wait() {
        let tracker = RateLimitTracker::new(300);
        tracker.pace(1000);
        let wait = tracker.pace(1500);
        assert_eq!(wait, Duration::from_millis(0));
    }

    #[test]
    fn snapshot_counts_requests_and_rejections() {
        let tracker = RateLimitTracker::new(100);
        tracker.pace(0);
        tracker.pace(200);
        tracker.record_rejection();
        let snap = tracker.snapshot();
        assert_eq!(snap.request_count, 2);
        assert_eq!(snap.rejected_count, 1);
    }
}
