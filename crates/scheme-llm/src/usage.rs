//! Shared token-usage accumulator

use scheme_domain::UsageSnapshot;
use std::sync::atomic::{AtomicU64, Ordering};

/// Accumulate-only usage counters, safe for concurrent increments
///
/// Counters are monotonic; readers take a [`UsageSnapshot`] and compute
/// deltas instead of resetting.
#[derive(Debug, Default)]
pub struct UsageStats {
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    total_tokens: AtomicU64,
    call_count: AtomicU64,
}

impl UsageStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed call
    pub fn record(&self, prompt_tokens: u64, completion_tokens: u64, total_tokens: u64) {
        self.prompt_tokens.fetch_add(prompt_tokens, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion_tokens, Ordering::Relaxed);
        self.total_tokens.fetch_add(total_tokens, Ordering::Relaxed);
        self.call_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Current totals
    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
            total_tokens: self.total_tokens.load(Ordering::Relaxed),
            call_count: self.call_count.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_record_accumulates() {
        let stats = UsageStats::new();
        stats.record(10, 5, 15);
        stats.record(1, 1, 2);

        let snap = stats.snapshot();
        assert_eq!(snap.prompt_tokens, 11);
        assert_eq!(snap.completion_tokens, 6);
        assert_eq!(snap.total_tokens, 17);
        assert_eq!(snap.call_count, 2);
    }

    #[test]
    fn test_concurrent_increments() {
        let stats = Arc::new(UsageStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record(1, 2, 3);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snap = stats.snapshot();
        assert_eq!(snap.call_count, 8000);
        assert_eq!(snap.total_tokens, 24000);
    }
}
