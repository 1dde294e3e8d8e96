//! Hybrid Clock Module
//!
//! Version stamps for last-writer-wins ordering.

use std::sync::atomic::{AtomicU64, Ordering};

use super::member::MemberId;
use crate::record::{current_timestamp_ms, Stamp};

/// Hybrid logical clock producing version stamps for one member.
///
/// Versions follow wall-clock milliseconds but never repeat or go
/// backwards, so two writes submitted by the same member are always
/// ordered by submission.
#[derive(Debug)]
pub struct HybridClock {
    member: MemberId,
    last: AtomicU64,
}

impl HybridClock {
    pub fn new(member: MemberId) -> Self {
        Self {
            member,
            last: AtomicU64::new(0),
        }
    }

    /// Returns the next stamp for a local write.
    pub fn tick(&self) -> Stamp {
        let now = current_timestamp_ms();
        let mut current = self.last.load(Ordering::SeqCst);
        loop {
            let next = now.max(current + 1);
            match self
                .last
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return Stamp::new(next, self.member.as_str()),
                Err(observed) => current = observed,
            }
        }
    }

    /// Advances the clock past a version seen from another member.
    pub fn observe(&self, version: u64) {
        self.last.fetch_max(version, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_ticks_strictly_increase() {
        let clock = HybridClock::new(MemberId::new("n1"));
        let mut previous = clock.tick();
        for _ in 0..1000 {
            let next = clock.tick();
            assert!(next > previous);
            previous = next;
        }
        assert_eq!(previous.origin, "n1");
    }

    #[test]
    fn test_observe_moves_clock_forward() {
        let clock = HybridClock::new(MemberId::new("n1"));
        let future = current_timestamp_ms() + 60_000;
        clock.observe(future);
        assert!(clock.tick().version > future);
    }

    #[test]
    fn test_concurrent_ticks_are_unique() {
        let clock = Arc::new(HybridClock::new(MemberId::new("n1")));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let clock = clock.clone();
                std::thread::spawn(move || (0..250).map(|_| clock.tick().version).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        let total = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), total);
    }
}
