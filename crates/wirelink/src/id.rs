//! Correlation id allocation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Default ceiling for allocated ids.
pub const DEFAULT_ID_CEILING: u64 = i32::MAX as u64;

/// Allocates correlation ids for outgoing calls.
///
/// Emitted ids are always in `[1, ceiling]`; 0 is reserved as "not a call
/// id". The increment and the wraparound back to 1 happen in one atomic
/// step, so concurrent callers cannot observe a duplicate id at the
/// ceiling boundary.
#[derive(Debug)]
pub struct IdAllocator {
    counter: AtomicU64,
    ceiling: u64,
}

impl IdAllocator {
    pub fn new(ceiling: u64) -> Self {
        assert!(ceiling >= 1, "id ceiling must be at least 1");
        Self {
            counter: AtomicU64::new(0),
            ceiling,
        }
    }

    /// Get the next id.
    pub fn next(&self) -> u64 {
        let mut current = self.counter.load(Ordering::Relaxed);
        loop {
            let next = if current >= self.ceiling { 1 } else { current + 1 };
            match self.counter.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(observed) => current = observed,
            }
        }
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_ID_CEILING)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn ids_stay_in_range_and_wrap_to_one() {
        let ids = IdAllocator::new(5);
        let emitted: Vec<u64> = (0..12).map(|_| ids.next()).collect();
        assert_eq!(emitted, vec![1, 2, 3, 4, 5, 1, 2, 3, 4, 5, 1, 2]);
        assert!(emitted.iter().all(|&id| id >= 1 && id <= 5));
    }

    #[test]
    fn never_emits_zero() {
        let ids = IdAllocator::new(1);
        for _ in 0..10 {
            assert_eq!(ids.next(), 1);
        }
    }

    #[test]
    fn concurrent_allocation_is_duplicate_free_across_wraparound() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 1000;

        // Ceiling large enough to hold one full batch, small enough that the
        // batch crosses the wrap boundary after the warm-up below.
        let ids = Arc::new(IdAllocator::new((THREADS * PER_THREAD) as u64));

        // Park the counter just short of the ceiling.
        for _ in 0..(THREADS * PER_THREAD - 100) {
            ids.next();
        }

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || {
                    (0..PER_THREAD).map(|_| ids.next()).collect::<Vec<u64>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(id >= 1 && id <= ids.ceiling());
                assert!(seen.insert(id), "duplicate id {id} emitted");
            }
        }
        assert_eq!(seen.len(), THREADS * PER_THREAD);
    }
}
