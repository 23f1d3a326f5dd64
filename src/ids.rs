//! process-wide unique member/archive id allocation
//!
//! Ported from the batch allocator in the original Python implementation: a
//! shared atomic counter is refilled in batches so that hot per-member
//! registration loops don't pay for an atomic fetch-add on every call.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

const BATCH_SIZE: u64 = 1000;

static GLOBAL_COUNTER: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static LOCAL_BATCH: Cell<(u64, u64)> = const { Cell::new((0, 0)) };
}

/// returns the next process-unique id, reserving a fresh batch from the
/// shared counter when the thread-local batch is exhausted
pub fn next_id() -> u64 {
    LOCAL_BATCH.with(|cell| {
        let (mut next, mut end) = cell.get();
        if next >= end {
            next = GLOBAL_COUNTER.fetch_add(BATCH_SIZE, Ordering::Relaxed);
            end = next + BATCH_SIZE;
        }
        cell.set((next + 1, end));
        next
    })
}

/// a simple per-archive counter, handed out fresh to each opened archive
#[derive(Debug, Default)]
pub struct ArchiveIdCounter(AtomicU64);

impl ArchiveIdCounter {
    pub fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn ids_are_unique_within_a_thread() {
        let mut seen = HashSet::new();
        for _ in 0..5000 {
            assert!(seen.insert(next_id()));
        }
    }

    #[test]
    fn ids_are_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(|| (0..2000).map(|_| next_id()).collect::<Vec<_>>()))
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id} across threads");
            }
        }
    }
}
