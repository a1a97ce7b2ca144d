//! Distributed counter synchronization.
//!
//! When the agent population is partitioned across ranks, every rank must see
//! globally consistent location/link counters before making movement
//! decisions. The whole protocol is one summing reduction per step over a
//! flat counter vector; ranks own their agents exclusively, so nothing else
//! is shared.

use std::sync::{Arc, Barrier, Mutex};

/// Narrow synchronization interface injected into the ecosystem.
///
/// `reduce_sum` is a hard barrier: it returns the element-wise sum of every
/// rank's `local` vector and does not return until all ranks have
/// contributed. All ranks must present identically ordered vectors, which
/// holds as long as they build identical topologies.
pub trait CounterSync: Send + Sync {
    fn rank(&self) -> usize {
        0
    }

    fn num_ranks(&self) -> usize {
        1
    }

    fn reduce_sum(&self, local: &[i64]) -> Vec<i64>;
}

/// Single-rank mode: the local view is the global view.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSync;

impl CounterSync for NoopSync {
    fn reduce_sum(&self, local: &[i64]) -> Vec<i64> {
        local.to_vec()
    }
}

struct ReduceState {
    barrier: Barrier,
    slots: Mutex<Vec<Vec<i64>>>,
}

/// In-process multi-rank synchronizer: one sequential worker thread per rank,
/// blocking on a shared barrier at the reduction point.
pub struct ThreadBarrierSync {
    rank: usize,
    num_ranks: usize,
    state: Arc<ReduceState>,
}

impl ThreadBarrierSync {
    /// Create one handle per rank. Each handle moves onto its rank's thread.
    pub fn create(num_ranks: usize) -> Vec<Self> {
        assert!(num_ranks > 0, "at least one rank required");
        let state = Arc::new(ReduceState {
            barrier: Barrier::new(num_ranks),
            slots: Mutex::new(vec![Vec::new(); num_ranks]),
        });
        (0..num_ranks)
            .map(|rank| Self {
                rank,
                num_ranks,
                state: Arc::clone(&state),
            })
            .collect()
    }
}

impl CounterSync for ThreadBarrierSync {
    fn rank(&self) -> usize {
        self.rank
    }

    fn num_ranks(&self) -> usize {
        self.num_ranks
    }

    fn reduce_sum(&self, local: &[i64]) -> Vec<i64> {
        {
            let mut slots = self
                .state
                .slots
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            slots[self.rank] = local.to_vec();
        }

        // Every rank has published its partial counters past this point.
        self.state.barrier.wait();

        let sum = {
            let slots = self
                .state
                .slots
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let mut sum = vec![0i64; local.len()];
            for slot in slots.iter() {
                debug_assert_eq!(slot.len(), local.len(), "counter vectors must line up");
                for (acc, v) in sum.iter_mut().zip(slot) {
                    *acc += v;
                }
            }
            sum
        };

        // Second barrier keeps a fast rank from overwriting its slot for the
        // next step while a slow rank is still summing this one.
        self.state.barrier.wait();
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn noop_sync_is_identity() {
        let sync = NoopSync;
        assert_eq!(sync.reduce_sum(&[1, 2, 3]), vec![1, 2, 3]);
        assert_eq!(sync.num_ranks(), 1);
        assert_eq!(sync.rank(), 0);
    }

    #[test]
    fn barrier_sync_sums_across_ranks() {
        let handles: Vec<_> = ThreadBarrierSync::create(3)
            .into_iter()
            .map(|sync| {
                thread::spawn(move || {
                    let rank = sync.rank() as i64;
                    sync.reduce_sum(&[rank, 10 * rank])
                })
            })
            .collect();
        for handle in handles {
            let sum = handle.join().unwrap();
            assert_eq!(sum, vec![3, 30]);
        }
    }

    #[test]
    fn barrier_sync_survives_repeated_rounds() {
        let handles: Vec<_> = ThreadBarrierSync::create(2)
            .into_iter()
            .map(|sync| {
                thread::spawn(move || {
                    let mut results = Vec::new();
                    for round in 0..10i64 {
                        results.push(sync.reduce_sum(&[round, sync.rank() as i64]));
                    }
                    results
                })
            })
            .collect();
        for handle in handles {
            let results = handle.join().unwrap();
            for (round, sum) in results.into_iter().enumerate() {
                assert_eq!(sum, vec![2 * round as i64, 1]);
            }
        }
    }
}
