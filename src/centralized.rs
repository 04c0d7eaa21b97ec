//! Centralized sense-reversing barrier.

use crossbeam_utils::CachePadded;

use crate::primitives::{AtomicUsize, Backoff, Ordering};

/// The simplest reusable barrier: one shared arrival counter plus a shared
/// sense word.
///
/// Every arrival performs a fetch-and-add on the same counter, so all
/// participants contend on a single cache line; the tree-shaped barriers in
/// this crate scale better past a handful of threads. The counter and the
/// sense live on separate cache lines so that spinning readers do not slow
/// down the arrival increments.
pub struct CentralizedBarrier {
    value: CachePadded<AtomicUsize>,
    sense: CachePadded<AtomicUsize>,
}

/// Per-thread arrival state for a [`CentralizedBarrier`].
#[derive(Debug)]
pub struct CentralizedState {
    sense: usize,
}

impl CentralizedState {
    /// Creates the initial per-thread state.
    #[must_use]
    pub fn new() -> Self {
        Self { sense: 0 }
    }

    /// The sense this thread expects the barrier to flip to next; complemented
    /// on every arrival.
    #[must_use]
    pub fn sense(&self) -> usize {
        self.sense
    }
}

impl Default for CentralizedState {
    fn default() -> Self {
        Self::new()
    }
}

impl CentralizedBarrier {
    /// Creates a new barrier. The cohort size is supplied on each arrival and
    /// must stay consistent across all participants of a round.
    #[must_use]
    pub fn new() -> Self {
        Self {
            value: CachePadded::new(AtomicUsize::new(0)),
            sense: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Blocks (spinning) until `n_threads` threads have arrived.
    ///
    /// The last thread to arrive resets the counter and publishes the flipped
    /// sense, releasing everyone; the release/acquire pairing on the sense
    /// word makes every participant's pre-arrival writes visible to every
    /// other participant afterwards.
    pub fn arrive(&self, state: &mut CentralizedState, n_threads: usize) {
        debug_assert!(n_threads > 0);

        state.sense = !state.sense;
        let sense = state.sense;

        if self.value.fetch_add(1, Ordering::AcqRel) == n_threads - 1 {
            // The counter reset must be published no later than the sense
            // flip; the release store below orders both.
            self.value.store(0, Ordering::Relaxed);
            self.sense.store(sense, Ordering::Release);
            return;
        }

        let backoff = Backoff::new();
        while self.sense.load(Ordering::Acquire) != sense {
            backoff.snooze();
        }
    }
}

impl Default for CentralizedBarrier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_single_thread() {
        let barrier = CentralizedBarrier::new();
        let mut state = CentralizedState::new();

        barrier.arrive(&mut state, 1);
        barrier.arrive(&mut state, 1);

        assert_eq!(state.sense(), 0);
        assert_eq!(barrier.value.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_four_threads_one_round() {
        let barrier = CentralizedBarrier::new();
        let barrier = &barrier;

        let senses: Vec<usize> = thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(move || {
                        let mut state = CentralizedState::new();
                        barrier.arrive(&mut state, 4);
                        state.sense()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(barrier.value.load(Ordering::Relaxed), 0);
        assert_eq!(barrier.sense.load(Ordering::Relaxed), !0);
        assert!(senses.iter().all(|&s| s == !0));
    }

    #[test]
    fn test_counter_quiescent_after_many_rounds() {
        let barrier = CentralizedBarrier::new();
        let barrier = &barrier;

        thread::scope(|s| {
            for _ in 0..3 {
                s.spawn(move || {
                    let mut state = CentralizedState::new();
                    for _ in 0..500 {
                        barrier.arrive(&mut state, 3);
                    }
                });
            }
        });

        assert_eq!(barrier.value.load(Ordering::Relaxed), 0);
    }
}
