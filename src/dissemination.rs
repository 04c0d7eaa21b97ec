//! Dissemination barrier.
//!
//! Each arrival runs `ceil(log2 n)` rounds of pairwise flag exchange: in
//! round `k` thread `i` signals thread `(i + 2^k) mod n` and waits to be
//! signaled in turn. After the last round every thread has transitively heard
//! from every other thread. There is no central counter, so no location is
//! touched by more than two threads per round.

use crossbeam_utils::CachePadded;

use crate::bits::log2_ceil;
use crate::primitives::{AtomicUsize, Backoff, Ordering};

/// One participant's flag block: the per-round partners and, for each of the
/// two parity channels, the flag each partner writes into.
struct ThreadFlags {
    /// `partners[k] = (tid + 2^k) mod nthr`; both parity channels use the
    /// same partner set.
    partners: Vec<usize>,
    tflag: [Vec<AtomicUsize>; 2],
}

/// A log-round information-exchange barrier.
pub struct DisseminationBarrier {
    nodes: Vec<CachePadded<ThreadFlags>>,
    rounds: usize,
    next_tid: AtomicUsize,
}

/// Per-thread arrival state for a [`DisseminationBarrier`].
#[derive(Debug)]
pub struct DisseminationState {
    parity: usize,
    sense: usize,
    tid: usize,
}

impl DisseminationState {
    /// Which of the two flag channels the next arrival will use.
    #[must_use]
    pub fn parity(&self) -> usize {
        self.parity
    }

    /// The sense value the next arrival will publish.
    #[must_use]
    pub fn sense(&self) -> usize {
        self.sense
    }

    /// This participant's identity, in `0..nthr`.
    #[must_use]
    pub fn tid(&self) -> usize {
        self.tid
    }
}

impl DisseminationBarrier {
    /// Builds the flag matrix and partner tables for `nthr` participants.
    ///
    /// # Panics
    ///
    /// Panics if `nthr` is zero.
    #[must_use]
    pub fn new(nthr: usize) -> Self {
        assert!(nthr > 0, "a barrier needs at least one participant");

        let rounds = log2_ceil(nthr) as usize;
        let nodes = (0..nthr)
            .map(|i| {
                let partners = (0..rounds)
                    .map(|k| {
                        let offset = 1usize << k;
                        if nthr.is_power_of_two() {
                            (i + offset) & (nthr - 1)
                        } else {
                            (i + offset) % nthr
                        }
                    })
                    .collect();
                CachePadded::new(ThreadFlags {
                    partners,
                    tflag: [zeroed_flags(rounds), zeroed_flags(rounds)],
                })
            })
            .collect();

        #[cfg(feature = "tracing")]
        tracing::trace!(nthr, rounds, "built dissemination topology");

        Self {
            nodes,
            rounds,
            next_tid: AtomicUsize::new(0),
        }
    }

    /// Hands out the next participant identity with its initial parity and
    /// sense. Must be called exactly once per participating thread.
    #[must_use]
    pub fn state_init(&self) -> DisseminationState {
        let tid = self.next_tid.fetch_add(1, Ordering::Relaxed);
        debug_assert!(
            tid < self.nodes.len(),
            "more states initialized than participants"
        );
        DisseminationState {
            parity: 0,
            sense: !0,
            tid,
        }
    }

    /// The number of exchange rounds per arrival, `ceil(log2 nthr)`.
    #[must_use]
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Blocks (spinning) until all participants have arrived.
    pub fn arrive(&self, state: &mut DisseminationState) {
        let me = &self.nodes[state.tid];

        for k in 0..self.rounds {
            // Unblock the current partner, then wait until some other thread
            // unblocks this one.
            self.nodes[me.partners[k]].tflag[state.parity][k].store(state.sense, Ordering::Release);

            let backoff = Backoff::new();
            while me.tflag[state.parity][k].load(Ordering::Acquire) != state.sense {
                backoff.snooze();
            }
        }

        // The two parity channels keep successive arrivals from colliding,
        // and the sense only flips after both have been used, so every flag
        // slot rests a full two-barrier cycle before it is reused. No flag is
        // ever reset.
        if state.parity == 1 {
            state.sense = !state.sense;
        }
        state.parity = 1 - state.parity;
    }
}

fn zeroed_flags(rounds: usize) -> Vec<AtomicUsize> {
    (0..rounds).map(|_| AtomicUsize::new(0)).collect()
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::thread;

    #[test]
    fn test_round_counts() {
        assert_eq!(DisseminationBarrier::new(1).rounds(), 0);
        assert_eq!(DisseminationBarrier::new(2).rounds(), 1);
        assert_eq!(DisseminationBarrier::new(7).rounds(), 3);
        assert_eq!(DisseminationBarrier::new(8).rounds(), 3);
        assert_eq!(DisseminationBarrier::new(9).rounds(), 4);
    }

    #[test]
    fn test_partners_of_thread_zero_power_of_two() {
        let barrier = DisseminationBarrier::new(8);
        assert_eq!(barrier.nodes[0].partners, vec![1, 2, 4]);
        assert_eq!(barrier.nodes[5].partners, vec![6, 7, 1]);
    }

    #[test]
    fn test_state_evolution_over_two_arrivals() {
        // With one participant the rounds are empty, leaving only the
        // parity/sense rotation: flip on the parity-1 exit.
        let barrier = DisseminationBarrier::new(1);
        let mut state = barrier.state_init();
        assert_eq!((state.parity(), state.sense()), (0, !0));

        barrier.arrive(&mut state);
        assert_eq!((state.parity(), state.sense()), (1, !0));

        barrier.arrive(&mut state);
        assert_eq!((state.parity(), state.sense()), (0, 0));
    }

    #[test]
    fn test_tid_assignment_is_dense() {
        let barrier = DisseminationBarrier::new(3);
        let mut tids: Vec<_> = (0..3).map(|_| barrier.state_init().tid()).collect();
        tids.sort_unstable();
        assert_eq!(tids, vec![0, 1, 2]);
    }

    #[test]
    fn test_eight_threads_rendezvous() {
        let barrier = DisseminationBarrier::new(8);
        let barrier = &barrier;

        let states: Vec<(usize, usize)> = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(move || {
                        let mut state = barrier.state_init();
                        barrier.arrive(&mut state);
                        barrier.arrive(&mut state);
                        (state.parity(), state.sense())
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for (parity, sense) in states {
            assert_eq!((parity, sense), (0, 0));
        }
    }

    proptest! {
        #[test]
        fn partner_matches_modular_formula(nthr in 1usize..64) {
            let barrier = DisseminationBarrier::new(nthr);
            for i in 0..nthr {
                for k in 0..barrier.rounds() {
                    prop_assert_eq!(
                        barrier.nodes[i].partners[k],
                        (i + (1 << k)) % nthr
                    );
                }
            }
        }
    }
}
