//! Tree barrier of Mellor-Crummey and Scott.
//!
//! Arrival climbs a static 4-ary tree: each node waits for its subtree's
//! `childnotready` slots to clear, then reports into its parent's slot.
//! Wakeup descends a separate binary tree through `parentsense`. Every thread
//! spins only on words in its own pre-assigned node.

use crossbeam_utils::CachePadded;

use crate::primitives::{AtomicUsize, Backoff, Ordering};

const ARRIVAL_FANOUT: usize = 4;

struct McsNode {
    parentsense: AtomicUsize,
    /// Cleared by arriving children; reset from `havechild` every round so a
    /// node never waits on a child that does not exist.
    childnotready: [AtomicUsize; ARRIVAL_FANOUT],
    havechild: [usize; ARRIVAL_FANOUT],
    /// `(node, slot)` in the 4-ary arrival tree; `None` for the root.
    parent: Option<(usize, usize)>,
    /// Wakeup edges of the binary tree.
    children: [Option<usize>; 2],
}

/// A static-tree barrier with 4-ary arrival and binary wakeup.
pub struct McsBarrier {
    nodes: Vec<CachePadded<McsNode>>,
    next_vpid: AtomicUsize,
}

/// Per-thread arrival state for an [`McsBarrier`].
#[derive(Debug)]
pub struct McsState {
    sense: usize,
    vpid: usize,
}

impl McsState {
    /// The sense value the next arrival will publish.
    #[must_use]
    pub fn sense(&self) -> usize {
        self.sense
    }

    /// This participant's identity, in `0..nthr`.
    #[must_use]
    pub fn vpid(&self) -> usize {
        self.vpid
    }
}

impl McsBarrier {
    /// Wires the arrival and wakeup trees for `nthr` participants.
    ///
    /// Thread `c > 0` reports arrival to node `(c - 1) / 4`, slot
    /// `(c - 1) % 4`; thread `i` wakes threads `2i + 1` and `2i + 2` when
    /// they exist.
    ///
    /// # Panics
    ///
    /// Panics if `nthr` is zero.
    #[must_use]
    pub fn new(nthr: usize) -> Self {
        assert!(nthr > 0, "a barrier needs at least one participant");

        let nodes = (0..nthr)
            .map(|i| {
                let havechild: [usize; ARRIVAL_FANOUT] =
                    core::array::from_fn(|j| if ARRIVAL_FANOUT * i + j + 1 < nthr { !0 } else { 0 });
                let childnotready = core::array::from_fn(|j| AtomicUsize::new(havechild[j]));
                CachePadded::new(McsNode {
                    parentsense: AtomicUsize::new(0),
                    childnotready,
                    havechild,
                    parent: (i > 0).then(|| ((i - 1) / ARRIVAL_FANOUT, (i - 1) % ARRIVAL_FANOUT)),
                    children: [wakeup_child(2 * i + 1, nthr), wakeup_child(2 * i + 2, nthr)],
                })
            })
            .collect();

        #[cfg(feature = "tracing")]
        tracing::trace!(nthr, "built mcs tree");

        Self {
            nodes,
            next_vpid: AtomicUsize::new(0),
        }
    }

    /// Hands out the next participant identity with its initial sense. Must
    /// be called exactly once per participating thread.
    #[must_use]
    pub fn state_init(&self) -> McsState {
        let vpid = self.next_vpid.fetch_add(1, Ordering::Relaxed);
        debug_assert!(
            vpid < self.nodes.len(),
            "more states initialized than participants"
        );
        McsState { sense: !0, vpid }
    }

    /// Blocks (spinning) until all participants have arrived.
    pub fn arrive(&self, state: &mut McsState) {
        let node = &*self.nodes[state.vpid];
        let sense = state.sense;

        // Wait until the whole arrival subtree below this node has quiesced.
        let backoff = Backoff::new();
        while !children_arrived(&node.childnotready) {
            backoff.snooze();
        }

        for (slot, &mask) in node.havechild.iter().enumerate() {
            node.childnotready[slot].store(mask, Ordering::Relaxed);
        }

        if let Some((parent, slot)) = node.parent {
            // Report this subtree's arrival, then wait for the root to
            // declare the round complete.
            self.nodes[parent].childnotready[slot].store(0, Ordering::Release);

            let backoff = Backoff::new();
            while node.parentsense.load(Ordering::Acquire) != sense {
                backoff.snooze();
            }
        }

        for &child in node.children.iter().flatten() {
            self.nodes[child].parentsense.store(sense, Ordering::Release);
        }

        state.sense = !sense;
    }
}

fn wakeup_child(index: usize, nthr: usize) -> Option<usize> {
    (index < nthr).then_some(index)
}

fn children_arrived(slots: &[AtomicUsize; ARRIVAL_FANOUT]) -> bool {
    slots.iter().all(|slot| slot.load(Ordering::Acquire) == 0)
}
