//! Software combining-tree barrier with online group registration.
//!
//! Threads join the barrier in *groups*. Arrivals combine within each group:
//! the last thread to reach a group carries a single combined arrival up to
//! the parent group, so contention stays local to each tree node instead of
//! piling onto one counter. New groups can be registered while the barrier is
//! in use; the tree only ever grows.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::primitives::{AtomicUsize, Backoff, Ordering};
use crate::spinlock::SpinLock;

struct Group {
    /// Arrivals expected at this group per round: directly registered threads
    /// plus one per child group.
    k: AtomicUsize,
    count: AtomicUsize,
    sense: AtomicUsize,
    parent: Option<Arc<Group>>,
}

impl Group {
    fn new(k: usize, parent: Option<Arc<Group>>) -> Arc<Self> {
        Arc::new(Self {
            k: AtomicUsize::new(k),
            count: AtomicUsize::new(0),
            sense: AtomicUsize::new(0),
            parent,
        })
    }
}

/// A node of the growth tree. Child links are only read and written while the
/// growth lock is held; arrivals never touch them.
struct Node {
    group: Arc<Group>,
    children: [Option<usize>; 2],
}

/// Handle to a group registered with a [`CombiningBarrier`].
///
/// Every thread of the group arrives through a clone of this handle together
/// with its own [`CombiningState`].
#[derive(Clone)]
pub struct CombiningGroup {
    inner: Arc<Group>,
}

/// Per-thread arrival state for a [`CombiningBarrier`].
#[derive(Debug)]
pub struct CombiningState {
    sense: usize,
}

impl CombiningState {
    /// Creates the initial per-thread state.
    #[must_use]
    pub fn new() -> Self {
        Self { sense: !0 }
    }

    /// The sense this thread expects its group to flip to next.
    #[must_use]
    pub fn sense(&self) -> usize {
        self.sense
    }
}

impl Default for CombiningState {
    fn default() -> Self {
        Self::new()
    }
}

/// A barrier that aggregates arrivals over a dynamically grown binary tree of
/// groups.
pub struct CombiningBarrier {
    /// Index 0 is the root group. The lock serializes growth; runtime arrival
    /// is lock-free.
    tree: SpinLock<Vec<Node>>,
}

impl CombiningBarrier {
    /// Creates a barrier whose tree holds only the root group.
    ///
    /// The root expects no direct arrivals until groups are registered under
    /// it.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: SpinLock::new(vec![Node {
                group: Group::new(0, None),
                children: [None, None],
            }]),
        }
    }

    /// Registers a new group of `nthr` threads, growing the tree.
    ///
    /// The group is installed at the first free child slot found by a
    /// level-order scan from the root (left slot before right), and the
    /// parent's expected-arrival count goes up by one: the whole group funnels
    /// exactly one combined arrival into its parent per round.
    ///
    /// # Panics
    ///
    /// Panics if `nthr` is zero.
    pub fn register_group(&self, nthr: usize) -> CombiningGroup {
        assert!(nthr > 0, "a group must contain at least one thread");

        let mut tree = self.tree.lock();
        let (parent_idx, slot) = free_slot(&tree);

        let parent = Arc::clone(&tree[parent_idx].group);
        let group = Group::new(nthr, Some(Arc::clone(&parent)));
        parent.k.fetch_add(1, Ordering::Relaxed);

        let child_idx = tree.len();
        tree.push(Node {
            group: Arc::clone(&group),
            children: [None, None],
        });
        tree[parent_idx].children[slot] = Some(child_idx);

        #[cfg(feature = "tracing")]
        tracing::trace!(nthr, parent = parent_idx, slot, "registered combining group");

        CombiningGroup { inner: group }
    }

    /// Blocks (spinning) until every thread registered anywhere in the tree
    /// has arrived.
    pub fn arrive(&self, group: &CombiningGroup, state: &mut CombiningState) {
        ascend(&group.inner, state.sense);
        state.sense = !state.sense;
    }
}

impl Default for CombiningBarrier {
    fn default() -> Self {
        Self::new()
    }
}

/// Level-order scan for the first node with an open child slot. A binary tree
/// always has one, and full nodes enqueue both children, so the queue cannot
/// run dry before a slot is found.
fn free_slot(tree: &[Node]) -> (usize, usize) {
    let mut queue = VecDeque::from([0usize]);
    while let Some(idx) = queue.pop_front() {
        if let Some(slot) = tree[idx].children.iter().position(Option::is_none) {
            return (idx, slot);
        }
        queue.extend(tree[idx].children.iter().flatten().copied());
    }
    unreachable!("level-order scan exhausted a tree with no open slot");
}

/// One climb step. The thread that completes a group recurses into the
/// parent; once the whole tree has completed it reinitializes the group's
/// count and flips the group sense on the way back down, releasing the
/// threads parked there. Groups off the winning path are left untouched.
fn ascend(group: &Group, sense: usize) {
    if group.count.fetch_add(1, Ordering::AcqRel) == group.k.load(Ordering::Relaxed) - 1 {
        if let Some(parent) = &group.parent {
            ascend(parent, sense);
        }
        // The count reset must be published no later than the sense flip, or
        // an early arrival of the next round could observe a full count.
        group.count.store(0, Ordering::Relaxed);
        let flipped = !group.sense.load(Ordering::Relaxed);
        group.sense.store(flipped, Ordering::Release);
    } else {
        let backoff = Backoff::new();
        while group.sense.load(Ordering::Acquire) != sense {
            backoff.snooze();
        }
    }
}
