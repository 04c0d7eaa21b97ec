//! # `lockstep` - Spinning Rendezvous Barriers
//!
//! A toolkit of reusable barriers for shared-memory parallel programs. A
//! barrier coordinates a set of participant threads so that none proceeds
//! past it until all have arrived, round after round, with no reset step in
//! between.
//!
//! ## Key Features
//!
//! - **Five algorithms**: centralized counter, combining tree, dissemination,
//!   tournament, and the MCS static tree - pick the topology that matches
//!   your cohort size and contention profile
//! - **Sense reversal throughout**: every barrier is reusable indefinitely
//!   without reinitialization
//! - **Spin-only waiting**: no futexes, no parking; waits are bounded spins
//!   with an escalating backoff hint
//! - **Cache-conscious layout**: per-thread slots are padded so waiters never
//!   false-share the lines their peers spin on
//!
//! ## Choosing an algorithm
//!
//! The centralized barrier is the simplest and fine for a handful of threads;
//! all arrivals hit one counter. The dissemination, tournament, and MCS
//! barriers spread the traffic over `O(log n)` rounds of point-to-point
//! flags and scale much further; they assign each participant a stable
//! identity at state-init time. The combining tree sits in between and is
//! the only one that accepts new thread groups while in use.
//!
//! ## Example
//!
//! ```rust
//! use lockstep::{CentralizedBarrier, CentralizedState};
//! use std::thread;
//!
//! let barrier = CentralizedBarrier::new();
//!
//! thread::scope(|s| {
//!     for _ in 0..4 {
//!         s.spawn(|| {
//!             let mut state = CentralizedState::new();
//!             // ... phase one ...
//!             barrier.arrive(&mut state, 4);
//!             // every thread has finished phase one
//!         });
//!     }
//! });
//! ```
//!
//! ## Contract
//!
//! On exit from any barrier, a thread observes all writes made by every
//! participant before that participant's own arrival. The cohort size fixed
//! at construction (or passed to a centralized arrival) must match the
//! number of threads that actually arrive, and each per-thread state must be
//! initialized exactly once and kept by one thread; violations are not
//! detected and end in deadlock.

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod bits;
mod primitives;

pub mod centralized;
pub mod combining;
pub mod dissemination;
pub mod mcs;
pub mod spinlock;
pub mod tournament;

pub use centralized::{CentralizedBarrier, CentralizedState};
pub use combining::{CombiningBarrier, CombiningGroup, CombiningState};
pub use dissemination::{DisseminationBarrier, DisseminationState};
pub use mcs::{McsBarrier, McsState};
pub use spinlock::SpinLock;
pub use tournament::{Role, TournamentBarrier, TournamentState};

// Compile-time layout checks.
const _: () = {
    use core::mem;

    // Roles are a plain byte-sized discriminant.
    assert!(mem::size_of::<Role>() == 1);

    // Per-thread states stay word-sized: they are meant to live on the
    // participant's own stack, not behind a pointer.
    assert!(mem::size_of::<CentralizedState>() == mem::size_of::<usize>());
    assert!(mem::size_of::<McsState>() == 2 * mem::size_of::<usize>());
    assert!(mem::size_of::<DisseminationState>() == 3 * mem::size_of::<usize>());

    // Padded slots must actually separate cache lines.
    assert!(mem::align_of::<crossbeam_utils::CachePadded<u8>>() >= 16);
};
