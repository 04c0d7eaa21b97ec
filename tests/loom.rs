//! Model-checked executions of the centralized protocol.
//!
//! Build with `RUSTFLAGS="--cfg loom" cargo test --test loom`; the crate's
//! primitives module then swaps in loom's atomics, and every spin iteration
//! becomes a yield to the model scheduler.

#![cfg(loom)]

use std::sync::Arc;

use lockstep::{CentralizedBarrier, CentralizedState};
use loom::sync::atomic::{AtomicUsize, Ordering};
use loom::thread;

#[test]
fn centralized_publishes_pre_arrival_writes() {
    loom::model(|| {
        let barrier = Arc::new(CentralizedBarrier::new());
        let data = Arc::new(AtomicUsize::new(0));

        let handle = {
            let barrier = Arc::clone(&barrier);
            let data = Arc::clone(&data);
            thread::spawn(move || {
                data.store(7, Ordering::Relaxed);
                let mut state = CentralizedState::new();
                barrier.arrive(&mut state, 2);
            })
        };

        let mut state = CentralizedState::new();
        barrier.arrive(&mut state, 2);
        assert_eq!(data.load(Ordering::Relaxed), 7);

        handle.join().unwrap();
    });
}

#[test]
fn centralized_reusable_across_rounds() {
    loom::model(|| {
        let barrier = Arc::new(CentralizedBarrier::new());

        let handle = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut state = CentralizedState::new();
                barrier.arrive(&mut state, 2);
                barrier.arrive(&mut state, 2);
            })
        };

        let mut state = CentralizedState::new();
        barrier.arrive(&mut state, 2);
        barrier.arrive(&mut state, 2);

        handle.join().unwrap();
    });
}
