//! In-crate test doubles: small, reusable helpers for driving a system
//! synchronously in unit tests without needing a Tokio runtime.

use std::cell::RefCell;
use std::rc::Rc;

use crate::actor::Outbox;
use crate::error::ErrorChain;
use crate::system::System;

/// Builds a [`System`] that appends every escalated error to a shared
/// `Vec` instead of logging it, so tests can assert on what reached the
/// top.
pub fn recording_system() -> (System, Rc<RefCell<Vec<ErrorChain>>>) {
    let errors = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&errors);
    let system = System::new(move |chain: &ErrorChain| sink.borrow_mut().push(chain.clone()));
    (system, errors)
}

/// Drains `system`'s localities up to `rounds` times, a few envelopes'
/// worth of hops per round. Most test scenarios converge well before the
/// default round count; callers chasing multi-hop cascades can pass more.
pub fn pump(system: &System, rounds: usize) {
    for _ in 0..rounds {
        if system.do_process() == 0 {
            break;
        }
    }
}

/// A handler body that just appends every message of type `M` it sees to
/// a shared `Vec`, for asserting on arrival order and count (spec.md §8
/// scenario 8).
pub fn recorder<M: Clone + 'static>() -> (Rc<RefCell<Vec<M>>>, impl FnMut(&mut (), &M, &Outbox) + 'static) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    (log, move |_state: &mut (), msg: &M, _outbox: &Outbox| sink.borrow_mut().push(msg.clone()))
}
