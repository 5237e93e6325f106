//! Request/response correlation with timeout-based cancellation (spec.md
//! §4.3, §8 scenario 6).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::actor::Outbox;
use crate::address::Address;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Correlates a request with the reply that answers it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RequestId(u64);

impl RequestId {
    pub(crate) fn next() -> Self {
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Wraps an outgoing request payload with the reply address and id the
/// receiver needs to answer it via [`Reply`].
pub struct Request<M> {
    pub request_id: RequestId,
    pub reply_to: Address,
    pub payload: M,
}

/// Wraps a reply payload with the id of the request it answers.
pub struct Reply<R> {
    pub request_id: RequestId,
    pub value: R,
}

pub(crate) struct PendingRequest<S> {
    pub deadline: tokio::time::Instant,
    pub on_timeout: Box<dyn FnOnce(&mut S, &Outbox)>,
}

/// Tracks in-flight requests for one actor and raises a timeout callback
/// once a deadline passes without the matching [`Reply`] ever completing
/// it, mirroring the original source's `request_t::timeout` bookkeeping.
#[derive(Default)]
pub(crate) struct RequestTable<S> {
    pending: HashMap<RequestId, PendingRequest<S>>,
}

impl<S> RequestTable<S> {
    pub fn start(&mut self, timeout: Duration, on_timeout: impl FnOnce(&mut S, &Outbox) + 'static) -> RequestId {
        let id = RequestId::next();
        self.pending.insert(id, PendingRequest { deadline: tokio::time::Instant::now() + timeout, on_timeout: Box::new(on_timeout) });
        id
    }

    pub fn complete(&mut self, id: RequestId) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Removes and returns the callbacks for every request whose deadline
    /// has passed by `now`.
    pub fn expire(&mut self, now: tokio::time::Instant) -> Vec<Box<dyn FnOnce(&mut S, &Outbox)>> {
        let expired_ids: Vec<RequestId> = self.pending.iter().filter(|(_, p)| p.deadline <= now).map(|(id, _)| *id).collect();
        expired_ids.into_iter().filter_map(|id| self.pending.remove(&id).map(|p| p.on_timeout)).collect()
    }

    pub fn next_deadline(&self) -> Option<tokio::time::Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
