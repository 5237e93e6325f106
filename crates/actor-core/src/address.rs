//! Address identity and the non-owning handle back to a locality's queue.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc::UnboundedSender;

use crate::message::Envelope;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of an address, unique for the life of the process.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressId(u64);

impl AddressId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for AddressId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A destination identity bound to the locality queue its owning
/// supervisor drains.
///
/// Addresses are cheap to clone and compare equal iff they carry the same
/// [`AddressId`] — never by comparing the supervisor they route through.
/// The sender half is a non-owning handle: once the owning locality's
/// receiver is dropped, sends simply stop succeeding rather than keeping
/// the supervisor alive or dangling. This is the Rust realization of "the
/// address never keeps the supervisor alive" (see design notes) — a plain
/// channel `Sender` already has that property for free.
#[derive(Clone)]
pub struct Address {
    id: AddressId,
    supervisor_id: AddressId,
    queue: UnboundedSender<Envelope>,
}

impl Address {
    pub(crate) fn new(supervisor_id: AddressId, queue: UnboundedSender<Envelope>) -> Self {
        Self { id: AddressId::next(), supervisor_id, queue }
    }

    pub(crate) fn for_supervisor(id: AddressId, queue: UnboundedSender<Envelope>) -> Self {
        Self { id, supervisor_id: id, queue }
    }

    pub fn id(&self) -> AddressId {
        self.id
    }

    /// Identity of the supervisor whose locality queue owns this address.
    pub fn supervisor_id(&self) -> AddressId {
        self.supervisor_id
    }

    /// Enqueue an envelope destined for this address. Infallible from the
    /// caller's perspective in the sense spec.md §7 describes: failure here
    /// means the destination is gone, which is reported through tracing and
    /// escalation, never as a `Result` the call site must handle inline.
    pub(crate) fn enqueue(&self, envelope: Envelope) -> Result<(), crate::error::FrameworkError> {
        self.queue.send(envelope).map_err(|_| crate::error::FrameworkError::ActorClosed)
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Address {}

impl std::hash::Hash for Address {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Address").field("id", &self.id).field("supervisor", &self.supervisor_id).finish()
    }
}
