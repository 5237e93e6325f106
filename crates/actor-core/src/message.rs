//! Type-erased messages and the envelope that carries them through a queue.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::address::{Address, AddressId};
use crate::subscription::HandlerId;

/// Marker trait for values that can be sent as actor messages.
///
/// `Send + Sync` is required (rather than just `Send`) so a message can be
/// shared, not cloned, when the same delivery also has to cross into a
/// different locality for a foreign subscriber (§4.4c) — the payload is
/// held behind an `Arc` and handed to every handler, local or foreign, as a
/// borrow of the same allocation. There is no serialization requirement:
/// the runtime never crosses a process boundary.
pub trait Message: Any + Send + Sync + 'static {}
impl<T: Any + Send + Sync + 'static> Message for T {}

/// A type-erased, reference-counted message addressed to a specific
/// destination. Handlers only ever see `&T`; mutating a message in a
/// handler is a contract violation the type system also happens to forbid.
pub struct Envelope {
    pub(crate) destination: Address,
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) payload: Arc<dyn Any + Send + Sync>,
}

impl Envelope {
    pub(crate) fn new<M: Message>(destination: Address, payload: M) -> Self {
        Self {
            destination,
            type_id: TypeId::of::<M>(),
            type_name: std::any::type_name::<M>(),
            payload: Arc::new(payload),
        }
    }

    pub(crate) fn forward(destination: Address, type_id: TypeId, type_name: &'static str, payload: Arc<dyn Any + Send + Sync>) -> Self {
        Self { destination, type_id, type_name, payload }
    }

    pub fn destination(&self) -> &Address {
        &self.destination
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope").field("type", &self.type_name).field("destination", &self.destination).finish()
    }
}

/// Control message a supervisor sends to a foreign address's owning
/// locality to ask that it start forwarding matching deliveries back.
pub(crate) struct SubscribeExternal {
    pub target: AddressId,
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub handler_id: HandlerId,
    pub requester: Address,
}

/// Reply confirming a [`SubscribeExternal`] was recorded; the requester
/// appends the resulting [`crate::subscription::SubscriptionPoint`] to its
/// own points list only once this arrives (§4.4c step 2).
pub(crate) struct SubscriptionConfirmation {
    pub target: AddressId,
    pub handler_id: HandlerId,
    pub type_id: TypeId,
    pub type_name: &'static str,
}

/// Asks the address owner to drop a foreign subscriber's entry.
pub(crate) struct ExternalUnsubscription {
    pub target: AddressId,
    pub type_id: TypeId,
    pub handler_id: HandlerId,
    pub requester: Address,
}

/// Confirms an [`ExternalUnsubscription`] was applied; the requester only
/// removes the point from its own list once this arrives.
pub(crate) struct CommitUnsubscription {
    pub target: AddressId,
    pub handler_id: HandlerId,
}

/// A forwarded delivery for a foreign subscriber: the owning locality
/// already matched it against its subscription map and is handing the
/// shared payload to the requester's locality for local dispatch there.
pub(crate) struct ForeignDelivery {
    pub origin: AddressId,
    pub handler_id: HandlerId,
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub payload: Arc<dyn Any + Send + Sync>,
}

/// Sent by a target actor's owning supervisor, to each foreign
/// subscriber's requester address, once that target reaches `ShutDown` —
/// nothing will ever dispatch to it again, so the requester's supervisor
/// can drop its `foreign_handlers` entry without an explicit unsubscribe
/// call (spec.md §8 scenario 5).
pub(crate) struct ForeignTargetGone {
    pub handler_id: HandlerId,
}
