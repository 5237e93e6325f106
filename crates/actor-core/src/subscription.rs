//! The subscription map: `(address, message type) -> ordered handlers`.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::address::{Address, AddressId};

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a registered handler, returned from `subscribe` and handed
/// back to `unsubscribe`. Stands in for the bound-member-function-pointer
/// identity the original C++ source compares directly — Rust closures have
/// no structural equality, so the map mints a token instead.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    pub(crate) fn next() -> Self {
        Self(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H{}", self.0)
    }
}

/// A single entry in an actor's own `points` list (spec.md §3): the record
/// it keeps of a subscription it holds, local or foreign, so it can
/// unsubscribe everything it owns during shutdown.
#[derive(Clone)]
pub struct SubscriptionPoint {
    pub address: Address,
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub handler_id: HandlerId,
    pub foreign: bool,
}

impl fmt::Debug for SubscriptionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionPoint")
            .field("address", &self.address.id())
            .field("type", &self.type_name)
            .field("handler_id", &self.handler_id)
            .field("foreign", &self.foreign)
            .finish()
    }
}

/// A handler closure, type-erased over its payload but not its owner:
/// each closure captures its own actor's `Rc<RefCell<S>>` at subscribe
/// time, so the map can stay generic while still mutating the right
/// actor's state.
pub(crate) type BoxedHandler = Box<dyn FnMut(&(dyn std::any::Any + Send + Sync))>;

pub(crate) enum Subscriber {
    Local(HandlerId, BoxedHandler),
    Foreign(HandlerId, Address),
}

impl Subscriber {
    fn handler_id(&self) -> HandlerId {
        match self {
            Subscriber::Local(id, _) => *id,
            Subscriber::Foreign(id, _) => *id,
        }
    }
}

/// One locality-owned `(address, type) -> subscribers` table.
///
/// Dispatch realizes the "snapshot semantics" invariant (spec.md §4.1) by
/// recording the ordered handler ids present at the start of the call and,
/// for each id still present by the time it's its turn, temporarily taking
/// that single entry out of the map, invoking it, and putting it back. A
/// handler that subscribes or unsubscribes *other* addresses mid-dispatch
/// sees those changes immediately reflected in the map, but never in the
/// id list this call is already iterating — new subscriptions become
/// visible only on the next dispatch.
#[derive(Default)]
pub(crate) struct SubscriptionMap {
    entries: HashMap<AddressId, HashMap<TypeId, Vec<Subscriber>>>,
}

/// A delivery that needs to cross into another locality, produced as a
/// side effect of [`SubscriptionMap::dispatch`] and sent by the caller.
pub(crate) struct ForeignDispatch {
    pub requester: Address,
    pub handler_id: HandlerId,
}

impl SubscriptionMap {
    pub fn subscribe_local(&mut self, addr: AddressId, type_id: TypeId, handler: BoxedHandler) -> HandlerId {
        let id = HandlerId::next();
        self.entries.entry(addr).or_default().entry(type_id).or_default().push(Subscriber::Local(id, handler));
        id
    }

    pub fn subscribe_foreign(&mut self, addr: AddressId, type_id: TypeId, requester: Address) -> HandlerId {
        let id = HandlerId::next();
        self.entries.entry(addr).or_default().entry(type_id).or_default().push(Subscriber::Foreign(id, requester));
        id
    }

    /// Like [`Self::subscribe_foreign`] but with a caller-supplied id, used
    /// when the requester already minted one and both sides must agree.
    pub fn subscribe_foreign_exact(&mut self, addr: AddressId, type_id: TypeId, id: HandlerId, requester: Address) {
        self.entries.entry(addr).or_default().entry(type_id).or_default().push(Subscriber::Foreign(id, requester));
    }

    /// Removes a single subscriber. A miss is not an error: `addr`'s whole
    /// entry may already have been [`Self::drain`]ed because the target
    /// shut down before the subscriber got around to unsubscribing, in
    /// which case there is nothing left to remove and this is a silent
    /// no-op.
    pub fn unsubscribe(&mut self, addr: AddressId, type_id: TypeId, handler_id: HandlerId) {
        if let Some(subs) = self.entries.get_mut(&addr).and_then(|by_type| by_type.get_mut(&type_id)) {
            subs.retain(|s| s.handler_id() != handler_id);
        }
    }

    pub fn has_subscribers(&self, addr: AddressId, type_id: TypeId) -> bool {
        self.entries.get(&addr).and_then(|by_type| by_type.get(&type_id)).map(|v| !v.is_empty()).unwrap_or(false)
    }

    /// Removes every subscriber registered against `addr`, across all
    /// message types — for when the owning address is gone and nothing
    /// will ever dispatch to it again. Returns the foreign ones so the
    /// caller can notify their requesters.
    pub fn drain(&mut self, addr: AddressId) -> Vec<(HandlerId, Address)> {
        let Some(by_type) = self.entries.remove(&addr) else {
            return Vec::new();
        };
        by_type
            .into_values()
            .flatten()
            .filter_map(|s| match s {
                Subscriber::Foreign(id, requester) => Some((id, requester)),
                Subscriber::Local(..) => None,
            })
            .collect()
    }

    /// Dispatches one message. Local handlers are invoked in registration
    /// order (per the recorded snapshot); any foreign subscribers matched
    /// are returned for the caller to forward. Returns the number of
    /// handlers (local + foreign) that will have received the message.
    pub fn dispatch(&mut self, addr: AddressId, type_id: TypeId, payload: &(dyn std::any::Any + Send + Sync)) -> (usize, Vec<ForeignDispatch>) {
        let snapshot: Vec<HandlerId> = self
            .entries
            .get(&addr)
            .and_then(|by_type| by_type.get(&type_id))
            .map(|subs| subs.iter().map(Subscriber::handler_id).collect())
            .unwrap_or_default();

        let mut count = 0;
        let mut foreign = Vec::new();
        for id in snapshot {
            let taken = self.entries.get_mut(&addr).and_then(|by_type| by_type.get_mut(&type_id)).and_then(|subs| {
                let pos = subs.iter().position(|s| s.handler_id() == id)?;
                Some(subs.remove(pos))
            });
            match taken {
                Some(Subscriber::Local(id, mut handler)) => {
                    handler(payload);
                    count += 1;
                    self.entries.entry(addr).or_default().entry(type_id).or_default().push(Subscriber::Local(id, handler));
                }
                Some(Subscriber::Foreign(id, requester)) => {
                    count += 1;
                    foreign.push(ForeignDispatch { requester: requester.clone(), handler_id: id });
                    self.entries.entry(addr).or_default().entry(type_id).or_default().push(Subscriber::Foreign(id, requester));
                }
                None => {}
            }
        }
        (count, foreign)
    }
}
