//! Supervisors: actors that additionally own a children map, a timer
//! table, and the foreign-subscription bridge (spec.md §4.4).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::actor::{Actor, ActorHooks, ActorState, ShutdownRequest, TimeoutDriven};
use crate::address::{Address, AddressId};
use crate::error::ErrorChain;
use crate::locality::Locality;
use crate::message::{CommitUnsubscription, Envelope, ExternalUnsubscription, ForeignDelivery, ForeignTargetGone, SubscribeExternal, SubscriptionConfirmation};
use crate::plugin::Plugin;
use crate::subscription::{BoxedHandler, HandlerId, SubscriptionMap, SubscriptionPoint};
use crate::system::SystemInner;

/// What a supervisor keeps about one direct child, independent of the
/// child's own state type `S` (which the supervisor doesn't otherwise
/// know about). Lifecycle is read live through `ticker` rather than
/// cached, so a plain actor's own shutdown is visible here the moment
/// it happens, not just when something remembers to push an update.
struct ChildHandle {
    address: Address,
    ticker: Rc<dyn TimeoutDriven>,
    shutdown_deadline: Option<Instant>,
    /// Set once `check_timeouts` gives up waiting on this child; lets
    /// `check_shutdown_complete` stop treating a hung child as blocking
    /// without having to lie about its actual state.
    shutdown_forced: bool,
}

pub(crate) struct SupervisorCore {
    id: AddressId,
    own_address: Address,
    locality: Rc<RefCell<Locality>>,
    lifecycle: ActorState,
    parent: Option<Address>,
    system: Weak<RefCell<SystemInner>>,
    subscriptions: SubscriptionMap,
    children: HashMap<AddressId, ChildHandle>,
    foreign_handlers: HashMap<HandlerId, BoxedHandler>,
    shutdown_timeout: Duration,
    shutdown_reason: Option<ErrorChain>,
    interceptor: Option<Box<dyn FnMut(&Envelope) -> bool>>,
}

/// Public handle to a supervisor. Cheap to clone.
#[derive(Clone)]
pub struct Supervisor {
    pub(crate) core: Rc<RefCell<SupervisorCore>>,
}

/// Requests this supervisor's own shutdown, deliverable as an ordinary
/// message rather than a direct [`Supervisor::shutdown`] call. A message
/// handler reacting to a reply (e.g. `pinger_t::on_pong` calling
/// `supervisor->shutdown()` in the original source) runs while
/// `handle_envelope`'s dispatch already holds this supervisor's
/// `RefCell` borrowed; calling `shutdown` directly from there would
/// double-borrow it. Sending this instead queues the request for the
/// next envelope, by which point that borrow has already been released.
pub struct ShutdownSupervisor {
    pub reason: ErrorChain,
}

impl Supervisor {
    pub fn address(&self) -> Address {
        self.core.borrow().own_address.clone()
    }

    pub fn state(&self) -> ActorState {
        self.core.borrow().lifecycle
    }

    pub(crate) fn new(
        locality: Rc<RefCell<Locality>>,
        parent: Option<Address>,
        system: Weak<RefCell<SystemInner>>,
        shutdown_timeout: Duration,
    ) -> Self {
        let id = AddressId::next();
        let sender = locality.borrow().sender();
        let own_address = Address::for_supervisor(id, sender);
        let core = Rc::new(RefCell::new(SupervisorCore {
            id,
            own_address,
            locality: Rc::clone(&locality),
            lifecycle: ActorState::Initialized,
            parent,
            system,
            subscriptions: SubscriptionMap::default(),
            children: HashMap::new(),
            foreign_handlers: HashMap::new(),
            shutdown_timeout,
            shutdown_reason: None,
            interceptor: None,
        }));
        locality.borrow_mut().register(id, Rc::clone(&core));
        core.borrow_mut().lifecycle = ActorState::Operational;
        info!(supervisor = ?id, "supervisor operational");
        Self { core }
    }

    /// Registers `child` (a supervisor built with `.parent(self)`) for the
    /// same shutdown-cascade tracking a plain actor gets from
    /// `create_actor`: `self.shutdown()` fans a `ShutdownRequest` out to
    /// it like any other child, and `self`'s own completion check reads
    /// its lifecycle live through the same `TimeoutDriven` ticker.
    pub(crate) fn register_child_supervisor(&self, child: &Supervisor) {
        let address = child.address();
        let mut core = self.core.borrow_mut();
        core.children.insert(
            address.id(),
            ChildHandle { address, ticker: Rc::new(child.clone()) as Rc<dyn TimeoutDriven>, shutdown_deadline: None, shutdown_forced: false },
        );
    }

    /// Installs the interception hook (spec.md §4.4d). See
    /// `SupervisorBuilder::interceptor`.
    pub(crate) fn set_interceptor(&self, f: Box<dyn FnMut(&Envelope) -> bool>) {
        self.core.borrow_mut().interceptor = Some(f);
    }

    /// Creates a new actor owned by this supervisor, activates its plugin
    /// chain, and registers it for shutdown-cascade tracking.
    pub fn create_actor<S: ActorHooks>(&self, state: S, plugins: Vec<Box<dyn Plugin<S>>>) -> Actor<S> {
        let (id, sender) = {
            let core = self.core.borrow();
            (core.id, core.locality.borrow().sender())
        };
        let address = Address::new(id, sender);
        let actor = Actor::new(state, address.clone(), Rc::downgrade(&self.core), plugins);
        {
            let mut core = self.core.borrow_mut();
            core.children.insert(
                address.id(),
                ChildHandle {
                    address: address.clone(),
                    ticker: Rc::new(actor.clone()) as Rc<dyn TimeoutDriven>,
                    shutdown_deadline: None,
                    shutdown_forced: false,
                },
            );
        }
        actor.do_initialize();
        actor.do_start();
        actor
    }

    /// Begins this supervisor's own shutdown: fans `ShutdownRequest` out to
    /// every child and arms each one's shutdown timer. A child that hasn't
    /// reported `ShutDown` by its deadline is escalated as a timeout but
    /// does not block the cascade indefinitely.
    pub fn shutdown(&self, reason: ErrorChain) {
        let mut core = self.core.borrow_mut();
        if core.lifecycle == ActorState::ShuttingDown || core.lifecycle == ActorState::ShutDown {
            return;
        }
        core.lifecycle = ActorState::ShuttingDown;
        core.shutdown_reason = Some(reason.clone());
        info!(supervisor = ?core.id, %reason, "supervisor shutting down, cascading to children");
        let deadline = Instant::now() + core.shutdown_timeout;
        let children: Vec<Address> = core.children.values().map(|c| c.address.clone()).collect();
        for handle in core.children.values_mut() {
            handle.shutdown_deadline = Some(deadline);
        }
        drop(core);
        for child_addr in &children {
            let envelope = Envelope::new(child_addr.clone(), ShutdownRequest::new(reason.clone()));
            let _ = child_addr.enqueue(envelope);
        }
        self.check_shutdown_complete();
    }

    fn check_shutdown_complete(&self) {
        let mut core = self.core.borrow_mut();
        if core.lifecycle != ActorState::ShuttingDown {
            return;
        }
        let all_down = core.children.values().all(|c| c.shutdown_forced || c.ticker.current_state() == ActorState::ShutDown);
        if all_down {
            core.lifecycle = ActorState::ShutDown;
            let reason = core.shutdown_reason.clone();
            let parent = core.parent.clone();
            info!(supervisor = ?core.id, "supervisor shut down, all children down");
            drop(core);
            if let Some(parent_addr) = parent {
                let envelope = Envelope::new(parent_addr.clone(), crate::actor::ChildShutDown { child: self.address() });
                let _ = parent_addr.enqueue(envelope);
            }
            let _ = reason;
        }
    }

    /// Escalates an error this supervisor could not handle itself to the
    /// system-wide `on_error` callback (spec.md §4.5).
    pub(crate) fn escalate(&self, chain: ErrorChain) {
        error!(%chain, "escalating error to system");
        if let Some(system) = self.core.borrow().system.upgrade() {
            SystemInner::report_error(&system, chain);
        }
    }
}

/// Lets a parent supervisor track a nested supervisor child through the
/// same `ChildHandle`/`ticker` mechanism as a plain `Actor<S>`. A
/// supervisor has no request table of its own, so ticking it forward is a
/// no-op; only its lifecycle is ever read.
impl TimeoutDriven for Supervisor {
    fn check_request_timeouts(&self, _now: Instant) {}

    fn current_state(&self) -> ActorState {
        self.state()
    }
}

impl SupervisorCore {
    /// Demuxed entry point: called by the owning [`Locality`] for every
    /// popped envelope whose destination belongs to this supervisor.
    pub(crate) fn handle_envelope(this: &Rc<RefCell<SupervisorCore>>, envelope: Envelope) {
        let dest = envelope.destination().id();
        let type_id = envelope.type_id();

        {
            let mut core = this.borrow_mut();
            if let Some(interceptor) = core.interceptor.as_mut() {
                let keep = interceptor(&envelope);
                if !keep {
                    debug!(ty = envelope.type_name(), "envelope dropped by interceptor");
                    return;
                }
            }
        }

        if let Some(msg) = envelope.payload.downcast_ref::<SubscribeExternal>() {
            let mut core = this.borrow_mut();
            core.subscriptions.subscribe_foreign_exact(msg.target, msg.type_id, msg.handler_id, msg.requester.clone());
            debug!(supervisor = ?core.id, handler = ?msg.handler_id, "registered foreign subscriber");
            let reply = Envelope::new(
                msg.requester.clone(),
                SubscriptionConfirmation { target: msg.target, handler_id: msg.handler_id, type_id: msg.type_id, type_name: msg.type_name },
            );
            let _ = msg.requester.enqueue(reply);
            return;
        }
        if envelope.payload.downcast_ref::<SubscriptionConfirmation>().is_some() {
            debug!("subscription confirmation received");
            return;
        }
        if let Some(msg) = envelope.payload.downcast_ref::<ExternalUnsubscription>() {
            let mut core = this.borrow_mut();
            core.subscriptions.unsubscribe(msg.target, msg.type_id, msg.handler_id);
            drop(core);
            let reply = Envelope::new(msg.requester.clone(), CommitUnsubscription { target: msg.target, handler_id: msg.handler_id });
            let _ = msg.requester.enqueue(reply);
            return;
        }
        if envelope.payload.downcast_ref::<CommitUnsubscription>().is_some() {
            debug!("unsubscription commit received");
            return;
        }
        if let Some(msg) = envelope.payload.downcast_ref::<ForeignTargetGone>() {
            let mut core = this.borrow_mut();
            core.foreign_handlers.remove(&msg.handler_id);
            debug!(handler = ?msg.handler_id, "foreign subscription target gone, dropped handler");
            return;
        }
        if let Some(fd) = envelope.payload.downcast_ref::<ForeignDelivery>() {
            let mut core = this.borrow_mut();
            if let Some(handler) = core.foreign_handlers.get_mut(&fd.handler_id) {
                handler(fd.payload.as_ref());
            } else {
                warn!(handler = ?fd.handler_id, "foreign delivery for unknown handler dropped");
            }
            return;
        }
        if let Some(msg) = envelope.payload.downcast_ref::<ShutdownSupervisor>() {
            let sup = Supervisor { core: Rc::clone(this) };
            sup.shutdown(msg.reason.clone());
            return;
        }
        if let Some(msg) = envelope.payload.downcast_ref::<ShutdownRequest>() {
            if dest == this.borrow().id {
                // A `ShutdownRequest` addressed at a supervisor's own id
                // means a parent is cascading into it as a nested-supervisor
                // child (see `register_child_supervisor`); a plain actor's
                // own copy of this message is handled through its normal
                // subscription instead, never reaching this branch.
                let sup = Supervisor { core: Rc::clone(this) };
                sup.shutdown(msg.reason.clone());
                return;
            }
        }
        if envelope.payload.downcast_ref::<crate::actor::ChildShutDown>().is_some() {
            // A nested supervisor's own completion is already visible live
            // through `ticker` (see `ChildHandle`), same as a plain actor's;
            // this is just an eager nudge so the parent doesn't have to wait
            // for its next tick to notice.
            let sup = Supervisor { core: Rc::clone(this) };
            sup.check_shutdown_complete();
            return;
        }

        let (count, foreign) = {
            let mut core = this.borrow_mut();
            core.subscriptions.dispatch(dest, type_id, envelope.payload.as_ref())
        };
        for fd in foreign {
            let forward = ForeignDelivery { origin: dest, handler_id: fd.handler_id, type_id, type_name: envelope.type_name(), payload: std::sync::Arc::clone(&envelope.payload) };
            let fwd_envelope = Envelope::forward(fd.requester.clone(), std::any::TypeId::of::<ForeignDelivery>(), "ForeignDelivery", std::sync::Arc::new(forward));
            let _ = fd.requester.enqueue(fwd_envelope);
        }
        if count == 0 {
            debug!(dest = ?dest, ty = envelope.type_name(), "envelope delivered to zero handlers");
        }
    }

    /// Called once a child actor reaches `ShutDown`: nothing will ever
    /// dispatch to its address again, so every remaining subscriber
    /// registered against it is dropped, and any foreign ones are told to
    /// drop their own side's bookkeeping too (spec.md §8 scenario 5).
    pub(crate) fn purge_target(this: &Rc<RefCell<SupervisorCore>>, addr: AddressId) {
        let foreign = this.borrow_mut().subscriptions.drain(addr);
        for (handler_id, requester) in foreign {
            let envelope = Envelope::new(requester.clone(), ForeignTargetGone { handler_id });
            let _ = requester.enqueue(envelope);
        }
    }

    /// Checks whether `target`'s owning supervisor shares this locality
    /// (i.e. a direct, non-foreign subscription is possible).
    pub(crate) fn owns_locality_of(&self, target: &Address) -> bool {
        self.locality.borrow().contains(target.supervisor_id())
    }

    /// Looks up the supervisor that actually owns `target`'s address
    /// within this supervisor's own locality. A same-locality subscription
    /// must be registered against *this* supervisor's map, since dispatch
    /// for an envelope addressed to `target` runs there, not against
    /// whichever supervisor happens to be subscribing.
    pub(crate) fn peer_for(&self, target: &Address) -> Option<Rc<RefCell<SupervisorCore>>> {
        self.locality.borrow().get(target.supervisor_id())
    }

    pub(crate) fn subscribe_local(&mut self, addr: AddressId, type_id: std::any::TypeId, handler: BoxedHandler) -> HandlerId {
        self.subscriptions.subscribe_local(addr, type_id, handler)
    }

    pub(crate) fn unsubscribe_local(&mut self, addr: AddressId, type_id: std::any::TypeId, handler_id: HandlerId) {
        self.subscriptions.unsubscribe(addr, type_id, handler_id);
    }

    pub(crate) fn subscribe_foreign_pending(
        &mut self,
        target: &Address,
        type_id: std::any::TypeId,
        type_name: &'static str,
        handler: BoxedHandler,
        requester: Address,
    ) -> HandlerId {
        let handler_id = HandlerId::next();
        self.foreign_handlers.insert(handler_id, handler);
        let envelope = Envelope::new(target.clone(), SubscribeExternal { target: target.id(), type_id, type_name, handler_id, requester });
        let _ = target.enqueue(envelope);
        handler_id
    }

    pub(crate) fn unsubscribe_foreign(&mut self, point: &SubscriptionPoint) {
        self.foreign_handlers.remove(&point.handler_id);
        let envelope = Envelope::new(
            point.address.clone(),
            ExternalUnsubscription { target: point.address.id(), type_id: point.type_id, handler_id: point.handler_id, requester: self.own_address.clone() },
        );
        let _ = point.address.enqueue(envelope);
    }

    /// Called once per tick by the owning [`Locality`] to expire both
    /// children's shutdown deadlines and their own in-flight request
    /// timeouts.
    pub(crate) fn check_timeouts(this: &Rc<RefCell<SupervisorCore>>, now: Instant) {
        let (expired_children, tickers): (Vec<AddressId>, Vec<Rc<dyn TimeoutDriven>>) = {
            let core = this.borrow();
            let expired = core
                .children
                .iter()
                .filter(|(_, h)| !h.shutdown_forced && h.ticker.current_state() != ActorState::ShutDown && h.shutdown_deadline.map(|d| d <= now).unwrap_or(false))
                .map(|(id, _)| *id)
                .collect();
            let tickers = core.children.values().map(|h| Rc::clone(&h.ticker)).collect();
            (expired, tickers)
        };
        for ticker in tickers {
            ticker.check_request_timeouts(now);
        }
        let sup = Supervisor { core: Rc::clone(this) };
        if !expired_children.is_empty() {
            for child in &expired_children {
                warn!(child = ?child, "child shutdown timed out");
                if let Some(h) = sup.core.borrow_mut().children.get_mut(child) {
                    h.shutdown_forced = true;
                }
            }
            sup.escalate(ErrorChain::new("supervisor", crate::error::FrameworkError::ShutdownTimeout));
        }
        // Every child that finished on its own since the last tick (the
        // common case) also needs this supervisor's own lifecycle nudged
        // toward `ShutDown` — nothing else calls this once shutdown is
        // already underway, since a plain child's completion is only ever
        // observed live through `ticker`, not pushed via an envelope.
        sup.check_shutdown_complete();
    }
}
