//! Actor core: the lifecycle state machine and plugin-driven init/shutdown
//! sequencing shared by plain actors and supervisors (a supervisor "is an
//! actor" per spec.md §4.4 and is built on the same [`ActorCore`]).

use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::address::{Address, AddressId};
use crate::error::ErrorChain;
use crate::message::Message;
use crate::plugin::Plugin;
use crate::reaction::Reactions;
use crate::request::{Reply, Request, RequestId, RequestTable};
use crate::subscription::{HandlerId, SubscriptionPoint};
use crate::supervisor::SupervisorCore;

/// The six-state lifecycle every actor (and every supervisor) moves
/// through exactly once, in order, per spec.md §3.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ActorState {
    New,
    Initializing,
    Initialized,
    Operational,
    ShuttingDown,
    ShutDown,
}

/// User-overridable lifecycle hooks. Every method has a no-op default, so
/// plain state structs that only care about message handlers need not
/// implement anything by hand.
///
/// Each hook gets its own actor's [`ActorContext`] so it can send, request,
/// or subscribe — e.g. `on_start` sending the first message of a protocol,
/// the way `pinger_t::on_start` sends the opening `ping_t` in the original
/// source. Calling `ctx.state_mut()` from inside a hook double-borrows the
/// same `RefCell` the hook is already running under and panics; reach for
/// `&mut self` instead, `ctx` is for messaging only here.
pub trait ActorHooks: 'static {
    /// Fires once, at the `INITIALIZING -> INITIALIZED` boundary (the
    /// Open Question in spec.md §9 resolved toward this boundary rather
    /// than `INITIALIZED -> OPERATIONAL`).
    fn on_init_finish(&mut self, _ctx: &mut ActorContext<'_, Self>) {}
    /// Fires once, at `INITIALIZED -> OPERATIONAL`, driven by the
    /// `starter` plugin.
    fn on_start(&mut self, _ctx: &mut ActorContext<'_, Self>) {}
    fn on_shutdown_start(&mut self, _ctx: &mut ActorContext<'_, Self>, _reason: &ErrorChain) {}
    fn on_shutdown_finish(&mut self, _ctx: &mut ActorContext<'_, Self>) {}
}

/// Public handle to an actor. Cheap to clone; all clones refer to the same
/// underlying state.
pub struct Actor<S: ActorHooks> {
    pub(crate) core: Rc<RefCell<ActorCore<S>>>,
}

impl<S: ActorHooks> Clone for Actor<S> {
    fn clone(&self) -> Self {
        Self { core: Rc::clone(&self.core) }
    }
}

impl<S: ActorHooks> Actor<S> {
    pub fn address(&self) -> Address {
        self.core.borrow().own_address.clone()
    }

    pub fn state(&self) -> ActorState {
        self.core.borrow().lifecycle
    }

    /// Reads this actor's own state from outside, for host code and tests
    /// that don't otherwise have a reason to hold an `ActorContext` (e.g.
    /// asserting on counters a handler incremented). Borrows the same
    /// `RefCell` a running hook or handler would, so calling this while
    /// one is on the stack for the same actor panics the same way a
    /// direct re-entrant `state_mut()` would.
    pub fn with_state<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let state = self.core.borrow().state.clone();
        let borrowed = state.borrow();
        f(&borrowed)
    }

    pub(crate) fn new(
        state: S,
        own_address: Address,
        supervisor: Weak<RefCell<SupervisorCore>>,
        plugins: Vec<Box<dyn Plugin<S>>>,
    ) -> Self {
        Self {
            core: Rc::new(RefCell::new(ActorCore {
                state: Rc::new(RefCell::new(state)),
                lifecycle: ActorState::New,
                own_address,
                supervisor,
                plugins,
                points: Vec::new(),
                requests: RequestTable::default(),
                shutdown_reason: None,
                activation_cursor: 0,
            })),
        }
    }

    /// Registers the control-message handlers that drive this actor's own
    /// lifecycle, then begins activating plugins. Mirrors
    /// `actor_base_t::do_initialize` subscribing itself to its own init,
    /// start, and shutdown triggers before anything else can happen.
    pub(crate) fn do_initialize(&self) {
        {
            let mut core = self.core.borrow_mut();
            core.lifecycle = ActorState::Initializing;
        }
        install_control_handlers(self);
        run_activation(self);
    }

    /// Runs the `START` reaction (driving any `starter` plugin's
    /// `on_start`) and moves `INITIALIZED -> OPERATIONAL`. A no-op if
    /// `do_initialize` didn't reach `INITIALIZED` (init was vetoed). Called
    /// unconditionally by [`crate::supervisor::Supervisor::create_actor`]
    /// right after `do_initialize` — an actor that registers no `START`
    /// reaction still becomes `Operational`, it simply has nothing to run
    /// at the boundary.
    pub(crate) fn do_start(&self) {
        if self.core.borrow().lifecycle != ActorState::Initialized {
            return;
        }
        if !run_reaction(self, Reactions::START, |p, ctx| p.handle_start(ctx)) {
            warn!("a plugin reported failure handling START; continuing anyway");
        }
        self.core.borrow_mut().lifecycle = ActorState::Operational;
        info!("actor operational");
    }

    pub(crate) fn do_shutdown(&self, reason: ErrorChain) {
        let should_start = {
            let mut core = self.core.borrow_mut();
            if core.lifecycle == ActorState::ShuttingDown || core.lifecycle == ActorState::ShutDown {
                false
            } else {
                core.shutdown_reason = Some(reason.clone());
                core.lifecycle = ActorState::ShuttingDown;
                true
            }
        };
        if !should_start {
            return;
        }
        {
            let mut commit = None;
            let self_core = Rc::downgrade(&self.core);
            let mut core = self.core.borrow_mut();
            let ActorCore { state, own_address, supervisor, points, requests, .. } = &mut *core;
            let mut ctx = make_context(state, own_address, supervisor, points, requests, &mut commit, self_core);
            let state_rc = ctx.state_rc();
            state_rc.borrow_mut().on_shutdown_start(&mut ctx, &reason);
        }
        info!(reason = %reason, "actor shutting down");
        run_deactivation(self);
    }
}

pub(crate) struct ActorCore<S: ActorHooks> {
    pub state: Rc<RefCell<S>>,
    pub lifecycle: ActorState,
    pub own_address: Address,
    pub supervisor: Weak<RefCell<SupervisorCore>>,
    pub plugins: Vec<Box<dyn Plugin<S>>>,
    pub points: Vec<SubscriptionPoint>,
    pub requests: RequestTable<S>,
    pub shutdown_reason: Option<ErrorChain>,
    activation_cursor: usize,
}

/// The view plugins and message handlers get into an actor's own state
/// and bookkeeping during a hook invocation.
pub struct ActorContext<'a, S: ActorHooks> {
    state_handle: Rc<RefCell<S>>,
    address: Address,
    supervisor: Weak<RefCell<SupervisorCore>>,
    points: &'a mut Vec<SubscriptionPoint>,
    requests: &'a mut RequestTable<S>,
    commit: &'a mut Option<bool>,
    self_core: Weak<RefCell<ActorCore<S>>>,
}

impl<'a, S: ActorHooks> ActorContext<'a, S> {
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Mutable access to this actor's own state for the duration of the
    /// borrow. Plugin hooks and message handlers both go through this
    /// rather than a raw field so the `RefCell` keeps enforcing the
    /// single-borrow invariant the runtime relies on.
    pub fn state_mut(&self) -> std::cell::RefMut<'_, S> {
        self.state_handle.borrow_mut()
    }

    /// Clone of this context's state handle, for hook dispatch sites that
    /// need to borrow the state themselves (around an `&mut self` hook call)
    /// rather than through [`Self::state_mut`].
    pub(crate) fn state_rc(&self) -> Rc<RefCell<S>> {
        Rc::clone(&self.state_handle)
    }

    /// Reports whether `activate`/`handle_*` succeeded. Must be called
    /// before the hook returns; a hook that never calls this is treated as
    /// a veto (fails closed).
    pub fn commit_activation(&mut self, ok: bool) {
        *self.commit = Some(ok);
    }

    pub fn commit_deactivation(&mut self) {
        *self.commit = Some(true);
    }

    /// Subscribes a handler, owned by this actor's state, to messages of
    /// type `M` sent to `target`. If `target` is owned by a different
    /// locality this transparently performs the foreign handshake
    /// (§4.4c); same-locality cross-supervisor subscriptions and
    /// same-actor subscriptions are both recorded directly.
    pub fn subscribe<M: Message>(&mut self, target: &Address, mut handler: impl FnMut(&mut S, &M, &Outbox) + 'static) -> HandlerId {
        let state = Rc::clone(&self.state_handle);
        let boxed: crate::subscription::BoxedHandler = Box::new(move |payload: &(dyn Any + Send + Sync)| {
            if let Some(msg) = payload.downcast_ref::<M>() {
                let mut s = state.borrow_mut();
                handler(&mut s, msg, &Outbox);
            }
        });
        let sup = self.supervisor.upgrade().expect("supervisor dropped while actor still alive");
        let same_locality = sup.borrow().owns_locality_of(target);
        let type_id = std::any::TypeId::of::<M>();
        let type_name = std::any::type_name::<M>();
        if same_locality {
            let target_sup = sup.borrow().peer_for(target).expect("locality-owned target must be registered with its locality");
            let handler_id = target_sup.borrow_mut().subscribe_local(target.id(), type_id, boxed);
            self.points.push(SubscriptionPoint { address: target.clone(), type_id, type_name, handler_id, foreign: false });
            handler_id
        } else {
            let handler_id = sup.borrow_mut().subscribe_foreign_pending(target, type_id, type_name, boxed, self.address.clone());
            self.points.push(SubscriptionPoint { address: target.clone(), type_id, type_name, handler_id, foreign: true });
            handler_id
        }
    }

    pub fn unsubscribe(&mut self, handler_id: HandlerId) {
        if let Some(pos) = self.points.iter().position(|p| p.handler_id == handler_id) {
            let point = self.points.remove(pos);
            let sup = self.supervisor.upgrade().expect("supervisor dropped while actor still alive");
            if point.foreign {
                sup.borrow_mut().unsubscribe_foreign(&point);
            } else if let Some(target_sup) = sup.borrow().peer_for(&point.address) {
                target_sup.borrow_mut().unsubscribe_local(point.address.id(), point.type_id, handler_id);
            }
        }
    }

    pub fn points(&self) -> &[SubscriptionPoint] {
        self.points.as_slice()
    }

    /// Fire-and-forget send: enqueues `msg` for whatever is subscribed to
    /// `target` for type `M`. Never returns an error to the caller — a
    /// closed destination is reported through tracing, per spec.md §7's
    /// "infallible from the caller's stack" design.
    pub fn send<M: Message>(&self, target: &Address, msg: M) {
        Outbox.send(target, msg);
    }

    /// Sends a correlated request; `on_reply` runs (with this actor's
    /// state borrowed mutably) when the matching [`Reply`] arrives,
    /// `on_timeout` if `timeout` elapses first.
    pub fn request<M: Message, R: Message>(
        &mut self,
        target: &Address,
        payload: M,
        timeout: Duration,
        mut on_reply: impl FnMut(&mut S, &R, &Outbox) + 'static,
        on_timeout: impl FnOnce(&mut S, &Outbox) + 'static,
    ) {
        let request_id = self.requests.start(timeout, on_timeout);
        let reply_to = self.address.clone();
        let expect_id = request_id;
        let self_core = self.self_core.clone();
        self.subscribe_self_reply::<R>(move |s, reply: &Reply<R>, outbox| {
            if reply.request_id == expect_id {
                // Drop the pending entry first so a reply that arrives
                // right at the timeout boundary can't also fire `on_timeout`.
                if let Some(core) = self_core.upgrade() {
                    core.borrow_mut().requests.complete(expect_id);
                }
                on_reply(s, &reply.value, outbox);
            }
        });
        let envelope = crate::message::Envelope::new(target.clone(), Request { request_id, reply_to, payload });
        if let Err(err) = target.enqueue(envelope) {
            warn!(target = ?target.id(), %err, "request failed, destination closed");
        }
    }

    fn subscribe_self_reply<R: Message>(&mut self, mut handler: impl FnMut(&mut S, &Reply<R>, &Outbox) + 'static) {
        let state = Rc::clone(&self.state_handle);
        let boxed: crate::subscription::BoxedHandler = Box::new(move |payload: &(dyn Any + Send + Sync)| {
            if let Some(msg) = payload.downcast_ref::<Reply<R>>() {
                let mut s = state.borrow_mut();
                handler(&mut s, msg, &Outbox);
            }
        });
        let sup = self.supervisor.upgrade().expect("supervisor dropped while actor still alive");
        let addr_id = self.address.id();
        sup.borrow_mut().subscribe_local(addr_id, std::any::TypeId::of::<Reply<R>>(), boxed);
    }

    /// Answers a [`Request`] previously received by this actor.
    pub fn respond<R: Message>(&self, reply_to: &Address, request_id: RequestId, value: R) {
        self.send(reply_to, Reply { request_id, value });
    }
}

/// The send capability handed to a subscribed message handler and to a
/// timed-out/replied request callback — both run while the owning
/// supervisor's subscription map or request table is already borrowed, so
/// they can't go through a full [`ActorContext`] (building one would
/// re-borrow the same supervisor to subscribe further). `Outbox` only ever
/// touches a destination's own channel directly, never the supervisor, so
/// it carries no state of its own and needs none of that borrow.
#[derive(Clone, Copy)]
pub struct Outbox;

impl Outbox {
    pub fn send<M: Message>(&self, target: &Address, msg: M) {
        if let Err(err) = target.enqueue(crate::message::Envelope::new(target.clone(), msg)) {
            warn!(target = ?target.id(), %err, "send failed, destination closed");
        }
    }

    pub fn respond<R: Message>(&self, reply_to: &Address, request_id: RequestId, value: R) {
        self.send(reply_to, Reply { request_id, value });
    }
}

fn make_context<'a, S: ActorHooks>(
    state: &Rc<RefCell<S>>,
    address: &Address,
    supervisor: &Weak<RefCell<SupervisorCore>>,
    points: &'a mut Vec<SubscriptionPoint>,
    requests: &'a mut RequestTable<S>,
    commit: &'a mut Option<bool>,
    self_core: Weak<RefCell<ActorCore<S>>>,
) -> ActorContext<'a, S> {
    ActorContext {
        state_handle: Rc::clone(state),
        address: address.clone(),
        supervisor: supervisor.clone(),
        points,
        requests,
        commit,
        self_core,
    }
}

fn run_activation<S: ActorHooks>(actor: &Actor<S>) {
    loop {
        let plugin_count = actor.core.borrow().plugins.len();
        let cursor = actor.core.borrow().activation_cursor;
        if cursor >= plugin_count {
            break;
        }
        let mut commit = None;
        let outcome = {
            let mut core = actor.core.borrow_mut();
            let ActorCore { state, own_address, supervisor, points, requests, plugins, .. } = &mut *core;
            let mut ctx = make_context(state, own_address, supervisor, points, requests, &mut commit, Rc::downgrade(&actor.core));
            plugins[cursor].activate(&mut ctx);
            plugins[cursor].name()
        };
        let ok = commit.unwrap_or(false);
        debug!(plugin = outcome, ok, "plugin activation");
        if ok {
            actor.core.borrow_mut().activation_cursor += 1;
        } else {
            warn!(plugin = outcome, "plugin activation vetoed, aborting init");
            reverse_deactivate_activated(actor);
            return;
        }
    }
    // All plugins activated; run the INIT reaction, then move to
    // INITIALIZED and fire the user hook.
    if !run_reaction(actor, Reactions::INIT, |p, ctx| p.handle_init(ctx)) {
        warn!("INIT reaction vetoed, aborting init");
        reverse_deactivate_activated(actor);
        return;
    }
    {
        let mut core = actor.core.borrow_mut();
        core.lifecycle = ActorState::Initialized;
    }
    {
        let mut commit = None;
        let mut core = actor.core.borrow_mut();
        let ActorCore { state, own_address, supervisor, points, requests, .. } = &mut *core;
        let mut ctx = make_context(state, own_address, supervisor, points, requests, &mut commit, Rc::downgrade(&actor.core));
        let state_rc = ctx.state_rc();
        state_rc.borrow_mut().on_init_finish(&mut ctx);
    }
    info!("actor initialized");
}

fn reverse_deactivate_activated<S: ActorHooks>(actor: &Actor<S>) {
    let activated = actor.core.borrow().activation_cursor;
    for idx in (0..activated).rev() {
        let mut commit = None;
        let mut core = actor.core.borrow_mut();
        let ActorCore { state, own_address, supervisor, points, requests, plugins, .. } = &mut *core;
        let mut ctx = make_context(state, own_address, supervisor, points, requests, &mut commit, Rc::downgrade(&actor.core));
        plugins[idx].deactivate(&mut ctx);
    }
    actor.core.borrow_mut().lifecycle = ActorState::ShutDown;
}

fn run_deactivation<S: ActorHooks>(actor: &Actor<S>) {
    if !run_reaction(actor, Reactions::SHUTDOWN, |p, ctx| p.handle_shutdown(ctx)) {
        warn!("a plugin vetoed shutdown continuation; proceeding anyway after logging");
    }
    let activated = actor.core.borrow().activation_cursor;
    for idx in (0..activated).rev() {
        let mut commit = None;
        let mut core = actor.core.borrow_mut();
        let ActorCore { state, own_address, supervisor, points, requests, plugins, .. } = &mut *core;
        let mut ctx = make_context(state, own_address, supervisor, points, requests, &mut commit, Rc::downgrade(&actor.core));
        plugins[idx].deactivate(&mut ctx);
    }
    actor.core.borrow_mut().lifecycle = ActorState::ShutDown;
    {
        let core = actor.core.borrow();
        if let Some(sup) = core.supervisor.upgrade() {
            let addr_id = core.own_address.id();
            drop(core);
            SupervisorCore::purge_target(&sup, addr_id);
        }
    }
    {
        let mut commit = None;
        let mut core = actor.core.borrow_mut();
        let ActorCore { state, own_address, supervisor, points, requests, .. } = &mut *core;
        let mut ctx = make_context(state, own_address, supervisor, points, requests, &mut commit, Rc::downgrade(&actor.core));
        let state_rc = ctx.state_rc();
        state_rc.borrow_mut().on_shutdown_finish(&mut ctx);
    }
    info!("actor shut down");
}

/// Runs every plugin registered for `reaction` in declared order, stopping
/// (and reporting failure) at the first veto.
fn run_reaction<S: ActorHooks>(actor: &Actor<S>, reaction: Reactions, mut call: impl FnMut(&mut Box<dyn Plugin<S>>, &mut ActorContext<'_, S>) -> bool) -> bool {
    let plugin_count = actor.core.borrow().plugins.len();
    for idx in 0..plugin_count {
        let wants = actor.core.borrow().plugins[idx].reactions().contains(reaction);
        if !wants {
            continue;
        }
        let mut commit = Some(true);
        let ok = {
            let mut core = actor.core.borrow_mut();
            let ActorCore { state, own_address, supervisor, points, requests, plugins, .. } = &mut *core;
            let mut ctx = make_context(state, own_address, supervisor, points, requests, &mut commit, Rc::downgrade(&actor.core));
            call(&mut plugins[idx], &mut ctx)
        };
        if !ok {
            return false;
        }
    }
    true
}

fn install_control_handlers<S: ActorHooks>(actor: &Actor<S>) {
    let own_addr = actor.address();
    let sup = actor.core.borrow().supervisor.clone();
    let sup = match sup.upgrade() {
        Some(s) => s,
        None => return,
    };
    let weak_actor_shutdown = Rc::downgrade(&actor.core);
    let boxed: crate::subscription::BoxedHandler = Box::new(move |payload: &(dyn Any + Send + Sync)| {
        if let Some(msg) = payload.downcast_ref::<ShutdownRequest>() {
            if let Some(core) = weak_actor_shutdown.upgrade() {
                let wrapped = Actor { core };
                wrapped.do_shutdown(msg.reason.clone());
            }
        }
    });
    sup.borrow_mut().subscribe_local(own_addr.id(), std::any::TypeId::of::<ShutdownRequest>(), boxed);
}

/// Addressed to an actor's own address to start its shutdown cascade;
/// sent by a supervisor to each child, and by an actor to itself.
#[derive(Clone)]
pub struct ShutdownRequest {
    pub reason: ErrorChain,
}

impl ShutdownRequest {
    pub fn new(reason: ErrorChain) -> Self {
        Self { reason }
    }
}

/// Identity re-exported for callers that only need to compare addresses
/// without holding a full [`Address`].
pub type ActorId = AddressId;

/// Sent by a supervisor to its own parent once all of its children have
/// reached `ShutDown`, so a nested supervisor-as-child is noticed on the
/// normal envelope path rather than polled. A plain actor's shutdown needs
/// no equivalent: its owning supervisor reads its state live through
/// [`TimeoutDriven::current_state`] instead of waiting on a message.
pub(crate) struct ChildShutDown {
    pub child: Address,
}

/// Type-erased hook letting a supervisor tick every child's in-flight
/// request timeouts, and read its current lifecycle, without knowing
/// each child's state type.
pub(crate) trait TimeoutDriven {
    fn check_request_timeouts(&self, now: tokio::time::Instant);
    fn current_state(&self) -> ActorState;
}

impl<S: ActorHooks> TimeoutDriven for Actor<S> {
    fn check_request_timeouts(&self, now: tokio::time::Instant) {
        let callbacks = self.core.borrow_mut().requests.expire(now);
        if callbacks.is_empty() {
            return;
        }
        let core = self.core.borrow();
        let mut state = core.state.borrow_mut();
        for cb in callbacks {
            cb(&mut state, &Outbox);
        }
    }

    fn current_state(&self) -> ActorState {
        self.state()
    }
}
