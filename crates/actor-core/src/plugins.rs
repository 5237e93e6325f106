//! Built-in plugins every plain actor can opt into (spec.md §4.6,
//! `original_source/src/rotor/plugin/starter.cpp` and
//! `behavior.cpp`'s `action_unsubscribe_self`/`on_unsubscription` pair).
//!
//! Supervisors get the equivalent of these two plus child-management and
//! foreign-subscription bridging, but that part is hardcoded directly on
//! [`crate::supervisor::SupervisorCore`] rather than plugin-ized — see
//! `DESIGN.md` for why.

use crate::actor::ActorContext;
use crate::plugin::Plugin;
use crate::reaction::Reactions;

/// Reacts to the `START` reaction by invoking the actor's `on_start` hook.
/// The `INITIALIZED -> OPERATIONAL` transition itself happens unconditionally
/// once `do_initialize` finishes (spec.md §3); an actor with no `Starter`
/// still becomes `Operational`, it just has nothing to run at that boundary.
pub struct Starter;

impl<S: crate::actor::ActorHooks> Plugin<S> for Starter {
    fn reactions(&self) -> Reactions {
        Reactions::START
    }

    fn handle_start(&mut self, ctx: &mut ActorContext<'_, S>) -> bool {
        let state = ctx.state_rc();
        state.borrow_mut().on_start(ctx);
        true
    }
}

/// Drives the "unsubscribe everything, then let shutdown complete" step
/// of `SHUTTING_DOWN`: on the `SHUTDOWN` reaction it removes every
/// remaining subscription point. Every actor that holds subscriptions
/// should include this plugin so shutdown actually drains them (spec.md
/// invariant I4: `SHUT_DOWN` implies an empty points list).
pub struct Lifetime;

impl<S: crate::actor::ActorHooks> Plugin<S> for Lifetime {
    fn reactions(&self) -> Reactions {
        Reactions::SHUTDOWN
    }

    fn handle_shutdown(&mut self, ctx: &mut ActorContext<'_, S>) -> bool {
        let ids: Vec<_> = ctx.points().iter().map(|p| p.handler_id).collect();
        for id in ids {
            ctx.unsubscribe(id);
        }
        true
    }
}

/// The two built-ins every non-trivial actor wants, in the order they
/// must run (start only matters once init has already completed, and
/// unsubscribe-everything only matters at shutdown, so declaration order
/// here doesn't itself encode a dependency — but conventionally goes
/// first).
pub fn default_plugins<S: crate::actor::ActorHooks>() -> Vec<Box<dyn Plugin<S>>> {
    vec![Box::new(Starter), Box::new(Lifetime)]
}
