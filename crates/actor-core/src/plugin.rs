//! The plugin framework: ordered, veto-capable participants in an actor's
//! init/start/shutdown transitions and subscription bookkeeping.

use crate::actor::{ActorContext, ActorHooks};
use crate::reaction::Reactions;
use crate::subscription::SubscriptionPoint;

/// A composable participant in an actor's lifecycle.
///
/// Plugins are driven in declared order during activation and in reverse
/// order during deactivation (spec.md §4.2). A plugin that wants no part
/// of the veto hooks can leave [`Plugin::reactions`] empty and just use
/// `activate`/`deactivate` to wire up state or subscriptions at fixed
/// points in the actor's life.
pub trait Plugin<S: ActorHooks>: 'static {
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn reactions(&self) -> Reactions {
        Reactions::empty()
    }

    /// Called once, in declared order, while the actor is `INITIALIZING`.
    /// Must call `ctx.commit_activation(..)` before returning (synchronously
    /// or having already done so) to report whether it came up cleanly.
    fn activate(&mut self, ctx: &mut ActorContext<'_, S>) {
        ctx.commit_activation(true);
    }

    /// Called once, in reverse order, while the actor is `SHUTTING_DOWN`.
    fn deactivate(&mut self, ctx: &mut ActorContext<'_, S>) {
        ctx.commit_deactivation();
    }

    /// `Reactions::INIT`: return `false` to veto continuing activation.
    fn handle_init(&mut self, _ctx: &mut ActorContext<'_, S>) -> bool {
        true
    }

    /// `Reactions::SHUTDOWN`: return `false` to veto continuing shutdown.
    fn handle_shutdown(&mut self, _ctx: &mut ActorContext<'_, S>) -> bool {
        true
    }

    /// `Reactions::START`: fires once at `INITIALIZED -> OPERATIONAL`.
    fn handle_start(&mut self, _ctx: &mut ActorContext<'_, S>) -> bool {
        true
    }

    /// `Reactions::SUBSCRIPTION`: fires after a new point is recorded.
    fn handle_subscription(&mut self, _ctx: &mut ActorContext<'_, S>, _point: &SubscriptionPoint) -> bool {
        true
    }

    /// `Reactions::UNSUBSCRIPTION`: fires after a point is removed.
    fn handle_unsubscription(&mut self, _ctx: &mut ActorContext<'_, S>, _point: &SubscriptionPoint) -> bool {
        true
    }
}
