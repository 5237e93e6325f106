//! A child that never gets a chance to confirm its own shutdown in time,
//! grounding `original_source/tests/141-thread_ping-pong.cpp`'s
//! `bad_actor_t` and its "no shutdown confirmation" case. `BadActor` has
//! no special behavior of its own — see `DESIGN.md`'s "Scenario 7
//! realization" note for how the demo drives the actual race: calling
//! `Supervisor::shutdown`, letting real time pass beyond the shutdown
//! timeout without ever pumping the system, then pumping once.

use actor_core::ActorHooks;

#[derive(Default)]
pub struct BadActor;

impl ActorHooks for BadActor {}
