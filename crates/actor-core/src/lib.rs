//! A cooperative actor/supervisor runtime: lifecycle state machine,
//! subscription protocol (including cross-locality "foreign"
//! subscriptions), and a supervision tree with timeout-bounded shutdown
//! cascades.
//!
//! The pieces, in the order a new reader should probably look at them:
//! [`address`] and [`message`] (identity and the envelope), [`subscription`]
//! (the dispatch table), [`plugin`] and [`plugins`] (the init/shutdown
//! veto chain and its built-ins), [`actor`] (the state machine itself),
//! [`supervisor`] (children, timers, the foreign-subscription bridge),
//! [`system`] and [`builder`] (the host-facing entry points).

mod actor;
mod address;
mod builder;
mod error;
mod locality;
mod message;
mod plugin;
mod plugins;
mod reaction;
mod request;
mod subscription;
mod supervisor;
mod system;

pub mod testkit;

pub use actor::{Actor, ActorContext, ActorHooks, ActorState, Outbox, ShutdownRequest};
pub use address::{Address, AddressId};
pub use builder::SupervisorBuilder;
pub use error::{ErrorChain, ErrorLink, FrameworkError};
pub use locality::LocalityId;
pub use message::{Envelope, Message};
pub use plugin::Plugin;
pub use plugins::{default_plugins, Lifetime, Starter};
pub use reaction::Reactions;
pub use request::{Reply, Request, RequestId};
pub use subscription::{HandlerId, SubscriptionPoint};
pub use supervisor::{ShutdownSupervisor, Supervisor};
pub use system::System;
