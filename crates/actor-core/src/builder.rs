//! The fluent configuration surface for standing up a supervisor
//! (spec.md §6): `timeout`, `locality`, `configurer`, `finish`.

use std::time::Duration;

use crate::message::Envelope;
use crate::supervisor::Supervisor;
use crate::system::System;

pub struct SupervisorBuilder<'a> {
    system: &'a System,
    parent: Option<Supervisor>,
    timeout: Duration,
    locality_tag: Option<u64>,
    configurer: Option<Box<dyn FnOnce(&Supervisor)>>,
    interceptor: Option<Box<dyn FnMut(&Envelope) -> bool>>,
}

impl<'a> SupervisorBuilder<'a> {
    pub(crate) fn new(system: &'a System) -> Self {
        Self { system, parent: None, timeout: Duration::from_secs(5), locality_tag: None, configurer: None, interceptor: None }
    }

    /// Shutdown-cascade deadline for this supervisor's children (spec.md
    /// §4.4a). Default is five seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Places this supervisor in the locality identified by `tag`.
    /// Supervisors sharing a tag share one queue and can subscribe to
    /// each other's addresses directly, without the foreign-subscription
    /// handshake. Omit to get a fresh, exclusive locality.
    pub fn locality(mut self, tag: u64) -> Self {
        self.locality_tag = Some(tag);
        self
    }

    /// Registers this supervisor as a child of `parent`: escalated errors
    /// walk up to it, and `parent.shutdown()` cascades down into this
    /// supervisor exactly as it would into a plain actor created with
    /// `create_actor`.
    pub fn parent(mut self, parent: &Supervisor) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Runs `f` against the freshly created supervisor before `finish`
    /// returns it — the usual place to create this supervisor's first
    /// actors.
    pub fn configurer(mut self, f: impl FnOnce(&Supervisor) + 'static) -> Self {
        self.configurer = Some(Box::new(f));
        self
    }

    /// Installs an interception hook (spec.md §4.4d): called with every
    /// envelope this supervisor is about to process, before any built-in
    /// or user handler sees it. Returning `false` drops the envelope
    /// instead of delivering it. There is no subclassing in Rust to
    /// override a virtual `intercept`, so the hook is a plain closure
    /// instead — the default (no hook installed) delivers everything.
    pub fn interceptor(mut self, f: impl FnMut(&Envelope) -> bool + 'static) -> Self {
        self.interceptor = Some(Box::new(f));
        self
    }

    pub fn finish(self) -> Supervisor {
        let locality = self.system.locality_for(self.locality_tag);
        let parent_addr = self.parent.as_ref().map(Supervisor::address);
        let supervisor = Supervisor::new(locality, parent_addr, self.system.weak(), self.timeout);
        if let Some(parent) = &self.parent {
            parent.register_child_supervisor(&supervisor);
        }
        if let Some(interceptor) = self.interceptor {
            supervisor.set_interceptor(interceptor);
        }
        if let Some(configurer) = self.configurer {
            configurer(&supervisor);
        }
        supervisor
    }
}

impl System {
    pub fn supervisor(&self) -> SupervisorBuilder<'_> {
        SupervisorBuilder::new(self)
    }
}
