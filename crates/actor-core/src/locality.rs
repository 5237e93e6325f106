//! A locality: the equivalence class of supervisors driven by one queue on
//! one thread (spec.md §5).

use std::collections::HashMap;
use std::rc::Rc;
use std::cell::RefCell;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace, warn};

use crate::address::{Address, AddressId};
use crate::message::Envelope;
use crate::supervisor::SupervisorCore;

/// Opaque tag identifying a locality. Supervisors created with the same
/// tag via [`crate::builder::SupervisorBuilder::locality`] share one
/// queue; different tags get independent `Locality` instances (and, when
/// run through [`crate::system::System::run`], independent tasks).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct LocalityId(pub(crate) u64);

/// Owns the single inbound queue a set of supervisors share, and demuxes
/// each popped envelope to whichever supervisor owns its destination.
pub struct Locality {
    pub(crate) id: LocalityId,
    sender: UnboundedSender<Envelope>,
    receiver: UnboundedReceiver<Envelope>,
    supervisors: HashMap<AddressId, Rc<RefCell<SupervisorCore>>>,
}

impl Locality {
    pub(crate) fn new(id: LocalityId) -> Rc<RefCell<Self>> {
        let (sender, receiver) = mpsc::unbounded_channel();
        Rc::new(RefCell::new(Self { id, sender, receiver, supervisors: HashMap::new() }))
    }

    pub(crate) fn sender(&self) -> UnboundedSender<Envelope> {
        self.sender.clone()
    }

    pub(crate) fn register(&mut self, id: AddressId, supervisor: Rc<RefCell<SupervisorCore>>) {
        self.supervisors.insert(id, supervisor);
    }

    pub(crate) fn contains(&self, id: AddressId) -> bool {
        self.supervisors.contains_key(&id)
    }

    /// Looks up the supervisor registered under `id`, if it's still part
    /// of this locality.
    pub(crate) fn get(&self, id: AddressId) -> Option<Rc<RefCell<SupervisorCore>>> {
        self.supervisors.get(&id).cloned()
    }

    pub(crate) fn supervisor_ids(&self) -> Vec<AddressId> {
        self.supervisors.keys().copied().collect()
    }

    fn route(&mut self, envelope: Envelope) {
        let dest_supervisor = envelope.destination().supervisor_id();
        match self.supervisors.get(&dest_supervisor) {
            Some(sup) => {
                trace!(supervisor = ?dest_supervisor, ty = envelope.type_name(), "dispatching envelope");
                SupervisorCore::handle_envelope(sup, envelope);
            }
            None => warn!(supervisor = ?dest_supervisor, ty = envelope.type_name(), "envelope for unknown/departed supervisor dropped"),
        }
    }

    /// Checks every supervisor's shutdown and request timers against
    /// envelopes queued so far, then drains whatever is currently
    /// waiting. Safe to call from a synchronous, non-async host loop —
    /// it performs no `.await`.
    ///
    /// Timeouts are checked *before* the drain so a deadline that has
    /// already passed still escalates even though the overdue child's
    /// own response (e.g. a belated `ShutdownRequest` completion) is
    /// sitting right behind it in the same queue — draining first would
    /// let every timeout race its own cure.
    pub fn do_process(&mut self) -> usize {
        let now = tokio::time::Instant::now();
        for sup in self.supervisors.values() {
            SupervisorCore::check_timeouts(sup, now);
        }
        let mut processed = 0;
        while let Ok(envelope) = self.receiver.try_recv() {
            self.route(envelope);
            processed += 1;
        }
        processed
    }

    /// Awaits either the next envelope or the nearest pending request
    /// deadline across this locality's supervisors, then drains the
    /// backlog with [`Locality::do_process`]. Intended for a dedicated
    /// Tokio task per locality, one per [`crate::system::System::run`]
    /// call.
    pub async fn run_once(&mut self, idle_poll: Duration) {
        tokio::select! {
            maybe = self.receiver.recv() => {
                if let Some(envelope) = maybe {
                    self.route(envelope);
                }
            }
            _ = tokio::time::sleep(idle_poll) => {
                debug!(locality = self.id.0, "idle poll tick");
            }
        }
        self.do_process();
    }
}
