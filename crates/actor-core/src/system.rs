//! System context: the host-visible root of a running actor system
//! (spec.md §4.5). Owns the `on_error` escalation callback and the set of
//! localities the system's supervisors are spread across.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::warn;

use crate::error::ErrorChain;
use crate::locality::{Locality, LocalityId};

pub(crate) struct SystemInner {
    on_error: Box<dyn FnMut(&ErrorChain)>,
}

impl SystemInner {
    pub(crate) fn report_error(this: &Rc<RefCell<Self>>, chain: ErrorChain) {
        (this.borrow_mut().on_error)(&chain);
    }
}

/// The root handle a host program holds onto for the life of the actor
/// system. Not `Send`/`Sync` — an actor system lives on the thread(s) that
/// created it, per spec.md §5.
pub struct System {
    inner: Rc<RefCell<SystemInner>>,
    localities: RefCell<HashMap<LocalityId, Rc<RefCell<Locality>>>>,
    next_locality: Cell<u64>,
}

impl System {
    /// Builds a system whose uncaught errors are reported to `on_error`.
    /// A bare `warn!` logger is a reasonable default if the host doesn't
    /// need its own handling.
    pub fn new(on_error: impl FnMut(&ErrorChain) + 'static) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SystemInner { on_error: Box::new(on_error) })),
            localities: RefCell::new(HashMap::new()),
            next_locality: Cell::new(0),
        }
    }

    /// A system whose errors are just logged via `tracing::warn!`.
    pub fn with_default_logging() -> Self {
        Self::new(|chain| warn!(%chain, "unhandled actor error"))
    }

    pub(crate) fn weak(&self) -> Weak<RefCell<SystemInner>> {
        Rc::downgrade(&self.inner)
    }

    /// Returns the [`Locality`] for `tag`, creating it if this is the
    /// first supervisor to ask for it. Supervisors built with the same
    /// tag share one queue and can subscribe to each other directly; a
    /// `None` tag always gets a freshly minted, exclusive locality.
    pub(crate) fn locality_for(&self, tag: Option<u64>) -> Rc<RefCell<Locality>> {
        match tag {
            Some(t) => {
                let id = LocalityId(t);
                self.localities.borrow_mut().entry(id).or_insert_with(|| Locality::new(id)).clone()
            }
            None => {
                let n = self.next_locality.get();
                self.next_locality.set(n + 1);
                let id = LocalityId(n);
                let loc = Locality::new(id);
                self.localities.borrow_mut().insert(id, Rc::clone(&loc));
                loc
            }
        }
    }

    /// Drains every locality's backlog once, synchronously, and returns
    /// the total number of envelopes processed. Suitable for driving the
    /// system from a non-async host loop (a GUI tick, a custom reactor).
    pub fn do_process(&self) -> usize {
        self.localities.borrow().values().map(|l| l.borrow_mut().do_process()).sum()
    }

    /// Runs every locality's loop, cooperatively multiplexed on the
    /// current `LocalSet`, until `stop` resolves. Each iteration awaits
    /// either the next envelope or an idle-poll tick (so shutdown timers
    /// and request timeouts are still checked even with no traffic).
    pub async fn run(&self, stop: impl Future<Output = ()>) {
        let localities: Vec<_> = self.localities.borrow().values().cloned().collect();
        let mut set = tokio::task::JoinSet::new();
        for loc in localities {
            set.spawn_local(async move {
                loop {
                    loc.borrow_mut().run_once(Duration::from_millis(50)).await;
                }
            });
        }
        stop.await;
        set.abort_all();
        while set.join_next().await.is_some() {}
    }
}
