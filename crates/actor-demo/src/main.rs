//! # Actor demo
//!
//! Drives two small scenarios against the runtime in [`actor_core`]:
//!
//! 1. [`ping_pong`] — a `Pinger`/`Ponger` pair that exchange one
//!    request/reply before `Pinger` shuts its supervisor down.
//! 2. [`unresponsive`] — a child whose `ShutdownRequest` is still queued
//!    when its supervisor's deadline elapses, exercising the
//!    shutdown-timeout escalation path.
//!
//! Both are grounded in `original_source/tests/141-thread_ping-pong.cpp`.

use std::time::Duration;

use actor_core::{default_plugins, testkit, ErrorChain, System};
use actor_demo::ping_pong::{Pinger, Ponger};
use actor_demo::tracing_setup::setup_tracing;
use actor_demo::unresponsive::BadActor;
use tracing::{info, info_span, Instrument};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    setup_tracing();

    async {
        info!("running ping/pong demo");
        let system = System::with_default_logging();
        let sup = system.supervisor().timeout(Duration::from_millis(200)).finish();

        let ponger = sup.create_actor(Ponger::default(), default_plugins());
        let pinger = sup.create_actor(Pinger::new(ponger.address(), sup.address()), default_plugins());

        testkit::pump(&system, 10);

        info!(
            pinger_state = ?pinger.state(),
            ponger_state = ?ponger.state(),
            supervisor_state = ?sup.state(),
            "ping/pong settled",
        );
    }
    .instrument(info_span!("ping_pong"))
    .await;

    async {
        info!("running unresponsive-child demo");
        let (system, errors) = testkit::recording_system();
        let sup = system.supervisor().timeout(Duration::from_millis(20)).finish();
        let bad = sup.create_actor(BadActor::default(), default_plugins());

        sup.shutdown(ErrorChain::new("demo", "tearing down unresponsive child"));
        // Let the shutdown deadline actually elapse before ever pumping,
        // so `bad`'s queued `ShutdownRequest` is still undelivered when
        // `check_timeouts` looks for it.
        tokio::time::sleep(Duration::from_millis(50)).await;
        testkit::pump(&system, 1);

        info!(
            bad_state = ?bad.state(),
            supervisor_state = ?sup.state(),
            escalated_errors = errors.borrow().len(),
            "unresponsive child handled",
        );
    }
    .instrument(info_span!("unresponsive_child"))
    .await;

    info!("demo complete");
}
