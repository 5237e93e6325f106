use std::time::Duration;

use actor_core::{default_plugins, testkit, ActorState, ErrorChain, System};
use actor_demo::ping_pong::{Pinger, Ponger};
use actor_demo::unresponsive::BadActor;

#[test]
fn ping_pong_settles_and_shuts_down() {
    let system = System::with_default_logging();
    let sup = system.supervisor().timeout(Duration::from_millis(200)).finish();

    let ponger = sup.create_actor(Ponger::default(), default_plugins());
    let pinger = sup.create_actor(Pinger::new(ponger.address(), sup.address()), default_plugins());

    testkit::pump(&system, 10);

    assert_eq!(ponger.state(), ActorState::ShutDown);
    assert_eq!(pinger.state(), ActorState::ShutDown);
    assert_eq!(sup.state(), ActorState::ShutDown);
}

#[tokio::test]
async fn unresponsive_child_escalates_shutdown_timeout() {
    let (system, errors) = testkit::recording_system();
    let sup = system.supervisor().timeout(Duration::from_millis(20)).finish();
    let bad = sup.create_actor(BadActor::default(), default_plugins());

    sup.shutdown(ErrorChain::new("test", "tearing down unresponsive child"));
    assert_ne!(bad.state(), ActorState::ShutDown, "shutdown request is still only queued");

    tokio::time::sleep(Duration::from_millis(50)).await;
    testkit::pump(&system, 1);

    let escalated = errors.borrow();
    assert!(
        escalated.iter().any(|chain| chain.to_string().contains("shutdown")),
        "expected a shutdown-timeout error to have escalated, got {escalated:?}",
    );
    assert_eq!(sup.state(), ActorState::ShutDown);
}
