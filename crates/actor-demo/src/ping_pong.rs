//! A ping/pong pair, grounded in `original_source/tests/141-thread_ping-pong.cpp`'s
//! `pinger_t`/`ponger_t` and its "ping/pong" test case: `Pinger` opens with a
//! request, `Ponger` answers every one it sees, and `Pinger` shuts the whole
//! supervisor down on the first reply.

use std::time::Duration;

use actor_core::{Address, ActorContext, ActorHooks, ErrorChain, Outbox, Request, ShutdownSupervisor};
use tracing::info;

/// Sent to a `Ponger`; carries nothing, the request's `reply_to`/`request_id`
/// are enough to answer it.
pub struct PingMsg;

/// `Ponger`'s reply to a `PingMsg`.
pub struct PongMsg;

#[derive(Default)]
pub struct Ponger {
    pub pings_received: u32,
    pub pongs_sent: u32,
}

impl ActorHooks for Ponger {
    fn on_init_finish(&mut self, ctx: &mut ActorContext<'_, Self>) {
        let own_addr = ctx.address().clone();
        ctx.subscribe::<Request<PingMsg>>(&own_addr, |state: &mut Self, req: &Request<PingMsg>, outbox: &Outbox| {
            state.pings_received += 1;
            info!(count = state.pings_received, "ponger: ping received");
            outbox.respond(&req.reply_to, req.request_id, PongMsg);
            state.pongs_sent += 1;
        });
    }
}

pub struct Pinger {
    ponger: Address,
    supervisor_addr: Address,
    pub pings_sent: u32,
    pub pongs_received: u32,
}

impl Pinger {
    pub fn new(ponger: Address, supervisor_addr: Address) -> Self {
        Self { ponger, supervisor_addr, pings_sent: 0, pongs_received: 0 }
    }
}

impl ActorHooks for Pinger {
    fn on_start(&mut self, ctx: &mut ActorContext<'_, Self>) {
        self.pings_sent += 1;
        info!("pinger: sending ping");
        let ponger = self.ponger.clone();
        ctx.request::<PingMsg, PongMsg>(
            &ponger,
            PingMsg,
            Duration::from_millis(200),
            |state: &mut Self, _pong: &PongMsg, outbox: &Outbox| {
                state.pongs_received += 1;
                info!(count = state.pongs_received, "pinger: pong received, shutting down");
                outbox.send(&state.supervisor_addr, ShutdownSupervisor { reason: ErrorChain::new("pinger", "pong received") });
            },
            |_state: &mut Self, _outbox: &Outbox| {
                tracing::warn!("pinger: ping timed out");
            },
        );
    }
}
