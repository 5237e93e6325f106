//! Demo actors exercising the runtime end to end: a ping/pong pair
//! (`ping_pong`) and a deliberately unresponsive child (`unresponsive`),
//! grounded in `original_source/tests/141-thread_ping-pong.cpp`'s
//! "ping/pong" and "no shutdown confirmation" cases.

pub mod ping_pong;
pub mod tracing_setup;
pub mod unresponsive;
