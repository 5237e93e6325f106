/// Initializes structured logging for the demo binary.
///
/// Set `RUST_LOG` to control verbosity, e.g. `RUST_LOG=actor_demo=debug`.
pub fn setup_tracing() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();
}
