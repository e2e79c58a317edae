//! Tracing setup. Logs always go to stderr; stdout carries MCP traffic and
//! tool output.

use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive, e.g. `forkarcade=debug`.
pub const ENV_LOG: &str = "FORKARCADE_LOG";

/// Initialise logging. `verbose` lowers the default level from `warn` to
/// `debug`; [`ENV_LOG`] overrides both.
pub fn init(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
