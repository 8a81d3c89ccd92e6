//! Logging for `ksr`.
//!
//! The tool is a one-shot batch operation, not a long-running service:
//! there is no config file to reload and no target but stderr, so this is
//! a thin wrapper around [`tracing_subscriber`] rather than the reloadable,
//! multi-target logger a daemon needs.

use tracing_subscriber::EnvFilter;

/// Initializes the global `tracing` subscriber from the command line's
/// `-v` count.
///
/// `RUST_LOG` always wins when set, matching `EnvFilter`'s usual
/// precedence; otherwise `-v` steps the default level from `warn` (silent)
/// up through `trace`. Output goes to stderr, since stdout is reserved for
/// filenames and bundles.
///
/// # Panics
///
/// Panics if a global `tracing` subscriber has already been installed.
pub fn init(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}
