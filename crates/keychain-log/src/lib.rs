// ABOUTME: Shared logging setup for keychain binaries
// ABOUTME: Maps -v counts to a level; RUST_LOG always wins when set

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Map a `-v` repeat count to the default log level.
pub fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Logging to stderr so stdout stays clean for command output.
///
/// Default level comes from `verbosity`; a `RUST_LOG` directive overrides it.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::builder()
        .with_default_directive(level_for(verbosity).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbosity >= 2)
        .init();
}
