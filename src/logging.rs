//! Subscriber bootstrap for library consumers and tests.

use tracing::Level;

use crate::config::Settings;

/// Installs a stderr fmt subscriber, DEBUG when `settings.debug` is set and
/// INFO otherwise.
///
/// Returns `false` if a global subscriber was already installed, in which case
/// the existing one is left alone.
pub fn init(settings: &Settings) -> bool {
    let level = if settings.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}
