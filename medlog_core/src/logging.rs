//! Tracing setup for medlog binaries.
//!
//! Log lines go to stderr so command output on stdout stays clean for
//! piping exports. The subscriber is installed before configuration is read,
//! so config loading is logged too; the configured level is applied
//! afterwards through [`LevelHandle`].

use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

/// Level names accepted in the `[logging]` config section
pub const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Whether `level` names a known log level, ignoring case
pub fn is_known_level(level: &str) -> bool {
    LEVELS.iter().any(|known| known.eq_ignore_ascii_case(level))
}

/// Changes the level of the installed subscriber
pub struct LevelHandle {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LevelHandle {
    /// Switch to `level` unless RUST_LOG is set, which always wins
    pub fn set_level(&self, level: &str) {
        if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
            return;
        }
        if let Err(e) = self.handle.reload(EnvFilter::new(level)) {
            tracing::warn!("Unable to change log level to {}: {}", level, e);
        }
    }
}

/// Install the global subscriber at INFO (or RUST_LOG)
pub fn init() -> LevelHandle {
    init_with_level("info")
}

/// Install the global subscriber at `default_level` (or RUST_LOG).
///
/// Calling this twice is harmless; the first subscriber stays installed.
pub fn init_with_level(default_level: &str) -> LevelHandle {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let (filter, handle) = reload::Layer::new(filter);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init();

    LevelHandle { handle }
}

/// Route logs through the test harness so they show up for failing tests
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_levels_ignore_case() {
        assert!(is_known_level("WARN"));
        assert!(is_known_level("debug"));
        assert!(!is_known_level("verbose"));
    }

    #[test]
    fn test_level_handle_reloads_filter() {
        let (layer, handle) = reload::Layer::<EnvFilter, Registry>::new(EnvFilter::new("info"));
        let subscriber = tracing_subscriber::registry().with(layer);
        let levels = LevelHandle { handle };

        tracing::subscriber::with_default(subscriber, || {
            levels.set_level("warn");
            if std::env::var_os(EnvFilter::DEFAULT_ENV).is_none() {
                assert!(!tracing::enabled!(tracing::Level::INFO));
                assert!(tracing::enabled!(tracing::Level::WARN));
            }
        });
    }
}
