//! Tracing subscriber setup for the binary.
//!
//! Fatal conditions are `error!` events carrying `fatal = true`; they need
//! manual follow-up and are what alerting should key on.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Default level for the given verbosity flag
pub fn level_for(verbose: bool) -> Level {
    if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `level`. Logs go to stderr so command
/// output on stdout stays clean. Only the first call has an effect.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init()
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_verbosity() {
        assert_eq!(level_for(true), Level::DEBUG);
        assert_eq!(level_for(false), Level::INFO);
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_tracing(false, Level::WARN);
        init_tracing(true, Level::DEBUG);
    }
}
