//! Logging setup.
//!
//! Library code only emits `tracing` events. Binaries and test harnesses can
//! call [`init`] to print them.
//!
//! # Environment Variables
//!
//! - `LATCHKEY_LOG` - filter directives, e.g. `latchkey_core=debug`
//! - `RUST_LOG` - used when `LATCHKEY_LOG` is unset
//!
//! Without either, `info` is used.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Default filter directive.
pub const DEFAULT_FILTER: &str = "info";

/// Build the filter from the environment.
pub fn env_filter() -> EnvFilter {
    std::env::var("LATCHKEY_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a global fmt subscriber.
///
/// Returns `false` if a global subscriber was already installed, so calling
/// this more than once is harmless.
pub fn init() -> bool {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(true).with_thread_names(true))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice() {
        let _ = init();
        assert!(!init());
    }
}
