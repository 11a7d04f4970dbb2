//! Tracing setup for the binary
//!
//! `RUST_LOG` wins when set; otherwise the crate logs at `info`, or `debug`
//! with `--verbose`. Output goes to stderr so command output stays clean.

use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

static TRACING_INIT: Once = Once::new();

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "balancebook=debug"
    } else {
        "balancebook=info"
    }
}

/// Install the global subscriber; later calls do nothing
pub fn init_tracing(verbose: bool) {
    TRACING_INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false), "balancebook=info");
        assert_eq!(default_directive(true), "balancebook=debug");
    }

    #[test]
    fn test_init_twice() {
        init_tracing(false);
        init_tracing(true);
    }
}
