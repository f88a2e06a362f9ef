/*!
Logging setup for the command line.

`RUST_LOG` wins when set. Otherwise debug builds (or `--verbose`) log at
`debug` and release builds at `info`. Logs go to stderr so that command output
on stdout stays machine-readable.
*/

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

fn default_directives(verbose: bool) -> &'static str {
    if verbose || cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

pub fn setup_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_filter(filter);
    let registry = tracing_subscriber::registry().with(fmt_layer);
    registry.init();

    #[cfg(feature = "profiling")]
    tracing::info!("Logging initialized (profiling scopes reported as tracing spans)");
    #[cfg(not(feature = "profiling"))]
    tracing::debug!("Logging initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_forces_debug() {
        assert_eq!(default_directives(true), "debug");
    }
}
