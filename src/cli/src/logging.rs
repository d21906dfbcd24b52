//! Diagnostic output for the binary.

use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

/// Filter applied when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Build the stderr subscriber handed to the pipeline.
///
/// Nothing is installed globally; the pipeline scopes this dispatch to
/// its own run.
pub fn dispatch_from_env() -> Dispatch {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    dispatch_with_filter(filter)
}

pub fn dispatch_with_filter(filter: EnvFilter) -> Dispatch {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .finish();
    Dispatch::new(subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_levels() {
        let dispatch = dispatch_with_filter(EnvFilter::new(DEFAULT_FILTER));
        tracing::dispatcher::with_default(&dispatch, || {
            assert!(tracing::enabled!(tracing::Level::INFO));
            assert!(!tracing::enabled!(tracing::Level::DEBUG));
        });
    }

    #[test]
    fn test_dispatch_is_not_global() {
        let _dispatch = dispatch_with_filter(EnvFilter::new("debug"));
        assert!(!tracing::enabled!(tracing::Level::ERROR));
    }
}
