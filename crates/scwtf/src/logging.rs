//! Log setup for the plugin process
//!
//! Stdout carries the host protocol, so logs go to stderr.

use tracing_subscriber::EnvFilter;

/// Filter directives, e.g. `SCW_LOG=scwtf=debug`
pub const LOG_ENV: &str = "SCW_LOG";

const DEFAULT_DIRECTIVE: &str = "warn";

/// Install the global subscriber. Returns false if one was already set.
pub fn init_logging() -> bool {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .is_ok()
}

/// `SCW_LOG`, else `RUST_LOG`, else warnings only
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_scw_log_takes_precedence() {
        temp_env::with_vars(
            [(LOG_ENV, Some("scwtf=debug")), ("RUST_LOG", Some("error"))],
            || {
                assert_eq!(env_filter().to_string(), "scwtf=debug");
            },
        );
        temp_env::with_vars([(LOG_ENV, None), ("RUST_LOG", Some("error"))], || {
            assert_eq!(env_filter().to_string(), "error");
        });
        temp_env::with_vars([(LOG_ENV, None::<&str>), ("RUST_LOG", None)], || {
            assert_eq!(env_filter().to_string(), "warn");
        });
    }
}
