//! Tracing setup for the command-line binaries.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter directives used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_DIRECTIVES: &str = "deepscan=info,ort=warn,onnxruntime=warn";

/// `RUST_LOG` when it is set and valid, otherwise [`DEFAULT_DIRECTIVES`].
pub fn build_env_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|s| !s.trim().is_empty())
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Initialize tracing on stderr.
///
/// `LOG_FORMAT=json` switches to JSON lines. A `RUST_LOG` value replaces the
/// default directives. Safe to call more than once.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let rust_log = std::env::var("RUST_LOG").ok();
    let env_filter = build_env_filter(rust_log.as_deref());

    let result = if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .try_init()
    };

    // Already initialized (tests, repeated calls).
    let _ = result;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn test_rust_log_debug_is_kept() {
        let filter = build_env_filter(Some("deepscan=debug"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
        assert!(filter.to_string().contains("deepscan=debug"));
        assert!(!filter.to_string().contains("deepscan=info"));
    }

    #[test]
    fn test_defaults_without_rust_log() {
        for rust_log in [None, Some(""), Some("   ")] {
            let filter = build_env_filter(rust_log);
            assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
            assert!(filter.to_string().contains("deepscan=info"));
        }
    }

    #[test]
    fn test_invalid_rust_log_falls_back() {
        let filter = build_env_filter(Some("deepscan=notalevel"));
        assert!(filter.to_string().contains("deepscan=info"));
    }
}
