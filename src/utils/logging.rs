//! Logging setup for applications embedding the loader
//!
//! Keeps initialization small:
//! - RUST_LOG always wins when set
//! - otherwise the filter from [`LoggingConfig`] is used
//! - otherwise everything logs at `info`
//!
//! # Usage
//! ```rust,no_run
//! use component_loader::utils::init_logging;
//!
//! init_logging(None); // RUST_LOG or "info"
//! ```
//!
//! [`LoggingConfig`]: crate::config::LoggingConfig

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither RUST_LOG nor a configured filter is present
pub const DEFAULT_FILTER: &str = "info";

/// Pick the filter directive to use
///
/// `rust_log` is the value of the RUST_LOG variable, if set.
pub fn effective_filter(rust_log: Option<&str>, configured: Option<&str>) -> String {
    fn is_set(filter: &&str) -> bool {
        !filter.trim().is_empty()
    }

    rust_log
        .filter(is_set)
        .or(configured.filter(is_set))
        .unwrap_or(DEFAULT_FILTER)
        .to_string()
}

fn env_filter(configured: Option<&str>) -> EnvFilter {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directives = effective_filter(rust_log.as_deref(), configured);
    EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize human-readable logging to stderr
///
/// # Arguments
/// * `filter` - Optional filter from config (e.g. "debug", "component_loader=trace").
///   Ignored when RUST_LOG is set.
///
/// Does nothing if a global subscriber is already installed.
pub fn init_logging(filter: Option<&str>) {
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(std::env::var_os("NO_COLOR").is_none()),
        )
        .with(env_filter(filter))
        .try_init();
}

/// Initialize JSON logging, for log aggregation
#[cfg(feature = "json-logging")]
pub fn init_json_logging(filter: Option<&str>) {
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(env_filter(filter))
        .try_init();
}

/// Initialize logging from the `[logging]` section of a [`LoaderConfig`]
///
/// JSON output falls back to plain output when the `json-logging` feature is
/// disabled.
///
/// ```rust,no_run
/// use component_loader::config::LoaderConfig;
/// use component_loader::utils::init_logging_from_config;
///
/// let config = LoaderConfig::default();
/// init_logging_from_config(config.logging.as_ref());
/// ```
///
/// [`LoaderConfig`]: crate::config::LoaderConfig
pub fn init_logging_from_config(config: Option<&crate::config::LoggingConfig>) {
    let filter = config.and_then(|c| c.filter.as_deref());

    if config.is_some_and(|c| c.json_format) {
        #[cfg(feature = "json-logging")]
        {
            init_json_logging(filter);
            return;
        }
    }

    init_logging(filter);
}
