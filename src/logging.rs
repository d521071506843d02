//! Tracing subscriber setup for the skyglass host.
//!
//! Console output with uptime timestamps, module paths and levels. The
//! configured level is the default filter; `RUST_LOG` overrides it.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor the config names one.
/// SDL and the MQTT client are chatty at debug level.
pub const DEFAULT_FILTER: &str = "info,rumqttc=warn";

/// Build the filter: `RUST_LOG` wins, then `level`, then [`DEFAULT_FILTER`]
pub fn build_filter(level: Option<&str>) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    level
        .filter(|l| !l.trim().is_empty())
        .and_then(|l| EnvFilter::try_new(l).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber.
///
/// Safe to call more than once; later calls are ignored (tests and the host
/// may both try).
pub fn init_logging(level: Option<&str>) {
    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let _ = tracing_subscriber::registry()
        .with(build_filter(level))
        .with(console_layer)
        .try_init();
}
