//! Console logging built on `tracing-subscriber`.
//!
//! The library itself only emits `tracing` events; hosts that want them on
//! stderr call [`init_console_logging`] once at startup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a compact stderr subscriber.
///
/// `RUST_LOG` wins over `default_level` when it parses; an unparsable
/// `default_level` falls back to `info`. Calling this again (or after another
/// subscriber was installed) is a no-op.
pub fn init_console_logging(default_level: &str) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();

    let _ = tracing_subscriber::registry()
        .with(console_filter(rust_log.as_deref(), default_level))
        .with(fmt::layer().with_target(true).compact())
        .try_init();
}

fn console_filter(rust_log: Option<&str>, default_level: &str) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_new(default_level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}
