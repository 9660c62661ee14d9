use tracing_subscriber::prelude::*;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    EnvFilter,
};

/// Install the global subscriber. Defaults to `info`; `RUST_LOG` overrides,
/// e.g. `RUST_LOG=cimage_core=trace` to see every chunk being compressed.
///
/// Logs go to stderr so extracted data on stdout stays clean.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let is_debug = std::env::var("RUST_LOG")
        .map(|filter| filter.contains("debug") || filter.contains("trace"))
        .unwrap_or(false);

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(is_debug)
        .with_timer(fmt::time::uptime())
        .with_span_events(if is_debug { FmtSpan::CLOSE } else { FmtSpan::NONE });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
