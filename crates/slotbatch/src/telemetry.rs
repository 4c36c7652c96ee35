use tracing_log::LogTracer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Route `log` and `tracing` output to stderr through one subscriber.
///
/// `RUST_LOG` wins when it parses; otherwise `fallback` is used, for example
/// `"warn"` for the demo binary or `"slotbatch=trace"` while debugging slot
/// growth. Only the first successful call installs anything.
pub fn init_with_default(fallback: &str) {
    // The bridge must be in place before any `log` macro fires.
    let _ = LogTracer::init();

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(fallback),
    };
    let stderr_layer = fmt::layer()
        .compact()
        .with_target(true)
        .with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .try_init();
}

pub fn init() {
    init_with_default("info");
}

/// Silence all spans and events so instrumented pushes cost nothing in benches.
pub fn init_for_benchmarks() {
    let _ = tracing_subscriber::registry()
        .with(LevelFilter::OFF)
        .try_init();
}
