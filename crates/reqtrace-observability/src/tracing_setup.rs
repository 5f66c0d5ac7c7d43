//! Standard tracing subscriber setup for binaries.

/// Target on which statement timing records are emitted.
pub const TIME_LOG_TARGET: &str = "time_log";

/// Initialize a tracing subscriber with env-based filtering.
///
/// Default directives:
/// - `reqtrace=info`
/// - `time_log=debug`
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("reqtrace=info".parse().unwrap_or_default())
        .add_directive(
            format!("{TIME_LOG_TARGET}=debug")
                .parse()
                .unwrap_or_default(),
        );

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
