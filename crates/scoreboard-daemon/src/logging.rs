use tracing_subscriber::EnvFilter;

/// Install a stderr `tracing-subscriber` layer filtered by `filter_directive`
/// (overridden by `RUST_LOG` if set).
pub fn init(filter_directive: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directive));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
