use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` wins over the passed level.
pub fn init_tracer(max_level: Level) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{}={max_level},tower_http=info,hyper=warn",
            env!("CARGO_CRATE_NAME")
        ))
    });
    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(filter)
        .init();
}
