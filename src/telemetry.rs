use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "info,order_pipeline=debug";

/// Install the global tracing subscriber. Call once, from a binary.
///
/// `RUST_LOG` overrides the default filter. `local` and `dev` log
/// human-readable lines; every other environment logs JSON.
pub fn init(environment: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(filter);

    if is_human_readable(environment) {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    } else {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    }
}

fn is_human_readable(environment: &str) -> bool {
    matches!(environment, "local" | "dev")
}
