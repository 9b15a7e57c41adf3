use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset
fn default_directive(debug: bool) -> &'static str {
    if debug { "stagehand=debug" } else { "stagehand=info" }
}

/// Installs the global subscriber; `RUST_LOG` takes precedence over `debug`
pub fn init(debug: bool) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive(debug).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
