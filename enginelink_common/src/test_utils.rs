//! Test helpers shared by the enginelink crates.

use std::sync::Once;

use tracing_subscriber::{
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

static INIT: Once = Once::new();

/// Initializes logging for tests.
/// FMT logging is enabled by passing the normal `RUST_LOG` environment variable options.
pub fn logger() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env()))
            .try_init();
    });
}
