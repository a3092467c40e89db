//! Test logging utilities for effect runtime tests
//!
//! `RUST_LOG` overrides the default level.

use std::sync::Once;

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

static INIT: Once = Once::new();
static DEBUG_INIT: Once = Once::new();

/// Initialize test logging at info level (called once per test run)
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = init_tracing_subscriber("info");
    });
}

/// Initialize test logging at trace level for the runtime (called once per test run)
pub fn init_debug_logging() {
    DEBUG_INIT.call_once(|| {
        let _ = init_tracing_subscriber("info,capfx_core=trace");
    });
}

fn init_tracing_subscriber(level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let fmt_layer = fmt::layer()
        .pretty()
        .with_target(true)
        .with_level(true)
        .with_test_writer();
    tracing::subscriber::set_global_default(Registry::default().with(env_filter).with(fmt_layer))?;

    Ok(())
}
