use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt};

static TRACE_INIT: Once = Once::new();

/// Routes log output through the test harness; honours `RUST_LOG`, quiet otherwise.
pub(crate) fn trace_init() {
    TRACE_INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
