use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

use crate::config::LogLevel;

static INIT: OnceLock<()> = OnceLock::new();

/// Initialize stderr logging once; `LogLevel::Off` leaves logging disabled.
pub fn init(level: LogLevel) {
    INIT.get_or_init(|| {
        let Some(level) = level.as_tracing_level() else {
            return;
        };

        let filter = EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy();

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .init();
    });
}
