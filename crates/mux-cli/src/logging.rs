//! Tracing setup. The timezone-configurable timer mirrors `codex-core`'s
//! `logging.rs`: one timer type, runtime-switched, rather than two code paths
//! that differ only in `chrono::Local` vs `chrono::Utc`.

use crate::config::Timezone;
use std::fmt;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct ConfigurableTimer {
    timezone: Timezone,
}

impl FormatTime for ConfigurableTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        match self.timezone {
            Timezone::Local => {
                let now = chrono::Local::now();
                write!(w, "{}", now.format("%Y-%m-%d %H:%M:%S%.3f"))
            }
            Timezone::Utc => {
                let now = chrono::Utc::now();
                write!(w, "{}", now.format("%Y-%m-%d %H:%M:%S%.3fZ"))
            }
        }
    }
}

pub fn init(level: &str, timezone: Timezone) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ConfigurableTimer { timezone })
        .with_target(false)
        .init();
}
