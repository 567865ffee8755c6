//! Logging and metric setup shared by every subcommand.

use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing::level_filters::LevelFilter;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

/// Counters emitted by the pipeline, as (name, description).
const COUNTERS: [(&str, &str); 3] = [
    (
        "ohdl_cache_hit_total",
        "Pages served straight from the page cache.",
    ),
    (
        "ohdl_cache_miss_total",
        "Page cache lookups that fell through to the renderer.",
    ),
    (
        "ohdl_route_fallback_total",
        "Unmatched paths answered by the moved table or the plain-text fallback.",
    ),
];

/// sqlx logs every statement at `info`; the library is read-only and hot.
const QUIET_DIRECTIVES: [&str; 1] = ["sqlx=warn"];

static DESCRIBED: Once = Once::new();

/// Installs the global subscriber for `logging`. `RUST_LOG` still wins over
/// the configured level.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter(logging.level))
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| InfraError::Telemetry(err.to_string()))
}

fn env_filter(level: LevelFilter) -> EnvFilter {
    QUIET_DIRECTIVES.iter().fold(
        EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy(),
        |filter, directive| match directive.parse() {
            Ok(directive) => filter.add_directive(directive),
            Err(_) => filter,
        },
    )
}

/// Registers units and help text for the pipeline counters once per process.
pub fn describe_metrics() {
    DESCRIBED.call_once(|| {
        for (name, help) in COUNTERS {
            describe_counter!(name, Unit::Count, help);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_keeps_level_and_quiets_sqlx() {
        let rendered = env_filter(LevelFilter::DEBUG).to_string();
        assert!(rendered.contains("sqlx=warn"), "{rendered}");
    }

    #[test]
    fn counters_share_the_crate_prefix() {
        assert!(COUNTERS.iter().all(|(name, _)| name.starts_with("ohdl_")));
    }
}
