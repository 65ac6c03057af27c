use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::{LogFormat, ObservabilityConfig};

/// Initialize structured logging.
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_telemetry(observability: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&observability.log_level))?;

    let registry = tracing_subscriber::registry().with(filter);
    match observability.log_format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?,
    }

    tracing::debug!("Offboarding telemetry initialized");
    Ok(())
}

/// Generate a correlation ID linking every log line of one run
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span wrapping the processing of one department.
///
/// `source_branch` is recorded once the branch name is known.
pub fn create_department_span(department: &str, correlation_id: &str) -> tracing::Span {
    tracing::info_span!(
        "offboard_department",
        department = department,
        source_branch = tracing::field::Empty,
        correlation.id = correlation_id,
        otel.kind = "internal"
    )
}

/// Host name recorded in run summaries
pub fn host_name() -> Option<String> {
    hostname::get().ok().and_then(|h| h.into_string().ok())
}
