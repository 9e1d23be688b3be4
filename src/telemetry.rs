use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::ObservabilityConfig;

/// Initialize structured logging.
///
/// `RUST_LOG` wins over the configured level when it is set.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }

    tracing::debug!("po-receipt telemetry initialized");
    Ok(())
}

/// Generate a correlation ID for linking the calls of one workflow run
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Create the span that wraps one receipt workflow run
pub fn create_workflow_span(
    correlation_id: &str,
    purchase_order: Option<&str>,
    line_number: Option<&str>,
) -> tracing::Span {
    tracing::info_span!(
        "receipt_workflow",
        correlation.id = correlation_id,
        po.number = purchase_order,
        po.line = line_number,
    )
}
