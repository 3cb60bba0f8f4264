use crate::config::{LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use sentry::types::Dsn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(thiserror::Error, Debug)]
pub enum ObservabilityError {
    #[error("invalid log filter: {0}")]
    InvalidFilter(#[from] tracing_subscriber::filter::ParseError),
    #[error("could not install log subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
    #[error("invalid sentry DSN: {0}")]
    InvalidDsn(#[from] sentry::types::ParseDsnError),
    #[error("could not build statsd exporter: {0}")]
    Statsd(#[from] metrics_exporter_statsd::StatsdError),
    #[error("a metrics recorder is already installed")]
    RecorderInstalled,
}

/// Keeps error reporting alive; events are flushed when dropped.
pub struct Guard {
    _sentry: Option<sentry::ClientInitGuard>,
}

/// Sets up logging, error reporting and metrics for the relay server.
pub fn init_server(
    logging: &LoggingConfig,
    metrics: Option<&MetricsConfig>,
) -> Result<Guard, ObservabilityError> {
    let sentry = match &logging.sentry_dsn {
        Some(dsn) => Some(sentry::init(sentry::ClientOptions {
            dsn: Some(dsn.parse::<Dsn>()?),
            release: sentry::release_name!(),
            ..Default::default()
        })),
        None => None,
    };

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)?,
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry.is_some().then(sentry::integrations::tracing::layer))
        .try_init()?;

    if let Some(metrics) = metrics {
        let recorder = StatsdBuilder::from(metrics.statsd_host.as_str(), metrics.statsd_port)
            .build(Some(metrics.prefix.as_str()))?;
        metrics::set_global_recorder(recorder)
            .map_err(|_| ObservabilityError::RecorderInstalled)?;
        shared::metrics_defs::describe_all(relay::metrics_defs::ALL_METRICS);
        tracing::info!(
            host = %metrics.statsd_host,
            port = metrics.statsd_port,
            "exporting metrics to statsd"
        );
    }

    Ok(Guard { _sentry: sentry })
}

/// Quiet stderr logging for the one-shot client commands.
pub fn init_client(verbose: bool) -> Result<(), ObservabilityError> {
    let level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(level)?)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_settings_rejected() {
        let logging = LoggingConfig {
            level: "info".to_string(),
            sentry_dsn: Some("not a dsn".to_string()),
        };
        assert!(matches!(
            init_server(&logging, None),
            Err(ObservabilityError::InvalidDsn(_))
        ));
    }
}
