//! # Lucid Telemetry
//!
//! Structured logging and the process-wide Prometheus registry.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let _guard = lucid_telemetry::init_telemetry(&TelemetryConfig::default())?;
//! lucid_telemetry::metrics::BLOCKS_STORED.inc();
//! ```
//!
//! The metrics registry and the subscriber are the only global singletons
//! in the workspace besides the persistence client.

pub mod metrics;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Telemetry initialization errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Failed to install tracing subscriber: {0}")]
    SubscriberInit(String),

    #[error("Failed to register metrics: {0}")]
    MetricsInit(String),
}

/// Logging configuration, injected by the node config.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Filter directive, e.g. `info` or `lucid_mempool=debug,info`.
    pub log_filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".into(),
            json_logs: false,
        }
    }
}

/// Keeps telemetry alive for the process lifetime.
pub struct TelemetryGuard {
    _private: (),
}

/// Installs the tracing subscriber and registers the metric families.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let filter = EnvFilter::try_new(&config.log_filter)
        .map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;

    metrics::register_metrics().map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    Ok(TelemetryGuard { _private: () })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_filter_is_reported() {
        let config = TelemetryConfig {
            log_filter: "][not-a-filter".into(),
            json_logs: false,
        };
        assert!(matches!(
            init_telemetry(&config),
            Err(TelemetryError::SubscriberInit(_))
        ));
    }
}
