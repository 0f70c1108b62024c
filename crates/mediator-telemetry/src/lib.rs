//! # Mediator Telemetry
//!
//! Observability for the mediator.
//!
//! ## Components
//!
//! - **Logs**: a global `tracing` subscriber with an `EnvFilter` and either
//!   JSON or human-readable output
//! - **Metrics**: Prometheus counters and a latency histogram, fed by
//!   [`MetricsBehavior`] in the command pipeline
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mediator_telemetry::{init_telemetry, MetricsBehavior, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//!
//! let mut builder = Dispatcher::builder();
//! builder.register_open_behavior(MetricsBehavior, i32::MIN);
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `mediator` | Service name in startup logs |
//! | `MEDIATOR_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `MEDIATOR_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `MEDIATOR_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod behavior;
mod config;
mod logging;
mod metrics;

pub use behavior::MetricsBehavior;
pub use config::{TelemetryConfig, DEFAULT_SERVICE_NAME};
pub use logging::init_logging;
pub use metrics::{
    gather_metrics, register_metrics, MetricsHandle, COMMANDS_TOTAL, COMMAND_DURATION,
    ERRORS_TOTAL, REGISTRY,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to install tracing subscriber: {0}")]
    SubscriberInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Register metrics and install the global log subscriber.
///
/// Returns a guard to hold for the lifetime of the application.
///
/// # Errors
///
/// `SubscriberInit` when called a second time in the same process.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first: they cannot fail on repeat calls.
    let metrics = register_metrics()?;
    logging::init_logging(&config)?;

    Ok(TelemetryGuard {
        service_name: config.service_name,
        metrics,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
    metrics: MetricsHandle,
}

impl TelemetryGuard {
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Handle for rendering the Prometheus exposition.
    #[must_use]
    pub fn metrics(&self) -> MetricsHandle {
        self.metrics
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}

/// Convenience macro for recording a metric with a value.
#[macro_export]
macro_rules! metric_observe {
    ($metric:expr, $value:expr) => {
        $metric.observe($value)
    };
    ($metric:expr, $labels:expr, $value:expr) => {
        $metric.with_label_values($labels).observe($value)
    };
}
