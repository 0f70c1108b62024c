//! Prometheus metrics for dispatched commands.
//!
//! All metrics follow the naming convention: `mediator_<metric>_<unit>`
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `mediator_commands_total` | counter | `request`, `outcome` |
//! | `mediator_command_duration_seconds` | histogram | `request` |
//! | `mediator_errors_total` | counter | `kind`, `error` |

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Commands dispatched, by request type and outcome (`ok` or an error label)
    pub static ref COMMANDS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("mediator_commands_total", "Total commands dispatched"),
        &["request", "outcome"]
    ).expect("metric creation failed");

    /// Time from entering the pipeline to the response
    pub static ref COMMAND_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "mediator_command_duration_seconds",
            "Time spent dispatching a command, behaviors included"
        ).buckets(exponential_buckets(0.00001, 2.0, 20).expect("valid bucket layout")),
        &["request"]
    ).expect("metric creation failed");

    /// Dispatch errors by message kind and error label
    pub static ref ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("mediator_errors_total", "Dispatch errors by message kind and type"),
        &["kind", "error"]
    ).expect("metric creation failed");
}

/// Handle to the registry the metrics live in.
#[derive(Clone, Copy)]
pub struct MetricsHandle {
    registry: &'static Registry,
}

impl MetricsHandle {
    /// Render the current values in the Prometheus text format.
    ///
    /// # Errors
    ///
    /// `MetricsInit` if encoding fails.
    pub fn render(&self) -> Result<String, TelemetryError> {
        encode(self.registry)
    }
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; metrics already registered are skipped.
///
/// # Errors
///
/// `MetricsInit` if the registry rejects a metric for any other reason.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(COMMANDS_TOTAL.clone()),
        Box::new(COMMAND_DURATION.clone()),
        Box::new(ERRORS_TOTAL.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        registry: &REGISTRY,
    })
}

/// Encode all metrics as Prometheus text format.
///
/// # Errors
///
/// `MetricsInit` if encoding fails.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    encode(&REGISTRY)
}

fn encode(registry: &Registry) -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
