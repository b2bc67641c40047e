//! Prometheus metrics for the request/response bridge.
//!
//! All metrics follow the naming convention: `orm_<component>_<metric>_<unit>`
//!
//! Collectors are process-wide statics so hot paths can record without
//! threading a handle through every call. They count whether or not
//! [`register_metrics`] was called; registration only makes them visible to
//! [`encode_metrics`].

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // CLIENT METRICS
    // =========================================================================

    /// Finished calls by operation and outcome
    pub static ref CALLS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("orm_client_calls_total", "Total calls by operation and outcome"),
        &["operation", "outcome"]  // outcome: completed/timeout/transport/encoding
    ).expect("metric creation failed");

    /// Call latency from call start to reply, failure or deadline
    pub static ref CALL_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "orm_client_call_duration_seconds",
            "Time from call start to reply, failure or timeout"
        ).buckets(exponential_buckets(0.0005, 2.0, 16).expect("valid buckets")),
        &["operation"]
    ).expect("metric creation failed");

    /// Correlation entries currently awaiting a reply
    pub static ref PENDING_CALLS: Gauge = Gauge::new(
        "orm_client_pending_calls",
        "Correlation entries currently awaiting a reply"
    ).expect("metric creation failed");

    /// Replies that matched no live correlation entry
    pub static ref UNMATCHED_REPLIES: Counter = Counter::new(
        "orm_client_unmatched_replies_total",
        "Replies for consumed, expired or unknown request ids"
    ).expect("metric creation failed");

    /// Correlation entries removed by the expiry sweep
    pub static ref EXPIRED_ENTRIES: Counter = Counter::new(
        "orm_client_expired_entries_total",
        "Correlation entries removed after their deadline"
    ).expect("metric creation failed");

    // =========================================================================
    // DATABASE MODULE METRICS
    // =========================================================================

    /// Requests answered by the database module
    pub static ref DB_REQUESTS: CounterVec = CounterVec::new(
        Opts::new("orm_db_requests_total", "Requests handled by the database module"),
        &["operation", "status"]  // status: ok/error
    ).expect("metric creation failed");
}

/// Handle proving the collectors were registered.
#[derive(Debug)]
pub struct MetricsHandle {
    _private: (),
}

/// Register all collectors with [`REGISTRY`].
///
/// Calling this more than once is harmless.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(CALLS_TOTAL.clone()),
        Box::new(CALL_DURATION.clone()),
        Box::new(PENDING_CALLS.clone()),
        Box::new(UNMATCHED_REPLIES.clone()),
        Box::new(EXPIRED_ENTRIES.clone()),
        Box::new(DB_REQUESTS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle { _private: () })
}

/// Encode all registered metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
