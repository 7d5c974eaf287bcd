use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Once;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref MESSAGES_RECEIVED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("gtpv2_messages_received_total", "GTPv2-C messages received, by message type"),
        &["message_type"]
    ).unwrap();

    pub static ref MESSAGES_SENT_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("gtpv2_messages_sent_total", "GTPv2-C messages sent, by message type"),
        &["message_type"]
    ).unwrap();

    pub static ref DECODE_ERRORS_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("gtpv2_decode_errors_total", "Datagrams that failed to decode")
    ).unwrap();

    pub static ref HANDLER_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("gtpv2_handler_errors_total", "Errors returned by message handlers"),
        &["message_type"]
    ).unwrap();

    pub static ref VALIDATION_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("gtpv2_validation_failures_total", "Inbound messages failing validation"),
        &["reason"]
    ).unwrap();

    pub static ref CORRELATION_TIMEOUTS_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("gtpv2_correlation_timeouts_total", "Correlation waits or hand-offs that timed out")
    ).unwrap();

    pub static ref ACTIVE_SESSIONS: IntGauge = IntGauge::with_opts(
        Opts::new("gtpv2_active_sessions", "Sessions registered by IMSI")
    ).unwrap();

    pub static ref DISPATCH_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("gtpv2_dispatch_latency_seconds", "Handler execution time in seconds")
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0])
    ).unwrap();
}

static REGISTER: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Safe to call more than once; only the first call registers.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(MESSAGES_RECEIVED_TOTAL.clone()),
            Box::new(MESSAGES_SENT_TOTAL.clone()),
            Box::new(DECODE_ERRORS_TOTAL.clone()),
            Box::new(HANDLER_ERRORS_TOTAL.clone()),
            Box::new(VALIDATION_FAILURES_TOTAL.clone()),
            Box::new(CORRELATION_TIMEOUTS_TOTAL.clone()),
            Box::new(ACTIVE_SESSIONS.clone()),
            Box::new(DISPATCH_LATENCY_SECONDS.clone()),
        ];
        for collector in collectors {
            // Only fails on duplicate registration, which Once rules out
            let _ = REGISTRY.register(collector);
        }
    });
}

/// Gather metrics in Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
