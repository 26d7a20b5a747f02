use anyhow::{anyhow, Result};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the static `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE
        .get_or_init(|| async {
            info!("Initializing Metrics ...");
            Metrics::new()
        })
        .await
}

/// Prometheus text exposition of every registered metric.
pub async fn encode_metrics() -> Result<String> {
    let metrics = get_metrics().await;
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&metrics.registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| anyhow!(e))
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Request metrics
    pub requests: IntCounterVec,
    pub request_failures: IntCounterVec,
    pub request_duration: HistogramVec,
    pub request_retries: IntCounterVec,

    // Security token metrics
    pub token_refreshes: IntCounterVec,
    pub token_rotations: IntCounterVec,

    // Config
    pub config_parse_failures: IntCounter,
    pub config_validation_errors: IntCounter,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("odata_access".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Requests
            requests: IntCounterVec::new(Opts::new("requests_total", "Total backend requests by method"), &["service", "method"]).unwrap(),
            request_failures: IntCounterVec::new(Opts::new("request_failures_total", "Backend request failures by reason"), &["service", "method", "reason"]).unwrap(),
            request_duration: HistogramVec::new(HistogramOpts::new("request_duration_seconds", "Backend request duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]), &["method"]).unwrap(),
            request_retries: IntCounterVec::new(Opts::new("request_retries_total", "Requests replayed after a token refresh"), &["service"]).unwrap(),

            // Token
            token_refreshes: IntCounterVec::new(Opts::new("token_refresh_total", "Security token refresh probes by outcome"), &["service", "outcome"]).unwrap(),
            token_rotations: IntCounterVec::new(Opts::new("token_rotations_total", "Security tokens adopted from read responses"), &["service"]).unwrap(),

            // Config
            config_parse_failures: IntCounter::new("config_parse_failures_total", "Config files that failed to parse").unwrap(),
            config_validation_errors: IntCounter::new("config_validation_errors_total", "Validation errors during startup").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.requests.clone())).unwrap();
        reg.register(Box::new(metrics.request_failures.clone())).unwrap();
        reg.register(Box::new(metrics.request_duration.clone())).unwrap();
        reg.register(Box::new(metrics.request_retries.clone())).unwrap();
        reg.register(Box::new(metrics.token_refreshes.clone())).unwrap();
        reg.register(Box::new(metrics.token_rotations.clone())).unwrap();
        reg.register(Box::new(metrics.config_parse_failures.clone())).unwrap();
        reg.register(Box::new(metrics.config_validation_errors.clone())).unwrap();

        metrics
    }
}
