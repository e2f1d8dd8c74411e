//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::time::Instant;

/// Pipeline metrics registry
pub struct PipelineMetrics {
    registry: Registry,

    // Counters
    pub submissions_total: IntCounter,
    pub confirmations_total: IntCounter,
    pub rejections_total: IntCounterVec,
    pub timeouts_total: IntCounter,
    pub stale_tokens_total: IntCounter,
    pub transport_errors_total: IntCounter,

    // Gauges
    pub active_subscriptions: IntGauge,

    // Histograms
    pub confirmation_latency: Histogram,
    pub transaction_size: Histogram,
    pub derive_latency: Histogram,
}

impl PipelineMetrics {
    /// Create new metrics instance
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let submissions_total = IntCounter::with_opts(Opts::new(
            "tx_submissions_total",
            "Validated transactions handed to the submission engine",
        ))?;

        let confirmations_total = IntCounter::with_opts(Opts::new(
            "tx_confirmations_total",
            "Transactions confirmed at the requested commitment",
        ))?;

        let rejections_total = IntCounterVec::new(
            Opts::new("tx_rejections_total", "Rejected transactions by stage"),
            &["stage"],
        )?;

        let timeouts_total = IntCounter::with_opts(Opts::new(
            "tx_confirmation_timeouts_total",
            "Submissions that hit the wall-clock deadline",
        ))?;

        let stale_tokens_total = IntCounter::with_opts(Opts::new(
            "tx_stale_blockhash_total",
            "Submissions whose blockhash expired before landing",
        ))?;

        let transport_errors_total = IntCounter::with_opts(Opts::new(
            "tx_transport_errors_total",
            "Submissions aborted by an unreachable transport",
        ))?;

        let active_subscriptions = IntGauge::with_opts(Opts::new(
            "tx_active_subscriptions",
            "Confirmation subscriptions currently open",
        ))?;

        let confirmation_latency = Histogram::with_opts(
            HistogramOpts::new(
                "tx_confirmation_latency_seconds",
                "Broadcast to confirmation latency",
            )
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        )?;

        let transaction_size = Histogram::with_opts(
            HistogramOpts::new("tx_size_bytes", "Serialized size of validated transactions")
                .buckets(vec![128.0, 256.0, 512.0, 768.0, 1024.0, 1232.0]),
        )?;

        let derive_latency = Histogram::with_opts(
            HistogramOpts::new("pda_derive_latency_seconds", "Bump search duration")
                .buckets(vec![0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005]),
        )?;

        // Register all metrics
        registry.register(Box::new(submissions_total.clone()))?;
        registry.register(Box::new(confirmations_total.clone()))?;
        registry.register(Box::new(rejections_total.clone()))?;
        registry.register(Box::new(timeouts_total.clone()))?;
        registry.register(Box::new(stale_tokens_total.clone()))?;
        registry.register(Box::new(transport_errors_total.clone()))?;
        registry.register(Box::new(active_subscriptions.clone()))?;
        registry.register(Box::new(confirmation_latency.clone()))?;
        registry.register(Box::new(transaction_size.clone()))?;
        registry.register(Box::new(derive_latency.clone()))?;

        Ok(Self {
            registry,
            submissions_total,
            confirmations_total,
            rejections_total,
            timeouts_total,
            stale_tokens_total,
            transport_errors_total,
            active_subscriptions,
            confirmation_latency,
            transaction_size,
            derive_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_rejection(&self, stage: &str) {
        self.rejections_total.with_label_values(&[stage]).inc();
    }

    /// Render every metric in the Prometheus text format
    pub fn encode_text(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// Global metrics instance
pub fn metrics() -> &'static PipelineMetrics {
    static METRICS: once_cell::sync::Lazy<PipelineMetrics> = once_cell::sync::Lazy::new(|| {
        PipelineMetrics::new().expect("metric names and label sets are static")
    });
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
