use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-wide Prometheus recorder. Call once, from the binary.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("relay_sessions_opened_total", "Client sessions accepted.");
        describe_gauge!("relay_sessions_active", "Client sessions currently streaming.");
        describe_counter!("relay_ticks_total", "Periodic delta checks run across all sessions.");
        describe_counter!("relay_items_delivered_total", "new-story events written to clients.");
        describe_counter!(
            "relay_items_skipped_total",
            "Fetched items dropped by validation (not a story, missing title/url)."
        );
        describe_counter!("relay_feed_errors_total", "Upstream fetch/decode failures.");
        describe_counter!(
            "relay_write_errors_total",
            "Writes to a closed or stalled client connection."
        );
        describe_histogram!("relay_fetch_ms", "Upstream request time in milliseconds.");
    });
}
