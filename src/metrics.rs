//! Metrics for the ingestion phases
//!
//! Counters and histograms go through the `metrics` facade. Nothing is exported
//! unless [`init_metrics`] installs the Prometheus recorder, so library users and
//! tests pay only for no-op macro calls.

use std::net::SocketAddr;
use std::sync::Once;
use tracing::{info, warn};

static INIT: Once = Once::new();

/// Installs the Prometheus HTTP exporter when `EVENT_INGEST_METRICS_PORT` is set.
///
/// Idempotent.
pub fn init_metrics() {
    INIT.call_once(|| {
        let port: u16 = match std::env::var("EVENT_INGEST_METRICS_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            Some(port) => port,
            None => return,
        };
        let addr: SocketAddr = ([0, 0, 0, 0], port).into();
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
        match builder.install() {
            Ok(()) => info!("Prometheus exporter listening on http://{}/metrics", addr),
            Err(e) => warn!("Prometheus exporter install failed: {}", e),
        }
    });
}

/// Site scraper metrics
pub struct ScraperMetrics;

impl ScraperMetrics {
    pub fn record_page(scraper: &str, events: usize, duration_secs: f64) {
        ::metrics::counter!("ingest_scraper_pages_total", "scraper" => scraper.to_string())
            .increment(1);
        ::metrics::counter!("ingest_scraper_events_total", "scraper" => scraper.to_string())
            .increment(events as u64);
        ::metrics::histogram!("ingest_scraper_page_duration_seconds", "scraper" => scraper.to_string())
            .record(duration_secs);
    }

    pub fn record_failure(scraper: &str) {
        ::metrics::counter!("ingest_scraper_failures_total", "scraper" => scraper.to_string())
            .increment(1);
    }
}

/// LLM extraction metrics
pub struct ExtractionMetrics;

impl ExtractionMetrics {
    pub fn record_llm_call(model: &str, input_tokens: u64, output_tokens: u64, cost_usd: f64) {
        ::metrics::counter!("ingest_llm_calls_total", "model" => model.to_string()).increment(1);
        ::metrics::counter!("ingest_llm_input_tokens_total", "model" => model.to_string())
            .increment(input_tokens);
        ::metrics::counter!("ingest_llm_output_tokens_total", "model" => model.to_string())
            .increment(output_tokens);
        ::metrics::histogram!("ingest_llm_call_cost_usd", "model" => model.to_string())
            .record(cost_usd);
    }

    pub fn record_llm_failure() {
        ::metrics::counter!("ingest_llm_failures_total").increment(1);
    }

    pub fn record_outcome(outcome: &'static str) {
        ::metrics::counter!("ingest_hybrid_outcomes_total", "outcome" => outcome).increment(1);
    }
}

/// CSV import metrics
pub struct ImportMetrics;

impl ImportMetrics {
    pub fn record_batch(successful: usize, failed: usize, skipped: usize, duration_secs: f64) {
        ::metrics::counter!("ingest_csv_rows_total", "outcome" => "successful")
            .increment(successful as u64);
        ::metrics::counter!("ingest_csv_rows_total", "outcome" => "failed")
            .increment(failed as u64);
        ::metrics::counter!("ingest_csv_rows_total", "outcome" => "skipped")
            .increment(skipped as u64);
        ::metrics::histogram!("ingest_csv_import_duration_seconds").record(duration_secs);
    }
}
