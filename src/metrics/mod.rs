/*!
 * # Metrics Module
 *
 * In-process counters and gauges for the procurement service, exported in
 * Prometheus text format at `/metrics`.
 *
 * Series names may carry labels (`p2p_documents_created_total{kind="order"}`);
 * the exporter groups series by base name so each `# TYPE` line is emitted once.
 */
use dashmap::DashMap;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Gauge storing an `f64` as raw bits.
#[derive(Debug, Clone, Default)]
pub struct Gauge {
    bits: Arc<AtomicU64>,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: DashMap<String, Counter>,
    gauges: DashMap<String, Gauge>,
}

fn base_name(series: &str) -> &str {
    series.split('{').next().unwrap_or(series)
}

fn render<V: std::fmt::Display>(
    output: &mut String,
    kind: &str,
    series: BTreeMap<String, V>,
) {
    let mut last_base: Option<String> = None;
    for (name, value) in series {
        let base = base_name(&name).to_string();
        if last_base.as_deref() != Some(base.as_str()) {
            output.push_str(&format!("# TYPE {} {}\n", base, kind));
            last_base = Some(base);
        }
        output.push_str(&format!("{} {}\n", name, value));
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create_counter(&self, name: &str) -> Counter {
        self.counters
            .entry(name.to_string())
            .or_insert_with(Counter::new)
            .clone()
    }

    pub fn get_or_create_gauge(&self, name: &str) -> Gauge {
        self.gauges
            .entry(name.to_string())
            .or_insert_with(Gauge::new)
            .clone()
    }

    pub fn counter_value(&self, name: &str) -> u64 {
        self.counters.get(name).map(|c| c.get()).unwrap_or(0)
    }

    /// Prometheus text exposition, sorted by series name.
    pub fn export_metrics(&self) -> String {
        let counters: BTreeMap<String, u64> = self
            .counters
            .iter()
            .map(|e| (e.key().clone(), e.value().get()))
            .collect();
        let gauges: BTreeMap<String, f64> = self
            .gauges
            .iter()
            .map(|e| (e.key().clone(), e.value().get()))
            .collect();

        let mut output = String::new();
        render(&mut output, "counter", counters);
        render(&mut output, "gauge", gauges);
        output
    }

    pub fn export_metrics_json(&self) -> serde_json::Value {
        let counters: serde_json::Map<String, serde_json::Value> = self
            .counters
            .iter()
            .map(|e| (e.key().clone(), json!(e.value().get())))
            .collect();
        let gauges: serde_json::Map<String, serde_json::Value> = self
            .gauges
            .iter()
            .map(|e| (e.key().clone(), json!(e.value().get())))
            .collect();
        json!({ "counters": counters, "gauges": gauges })
    }
}

// Global metrics registry
lazy_static::lazy_static! {
    pub static ref METRICS: MetricsRegistry = MetricsRegistry::new();
}

pub fn increment_counter(name: &str) {
    METRICS.get_or_create_counter(name).inc();
}

pub fn increment_counter_by(name: &str, value: u64) {
    METRICS.get_or_create_counter(name).inc_by(value);
}

pub fn set_gauge(name: &str, value: f64) {
    METRICS.get_or_create_gauge(name).set(value);
}

// Business metrics

pub fn record_document_created(kind: &str) {
    increment_counter(&format!("p2p_documents_created_total{{kind=\"{}\"}}", kind));
}

pub fn record_status_transition(kind: &str, to: impl std::fmt::Display) {
    increment_counter(&format!(
        "p2p_status_transitions_total{{kind=\"{}\",to=\"{}\"}}",
        kind, to
    ));
}

pub fn record_document_deleted(kind: &str) {
    increment_counter(&format!("p2p_documents_deleted_total{{kind=\"{}\"}}", kind));
}

pub fn record_goods_receipt(items_received: usize) {
    increment_counter("p2p_goods_receipts_total");
    increment_counter_by("p2p_items_received_total", items_received as u64);
}

pub fn record_event(name: &str) {
    increment_counter(&format!("p2p_events_processed_total{{event=\"{}\"}}", name));
}

// HTTP metrics

pub fn record_http_request(status: u16, duration: Duration) {
    increment_counter("http_requests_total");
    set_gauge("http_last_request_duration_seconds", duration.as_secs_f64());
    if status >= 400 {
        increment_counter(&format!("http_error_responses_total{{status=\"{}\"}}", status));
    }
}
