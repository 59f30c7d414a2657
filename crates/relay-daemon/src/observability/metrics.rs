//! Prometheus metrics: HTTP request latency/counts plus the relay's own
//! business metrics (agents attached, envelopes routed, dead letters,
//! proposals).

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use prometheus_client::encoding::{text::encode, EncodeLabelSet};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;
use std::sync::Arc;

/// HTTP request labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabels {
    pub method: String,
    pub path: String,
    pub status: u16,
}

/// Global metrics state, initialized lazily on first access.
pub static METRICS: Lazy<MetricsState> = Lazy::new(MetricsState::new);

/// Metrics state container. Clonable handle over an `Arc`-backed registry.
#[derive(Clone)]
pub struct MetricsState {
    registry: Arc<RwLock<Registry>>,
    pub http_requests_total: Family<HttpLabels, Counter>,
    pub http_request_duration_seconds: Family<HttpLabels, Histogram>,
    pub http_active_connections: Gauge,
    pub agents_attached: Gauge,
    pub envelopes_routed_total: Counter,
    pub envelopes_dead_lettered_total: Counter,
    pub proposals_open: Gauge,
    pub proposals_resolved_total: Counter,
}

impl MetricsState {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let http_requests_total = Family::<HttpLabels, Counter>::default();
        registry.register(
            "http_requests",
            "Total HTTP requests handled by the dashboard",
            http_requests_total.clone(),
        );

        let http_request_duration_seconds =
            Family::<HttpLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.001, 2.0, 12))
            });
        registry.register(
            "http_request_duration_seconds",
            "HTTP request duration",
            http_request_duration_seconds.clone(),
        );

        let http_active_connections = Gauge::default();
        registry.register(
            "http_active_connections",
            "Currently in-flight HTTP requests",
            http_active_connections.clone(),
        );

        let agents_attached = Gauge::default();
        registry.register(
            "agents_attached",
            "Agents currently attached to the router",
            agents_attached.clone(),
        );

        let envelopes_routed_total = Counter::default();
        registry.register(
            "envelopes_routed_total",
            "Envelopes accepted by the router",
            envelopes_routed_total.clone(),
        );

        let envelopes_dead_lettered_total = Counter::default();
        registry.register(
            "envelopes_dead_lettered_total",
            "Envelopes that failed delivery and were dead-lettered",
            envelopes_dead_lettered_total.clone(),
        );

        let proposals_open = Gauge::default();
        registry.register(
            "proposals_open",
            "Proposals currently pending a consensus decision",
            proposals_open.clone(),
        );

        let proposals_resolved_total = Counter::default();
        registry.register(
            "proposals_resolved_total",
            "Proposals that reached a terminal status",
            proposals_resolved_total.clone(),
        );

        Self {
            registry: Arc::new(RwLock::new(registry)),
            http_requests_total,
            http_request_duration_seconds,
            http_active_connections,
            agents_attached,
            envelopes_routed_total,
            envelopes_dead_lettered_total,
            proposals_open,
            proposals_resolved_total,
        }
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let labels = HttpLabels {
            method: method.to_string(),
            path: path.to_string(),
            status,
        };
        self.http_requests_total.get_or_create(&labels).inc();
        self.http_request_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
    }

    /// Renders the registry in Prometheus text exposition format.
    pub fn encode(&self) -> String {
        let mut buf = String::new();
        let _ = encode(&mut buf, &self.registry.read());
        buf
    }
}

impl Default for MetricsState {
    fn default() -> Self {
        Self::new()
    }
}
