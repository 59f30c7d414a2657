//! Structured logging, Prometheus metrics, and request-id propagation for
//! the dashboard's HTTP surface.

mod logging;
mod metrics;
pub mod middleware;

pub use logging::{init_logging, LogFormat};
pub use metrics::{MetricsState, METRICS};
pub use middleware::{metrics_handler, metrics_middleware, request_id_middleware, REQUEST_ID_HEADER};
