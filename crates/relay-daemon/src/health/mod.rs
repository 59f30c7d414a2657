//! Liveness/readiness/startup probes for the dashboard's HTTP surface.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ComponentHealth {
    pub fn up() -> Self {
        Self {
            status: HealthStatus::Up,
            details: None,
        }
    }

    pub fn up_with(details: serde_json::Value) -> Self {
        Self {
            status: HealthStatus::Up,
            details: Some(details),
        }
    }

    pub fn down_with_reason(reason: &str) -> Self {
        Self {
            status: HealthStatus::Down,
            details: Some(serde_json::json!({ "reason": reason })),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadinessChecks {
    pub store: ComponentHealth,
    pub router: ComponentHealth,
    pub sync: ComponentHealth,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub checks: ReadinessChecks,
}

#[derive(Debug, Clone, Serialize)]
pub struct LivenessResponse {
    pub status: HealthStatus,
    pub uptime_seconds: u64,
}

/// Shared health state the daemon updates as components come up; mirrors
/// what `relay-web`'s dashboard also reads for its own status view.
#[derive(Clone)]
pub struct HealthState {
    start_time: Instant,
    ready: Arc<AtomicBool>,
    components: Arc<RwLock<ComponentStates>>,
}

#[derive(Default)]
struct ComponentStates {
    store_healthy: bool,
    agents_attached: usize,
    sync_enabled: bool,
    sync_healthy: bool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            ready: Arc::new(AtomicBool::new(false)),
            components: Arc::new(RwLock::new(ComponentStates::default())),
        }
    }

    pub fn uptime(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn set_store_healthy(&self, healthy: bool) {
        self.components.write().store_healthy = healthy;
    }

    pub fn set_router_state(&self, agents_attached: usize) {
        self.components.write().agents_attached = agents_attached;
    }

    pub fn set_sync_state(&self, enabled: bool, healthy: bool) {
        let mut components = self.components.write();
        components.sync_enabled = enabled;
        components.sync_healthy = healthy;
    }

    fn readiness_checks(&self) -> ReadinessChecks {
        let components = self.components.read();
        ReadinessChecks {
            store: if components.store_healthy {
                ComponentHealth::up()
            } else {
                ComponentHealth::down_with_reason("store not opened")
            },
            router: ComponentHealth::up_with(serde_json::json!({
                "agents_attached": components.agents_attached
            })),
            sync: if !components.sync_enabled {
                ComponentHealth::up_with(serde_json::json!({ "enabled": false }))
            } else if components.sync_healthy {
                ComponentHealth::up_with(serde_json::json!({ "enabled": true }))
            } else {
                ComponentHealth::down_with_reason("cloud sync unreachable")
            },
        }
    }
}

pub fn health_routes<S>(state: HealthState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .with_state(state)
}

async fn health_handler(State(state): State<HealthState>) -> Response {
    let checks = state.readiness_checks();
    let overall = if state.is_ready() && checks.store.status == HealthStatus::Up {
        HealthStatus::Up
    } else {
        HealthStatus::Down
    };
    let response = HealthResponse {
        status: overall,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime(),
        checks,
    };
    let status_code = match overall {
        HealthStatus::Up => StatusCode::OK,
        HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response)).into_response()
}

async fn liveness_handler(State(state): State<HealthState>) -> Response {
    let response = LivenessResponse {
        status: HealthStatus::Up,
        uptime_seconds: state.uptime(),
    };
    (StatusCode::OK, Json(response)).into_response()
}

async fn readiness_handler(State(state): State<HealthState>) -> Response {
    let checks = state.readiness_checks();
    let overall = if state.is_ready() && checks.store.status == HealthStatus::Up {
        HealthStatus::Up
    } else {
        HealthStatus::Down
    };
    let status_code = match overall {
        HealthStatus::Up => StatusCode::OK,
        HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(HealthResponse {
        status: overall,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime(),
        checks,
    }))
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_not_ready() {
        let state = HealthState::new();
        assert!(!state.is_ready());
        state.set_ready(true);
        assert!(state.is_ready());
    }

    #[test]
    fn sync_disabled_counts_as_healthy() {
        let state = HealthState::new();
        state.set_sync_state(false, false);
        let checks = state.readiness_checks();
        assert_eq!(checks.sync.status, HealthStatus::Up);
    }

    #[test]
    fn store_down_until_marked_healthy() {
        let state = HealthState::new();
        let checks = state.readiness_checks();
        assert_eq!(checks.store.status, HealthStatus::Down);
        state.set_store_healthy(true);
        assert_eq!(state.readiness_checks().store.status, HealthStatus::Up);
    }
}
