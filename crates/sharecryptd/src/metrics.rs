//! Prometheus /metrics + health check HTTP endpoints
//!
//! Endpoints:
//!   GET /metrics  - Prometheus text format
//!   GET /healthz  - Liveness check (always 200 if process is running)
//!   GET /readyz   - Readiness check (200 if the key store is reachable)

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use prometheus_client::{
    encoding::text::encode,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

use crate::api::AppState;

type OpLabels = Vec<(String, String)>;

/// Envelope operation counters, labelled by `op` (wrap/unwrap/delete) and `outcome`.
#[derive(Clone, Default)]
pub struct EnvelopeMetrics {
    ops: Family<OpLabels, Counter>,
}

impl EnvelopeMetrics {
    pub fn new(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        // exposed as sharecrypt_envelope_ops_total
        registry.register(
            "sharecrypt_envelope_ops",
            "Key envelope operations by type and outcome",
            metrics.ops.clone(),
        );
        metrics
    }

    pub fn record(&self, op: &str, outcome: &str) {
        self.ops
            .get_or_create(&vec![
                ("op".to_string(), op.to_string()),
                ("outcome".to_string(), outcome.to_string()),
            ])
            .inc();
    }

    #[cfg(test)]
    pub fn count(&self, op: &str, outcome: &str) -> u64 {
        self.ops
            .get_or_create(&vec![
                ("op".to_string(), op.to_string()),
                ("outcome".to_string(), outcome.to_string()),
            ])
            .get()
    }
}

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut body = String::new();
    match encode(&mut body, &state.registry) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => {
            tracing::error!("metrics encode failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                e.to_string(),
            )
        }
    }
}

/// Liveness check: returns 200 if the process is running.
pub async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness check: returns 200 if the key store is reachable, 503 otherwise.
pub async fn readyz_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.check_health().await {
        Ok(()) => (StatusCode::OK, "ready"),
        Err(e) => {
            tracing::warn!("readiness check failed: {e}");
            (StatusCode::SERVICE_UNAVAILABLE, "key store unreachable")
        }
    }
}
