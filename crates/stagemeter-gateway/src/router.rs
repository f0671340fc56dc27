//! Axum router wiring.
//!
//! The metrics router is what `MetricsRegistry::initialize` serves; the demo
//! router is the illustrative host that drives an instrumented stage.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::{demo, obs::MetricsRegistry, ops};

pub fn build_metrics_router(metrics: Arc<MetricsRegistry>) -> Router {
    Router::new()
        .route("/metrics", get(ops::metrics))
        .route("/healthz", get(ops::healthz))
        .with_state(metrics)
}

pub fn build_demo_router(state: demo::DemoState) -> Router {
    Router::new()
        .route("/predict", post(demo::predict))
        .route("/healthz", get(ops::healthz))
        .with_state(state)
}
