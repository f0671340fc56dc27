//! Illustrative host wiring: a compound `x^2 + x^3` stage behind `POST /predict`.
//!
//! Not part of the reusable core; it shows how a stage reports accuracy and how
//! a host drives an instrumented proxy.

pub mod simple;

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use stagemeter_core::stage::serve_one;

use crate::instrument::InstrumentedProxy;

pub use simple::{DemoError, SimpleStage};

#[derive(Clone)]
pub struct DemoState {
    stage: Arc<InstrumentedProxy<SimpleStage>>,
}

impl DemoState {
    pub fn new(stage: InstrumentedProxy<SimpleStage>) -> Self {
        Self {
            stage: Arc::new(stage),
        }
    }

    pub fn stage(&self) -> &InstrumentedProxy<SimpleStage> {
        &self.stage
    }
}

pub async fn predict(
    State(state): State<DemoState>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    match serve_one(state.stage.as_ref(), body) {
        Ok(resp) => (StatusCode::OK, Json(resp)),
        Err(e) => {
            let status = if e.is_client_error() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, Json(json!({ "error": e.to_string() })))
        }
    }
}
