use serde_json::{json, Value};
use thiserror::Error;

use stagemeter_core::stage::ServingStage;

use crate::obs::AccuracyReporter;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DemoError {
    #[error("request has no \"input\" field")]
    MissingInput,
    #[error("\"input\" must be a number, got {0}")]
    NotANumber(String),
    #[error("stage used before setup")]
    NotReady,
}

impl DemoError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, DemoError::MissingInput | DemoError::NotANumber(_))
    }
}

type Model = fn(f64) -> f64;

fn square(x: f64) -> f64 {
    x * x
}

fn cube(x: f64) -> f64 {
    x * x * x
}

/// Compound stage: two toy models summed. Reports accuracy against the
/// closed-form reference on every prediction.
pub struct SimpleStage {
    models: Option<(Model, Model)>,
    device: Option<String>,
    accuracy: AccuracyReporter,
}

impl SimpleStage {
    pub fn new(accuracy: AccuracyReporter) -> Self {
        Self {
            models: None,
            device: None,
            accuracy,
        }
    }

    /// Device passed to `setup`, if it has run.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }
}

impl ServingStage for SimpleStage {
    type Request = Value;
    type Input = f64;
    type Output = f64;
    type Response = Value;
    type Error = DemoError;

    fn setup(&mut self, device: &str) -> Result<(), DemoError> {
        self.models = Some((square, cube));
        self.device = Some(device.to_string());
        tracing::info!(%device, "simple stage ready");
        Ok(())
    }

    fn decode_request(&self, request: Value) -> Result<f64, DemoError> {
        let input = request.get("input").ok_or(DemoError::MissingInput)?;
        input
            .as_f64()
            .ok_or_else(|| DemoError::NotANumber(input.to_string()))
    }

    fn predict(&self, x: f64) -> Result<f64, DemoError> {
        let (m1, m2) = self.models.ok_or(DemoError::NotReady)?;
        let output = m1(x) + m2(x);

        let expected = x.powi(2) + x.powi(3);
        let accuracy = if (output - expected).abs() < 0.001 { 1.0 } else { 0.95 };
        self.accuracy.report(accuracy);

        Ok(output)
    }

    fn encode_response(&self, output: f64) -> Result<Value, DemoError> {
        Ok(json!({ "output": output }))
    }

    fn name(&self) -> &str {
        "simple"
    }
}
