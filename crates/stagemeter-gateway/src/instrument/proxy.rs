//! Delegating wrapper around a `ServingStage`.
//!
//! The proxy implements `ServingStage` itself, so the host takes it in place
//! of the wrapped object. `decode_request`, `predict` and `encode_response`
//! are recorded; `setup` and `name` forward unchanged. Anything else on the
//! wrapped type (inherent methods, public fields) is reached through `Deref`,
//! which borrows the live object rather than a snapshot.
//!
//! Proxies share the process-wide `MetricsRegistry` they are given; they never
//! create one.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use stagemeter_core::stage::{ServingStage, StageName};

use super::recorder::StageRecorder;
use crate::obs::MetricsRegistry;

pub struct InstrumentedProxy<S> {
    stage: S,
    metrics: Arc<MetricsRegistry>,
    decode: StageRecorder,
    predict: StageRecorder,
    encode: StageRecorder,
}

impl<S> InstrumentedProxy<S> {
    pub fn new(stage: S, metrics: Arc<MetricsRegistry>) -> Self {
        let rec = |st: StageName| StageRecorder::new(st.as_str(), Arc::clone(&metrics));
        Self {
            decode: rec(StageName::DecodeRequest),
            predict: rec(StageName::Predict),
            encode: rec(StageName::EncodeResponse),
            stage,
            metrics,
        }
    }

    /// Recorder used for `stage`.
    pub fn recorder(&self, stage: StageName) -> &StageRecorder {
        match stage {
            StageName::DecodeRequest => &self.decode,
            StageName::Predict => &self.predict,
            StageName::EncodeResponse => &self.encode,
        }
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn inner(&self) -> &S {
        &self.stage
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.stage
    }

    pub fn into_inner(self) -> S {
        self.stage
    }
}

impl<S: ServingStage> ServingStage for InstrumentedProxy<S> {
    type Request = S::Request;
    type Input = S::Input;
    type Output = S::Output;
    type Response = S::Response;
    type Error = S::Error;

    fn setup(&mut self, device: &str) -> Result<(), Self::Error> {
        self.stage.setup(device)
    }

    fn decode_request(&self, request: Self::Request) -> Result<Self::Input, Self::Error> {
        self.decode.call(|| self.stage.decode_request(request))
    }

    fn predict(&self, input: Self::Input) -> Result<Self::Output, Self::Error> {
        self.predict.call(|| self.stage.predict(input))
    }

    fn encode_response(&self, output: Self::Output) -> Result<Self::Response, Self::Error> {
        self.encode.call(|| self.stage.encode_response(output))
    }

    fn name(&self) -> &str {
        self.stage.name()
    }
}

impl<S> Deref for InstrumentedProxy<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.stage
    }
}

impl<S> DerefMut for InstrumentedProxy<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.stage
    }
}

/// Wrap `stage` so its three pipeline stages are recorded into `metrics`.
pub fn wrap_stage<S: ServingStage>(
    stage: S,
    metrics: Arc<MetricsRegistry>,
) -> InstrumentedProxy<S> {
    InstrumentedProxy::new(stage, metrics)
}

pub trait StageExt: ServingStage + Sized {
    fn instrumented(self, metrics: Arc<MetricsRegistry>) -> InstrumentedProxy<Self> {
        InstrumentedProxy::new(self, metrics)
    }
}

impl<S: ServingStage> StageExt for S {}
