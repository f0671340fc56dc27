//! Per-call timing.
//!
//! A call guard records on drop, so a stage call is counted once whether it
//! returns `Ok`, returns `Err`, or unwinds.

use std::sync::Arc;
use std::time::Instant;

use stagemeter_core::stage::Outcome;

use crate::obs::MetricsRegistry;

/// Times calls for one stage label and records them into the registry.
#[derive(Clone)]
pub struct StageRecorder {
    stage: &'static str,
    metrics: Arc<MetricsRegistry>,
}

impl StageRecorder {
    pub fn new(stage: &'static str, metrics: Arc<MetricsRegistry>) -> Self {
        Self { stage, metrics }
    }

    /// Stage label this recorder writes under.
    pub fn name(&self) -> &'static str {
        self.stage
    }

    /// Run `op`, then record exactly one outcome and one duration sample.
    ///
    /// The result is returned untouched. A panic inside `op` is recorded as a
    /// failure while it unwinds.
    pub fn call<T, E>(&self, op: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        let mut guard = CallGuard {
            recorder: self,
            start: Instant::now(),
            outcome: Outcome::Failure,
        };
        let res = op();
        guard.outcome = Outcome::of(&res);
        res
    }
}

/// Records on drop so every exit path is counted.
struct CallGuard<'a> {
    recorder: &'a StageRecorder,
    start: Instant,
    outcome: Outcome,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let stage = self.recorder.stage;
        self.recorder.metrics.record(self.outcome, stage, elapsed);
        if self.outcome == Outcome::Failure {
            let elapsed_us = elapsed.as_micros() as u64;
            tracing::debug!(%stage, elapsed_us, "stage call failed");
        }
    }
}

/// A function wrapped with a stage recorder.
///
/// Multiple arguments are passed as a tuple; the wrapper never inspects them.
pub struct Instrumented<F> {
    recorder: StageRecorder,
    op: F,
}

impl<F> Instrumented<F> {
    pub fn new(stage: &'static str, metrics: Arc<MetricsRegistry>, op: F) -> Self {
        Self {
            recorder: StageRecorder::new(stage, metrics),
            op,
        }
    }

    /// Label of the wrapped operation.
    pub fn name(&self) -> &'static str {
        self.recorder.name()
    }

    /// The unwrapped operation.
    pub fn inner(&self) -> &F {
        &self.op
    }

    pub fn call<A, T, E>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Result<T, E>,
    {
        self.recorder.call(|| (self.op)(args))
    }
}

/// Wrap `op` so each call is recorded under `stage`.
pub fn instrument<F>(
    stage: &'static str,
    metrics: Arc<MetricsRegistry>,
    op: F,
) -> Instrumented<F> {
    Instrumented::new(stage, metrics, op)
}
