//! Stage instrumentation.
//!
//! `StageRecorder` times one call and records it; `Instrumented` binds a
//! recorder to an arbitrary function; `InstrumentedProxy` applies recorders
//! to the three pipeline stages of a `ServingStage` and forwards the rest.

pub mod proxy;
pub mod recorder;

pub use proxy::{wrap_stage, InstrumentedProxy, StageExt};
pub use recorder::{instrument, Instrumented, StageRecorder};
