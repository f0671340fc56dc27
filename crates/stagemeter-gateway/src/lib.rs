//! stagemeter gateway library entry.
//!
//! Metrics registry and exposition endpoint (`obs`, `ops`, `router`), the
//! stage instrumentation layer (`instrument`), config loading, and the demo
//! host used by the binary (`main.rs`) and integration tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod demo;
pub mod instrument;
pub mod obs;
pub mod ops;
pub mod router;

pub use instrument::{wrap_stage, InstrumentedProxy, StageExt};
pub use obs::{AccuracyReporter, MetricsRegistry};
