//! Top-level facade crate for stagemeter.
//!
//! Re-exports core types and the gateway library so users can depend on a single crate.

pub mod core {
    pub use stagemeter_core::*;
}

pub mod gateway {
    pub use stagemeter_gateway::*;
}

pub use stagemeter_core::{ServingStage, StageName};
pub use stagemeter_gateway::{wrap_stage, InstrumentedProxy, MetricsRegistry, StageExt};
