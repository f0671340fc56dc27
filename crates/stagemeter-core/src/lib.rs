//! stagemeter core: stage naming, outcome classification, the host-facing
//! stage trait, and the shared error surface.
//!
//! This crate carries no runtime or transport dependencies so the stage
//! contract can be implemented by any host without pulling in the exporter.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `StagemeterError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod stage;

/// Shared result type.
pub use error::{Result, StagemeterError};
pub use stage::{serve_one, Outcome, ServingStage, StageName};
