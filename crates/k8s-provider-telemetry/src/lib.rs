//! This crate contains the tracing primitives used by the provider binary: console output on
//! stderr and optional rolling JSON file logs.
pub mod tracing;

pub use tracing::Tracing;
