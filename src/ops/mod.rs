//! Operational concerns.
//!
//! - [`telemetry`] - Log subscriber installation

pub mod telemetry;
