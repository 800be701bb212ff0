//! Observability module for the Room Coordinator.
//!
//! Provides metrics definitions and instrumentation helpers.

pub mod metrics;
