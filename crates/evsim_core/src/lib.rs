//! Electric-vehicle fleet simulation engine.
//!
//! Simulates a fleet of EVs serving ride requests on a road network over
//! fixed time steps: trip dispatch, battery consumption, and
//! charging-station contention. Built so dispatch and charging policies can
//! be compared headlessly and reproducibly; a fixed seed yields bit-identical
//! runs.

pub mod charging;
pub mod clock;
pub mod engine;
pub mod fleet;
pub mod matching;
pub mod network;
pub mod orders;
pub mod pricing;
pub mod scenario;
pub mod systems;
pub mod telemetry;
pub mod telemetry_export;

#[cfg(feature = "test-helpers")]
pub mod test_helpers;
