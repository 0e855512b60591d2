//! One system per step phase, run in the fixed order the engine schedule
//! chains them in: order generation, matching, movement, arrivals, charging
//! advance, charging decision, order expiry, snapshot capture.

pub mod arrivals;
pub mod charging;
pub mod expiry;
pub mod matching;
pub mod movement;
pub mod order_generation;
pub mod telemetry_snapshot;
