//! Vehicle-to-order dispatch policies.

pub mod cost_based;
pub mod policy;

use bevy_ecs::prelude::{Entity, Resource};
use serde::{Deserialize, Serialize};

pub use cost_based::CostBasedDispatch;
pub use policy::DispatchPolicy;

use crate::network::NodeId;

/// An idle vehicle eligible for dispatch. Callers pass candidates sorted by
/// `vehicle_id` so score ties resolve to the lowest id deterministically.
#[derive(Debug, Clone, Copy)]
pub struct VehicleCandidate {
    pub entity: Entity,
    pub vehicle_id: u32,
    pub node: NodeId,
    pub battery_pct: f64,
    pub idle_secs: f64,
}

/// Scoring weights. Empirically chosen; exposed as configuration so studies
/// can sweep them. All weights are in metres of pickup-distance equivalent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DispatchWeights {
    /// Below this battery percentage the severe penalty applies.
    pub critical_battery_pct: f64,
    /// Below this battery percentage (and above critical) the moderate
    /// penalty applies.
    pub low_battery_pct: f64,
    pub critical_battery_penalty_m: f64,
    pub low_battery_penalty_m: f64,
    /// Bonus per currency unit of expected trip revenue.
    pub revenue_bonus_m: f64,
    /// Fairness bonus per second the candidate has been idle.
    pub idle_bonus_m_per_sec: f64,
}

impl Default for DispatchWeights {
    fn default() -> Self {
        Self {
            critical_battery_pct: 30.0,
            low_battery_pct: 50.0,
            critical_battery_penalty_m: 50_000.0,
            low_battery_penalty_m: 10_000.0,
            revenue_bonus_m: 50.0,
            idle_bonus_m_per_sec: 1.0,
        }
    }
}

/// Resource wrapper for the dispatch policy trait object.
#[derive(Resource)]
pub struct DispatchPolicyResource(pub Box<dyn DispatchPolicy>);

impl DispatchPolicyResource {
    pub fn new(policy: Box<dyn DispatchPolicy>) -> Self {
        Self(policy)
    }
}

impl std::ops::Deref for DispatchPolicyResource {
    type Target = dyn DispatchPolicy;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}
