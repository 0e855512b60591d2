use bevy_ecs::prelude::Entity;
use log::debug;

use super::{DispatchPolicy, DispatchWeights, VehicleCandidate};
use crate::network::RoadNetwork;
use crate::orders::Order;

/// Default dispatch policy: minimizes
/// `pickup_distance + battery_penalty - revenue_bonus - idle_bonus`.
///
/// The battery penalty is tiered so low-battery vehicles only win when
/// nothing healthier is anywhere near; the idle bonus spreads work across the
/// fleet.
#[derive(Debug)]
pub struct CostBasedDispatch {
    pub weights: DispatchWeights,
}

impl CostBasedDispatch {
    pub fn new(weights: DispatchWeights) -> Self {
        Self { weights }
    }

    fn battery_penalty_m(&self, battery_pct: f64) -> f64 {
        if battery_pct < self.weights.critical_battery_pct {
            self.weights.critical_battery_penalty_m
        } else if battery_pct < self.weights.low_battery_pct {
            self.weights.low_battery_penalty_m
        } else {
            0.0
        }
    }

    fn score(&self, candidate: &VehicleCandidate, pickup_distance_m: f64, order: &Order) -> f64 {
        pickup_distance_m + self.battery_penalty_m(candidate.battery_pct)
            - order.final_price * self.weights.revenue_bonus_m
            - candidate.idle_secs * self.weights.idle_bonus_m_per_sec
    }
}

impl Default for CostBasedDispatch {
    fn default() -> Self {
        Self::new(DispatchWeights::default())
    }
}

impl DispatchPolicy for CostBasedDispatch {
    fn find_best_vehicle(
        &self,
        order: &Order,
        candidates: &[VehicleCandidate],
        network: &RoadNetwork,
    ) -> Option<Entity> {
        let mut best: Option<(Entity, f64)> = None;

        for candidate in candidates {
            let pickup_distance_m = network.route_distance(candidate.node, order.pickup_node);
            if !pickup_distance_m.is_finite() {
                debug!(
                    "vehicle {} cannot reach pickup {} for order {:?}",
                    candidate.vehicle_id, order.pickup_node, order.id
                );
                continue;
            }
            let score = self.score(candidate, pickup_distance_m, order);
            // Strict comparison: with candidates sorted by vehicle id, ties
            // keep the lowest id for reproducible runs.
            match best {
                None => best = Some((candidate.entity, score)),
                Some((_, best_score)) if score < best_score => {
                    best = Some((candidate.entity, score))
                }
                _ => {}
            }
        }

        best.map(|(entity, _)| entity)
    }
}
