use bevy_ecs::prelude::Entity;

use super::VehicleCandidate;
use crate::network::RoadNetwork;
use crate::orders::Order;

/// Picks the vehicle to serve a pending order.
///
/// Implementations must be `Send + Sync` so the policy can live in a shared
/// ECS resource, and must be deterministic: given the same order and the same
/// candidate slice they return the same vehicle. Candidates the road network
/// cannot route to the pickup are ineligible.
pub trait DispatchPolicy: Send + Sync {
    /// Returns the best candidate for the order, or `None` when the slice is
    /// empty or no candidate can reach the pickup.
    fn find_best_vehicle(
        &self,
        order: &Order,
        candidates: &[VehicleCandidate],
        network: &RoadNetwork,
    ) -> Option<Entity>;
}
