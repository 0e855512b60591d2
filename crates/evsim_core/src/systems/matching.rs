//! Matching phase: pairs pending orders with available vehicles.
//!
//! Candidates are idle vehicles above the charging threshold, sorted by
//! vehicle id so policy ties break deterministically. Each assignment
//! installs the pickup route plan in the same step.

use bevy_ecs::prelude::{Commands, Entity, Query, Res, ResMut};
use log::warn;

use crate::clock::SimClock;
use crate::fleet::{RoutePlan, Vehicle, VehicleStatus};
use crate::matching::{DispatchPolicyResource, VehicleCandidate};
use crate::network::RoadNetwork;
use crate::orders::OrderBook;
use crate::scenario::VehicleParams;

pub fn matching_system(
    mut commands: Commands,
    clock: Res<SimClock>,
    mut orders: ResMut<OrderBook>,
    network: Res<RoadNetwork>,
    policy: Res<DispatchPolicyResource>,
    params: Res<VehicleParams>,
    mut vehicles: Query<(Entity, &mut Vehicle)>,
) {
    let pending = orders.pending_ids();
    if pending.is_empty() {
        return;
    }

    let now = clock.now();
    let mut candidates: Vec<VehicleCandidate> = vehicles
        .iter()
        .filter(|(_, v)| {
            v.status == VehicleStatus::Idle && v.battery_pct > params.charge_threshold_pct
        })
        .map(|(entity, v)| VehicleCandidate {
            entity,
            vehicle_id: v.id,
            node: v.current_node,
            battery_pct: v.battery_pct,
            idle_secs: v.idle_secs(now),
        })
        .collect();
    candidates.sort_by_key(|c| c.vehicle_id);

    for order_id in pending {
        if candidates.is_empty() {
            break;
        }
        let order = orders
            .get(order_id)
            .expect("pending id is in the book")
            .clone();
        let Some(chosen) = policy.find_best_vehicle(&order, &candidates, &network) else {
            // No candidate can serve this order; it stays pending for the
            // next step.
            continue;
        };

        let (_, mut vehicle) = vehicles
            .get_mut(chosen)
            .expect("policy only returns candidates");
        let points = network.shortest_path_points(vehicle.current_node, order.pickup_node);
        let Some(plan) = RoutePlan::new(points, order.pickup_node) else {
            warn!(
                "vehicle {} lost its route to pickup {} for order {:?}",
                vehicle.id, order.pickup_node, order.id
            );
            candidates.retain(|c| c.entity != chosen);
            continue;
        };

        orders.assign_to_vehicle(order_id, chosen, now);
        vehicle.dispatch_to_order(order_id, order.pickup_node);
        commands.entity(chosen).insert(plan);
        candidates.retain(|c| c.entity != chosen);
    }
}
