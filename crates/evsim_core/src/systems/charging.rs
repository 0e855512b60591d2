//! Charging phases: advance active sessions, then evaluate idle vehicles.

use bevy_ecs::prelude::{Commands, Entity, Query, Res, ResMut};
use log::warn;

use crate::charging::ChargingDepot;
use crate::clock::SimClock;
use crate::fleet::{RoutePlan, Vehicle, FULL_BATTERY_PCT};
use crate::network::RoadNetwork;

/// Applies this step's charge to every occupied slot and releases vehicles
/// that reached a full battery.
pub fn charging_advance_system(
    clock: Res<SimClock>,
    mut depot: ResMut<ChargingDepot>,
    mut vehicles: Query<&mut Vehicle>,
) {
    let now = clock.now();
    for (entity, delta_pct) in depot.advance(clock.step_secs()) {
        let Ok(mut vehicle) = vehicles.get_mut(entity) else {
            continue;
        };
        vehicle.apply_charge(delta_pct);
        if vehicle.battery_pct >= FULL_BATTERY_PCT {
            let (_energy_pct, cost) = depot.release_slot(entity);
            vehicle.stats.charging_cost += cost;
            vehicle.set_idle(now);
            vehicle.last_charge_event_ms = Some(now);
        }
    }
}

/// Sends idle low-battery vehicles to the best reachable station.
pub fn charging_decision_system(
    mut commands: Commands,
    clock: Res<SimClock>,
    network: Res<RoadNetwork>,
    depot: Res<ChargingDepot>,
    mut vehicles: Query<(Entity, &mut Vehicle)>,
) {
    let now = clock.now();
    for (entity, mut vehicle) in vehicles.iter_mut() {
        if !depot.should_charge(&vehicle, now) {
            continue;
        }
        let Some(station) = depot.find_optimal_station(vehicle.current_node, &network) else {
            // All stations full or unreachable; stay idle and retry next step.
            continue;
        };
        let node = depot.station(station).node;
        let points = network.shortest_path_points(vehicle.current_node, node);
        let Some(plan) = RoutePlan::new(points, node) else {
            warn!(
                "vehicle {} has no route to station {:?}",
                vehicle.id, station
            );
            continue;
        };
        vehicle.dispatch_to_charging(station, node);
        // Cooldown starts at the decision so a failed attempt cannot thrash.
        vehicle.last_charge_event_ms = Some(now);
        commands.entity(entity).insert(plan);
    }
}
