//! Arrival phase: consumes [`Arrived`] markers produced by movement.
//!
//! Reaching a pickup starts the passenger leg, reaching a dropoff completes
//! the order and credits the vehicle, and reaching a station requests a slot.
//! A station that filled while the vehicle was en route is handled by
//! re-querying for another one, not by blocking.

use bevy_ecs::prelude::{Commands, Entity, Query, Res, ResMut, With};
use log::warn;

use crate::charging::ChargingDepot;
use crate::clock::SimClock;
use crate::fleet::{Arrived, RoutePlan, Vehicle, VehicleStatus};
use crate::network::RoadNetwork;
use crate::orders::OrderBook;
use crate::telemetry::{CompletedOrderRecord, SimTelemetry};

pub fn arrivals_system(
    mut commands: Commands,
    clock: Res<SimClock>,
    network: Res<RoadNetwork>,
    mut orders: ResMut<OrderBook>,
    mut depot: ResMut<ChargingDepot>,
    mut telemetry: ResMut<SimTelemetry>,
    mut query: Query<(Entity, &mut Vehicle), With<Arrived>>,
) {
    let now = clock.now();

    for (entity, mut vehicle) in query.iter_mut() {
        commands.entity(entity).remove::<Arrived>();

        match vehicle.status {
            VehicleStatus::ToPickup => {
                let order_id = vehicle
                    .assigned_order
                    .expect("vehicle en route to pickup has an order");
                orders.mark_picked_up(order_id, now);
                let order = orders.get(order_id).expect("order exists").clone();
                let points =
                    network.shortest_path_points(order.pickup_node, order.dropoff_node);
                // Generation only admits routable pairs and the graph is
                // immutable, so this plan always exists.
                let plan = RoutePlan::new(points, order.dropoff_node)
                    .expect("dropoff route exists for a generated order");
                vehicle.status = VehicleStatus::WithPassenger;
                vehicle.target_node = Some(order.dropoff_node);
                commands.entity(entity).insert(plan);
            }
            VehicleStatus::WithPassenger => {
                let order_id = vehicle
                    .assigned_order
                    .expect("vehicle with passenger has an order");
                let price = orders.complete(order_id, now);
                vehicle.stats.revenue += price;
                vehicle.stats.trips_completed += 1;

                let order = orders.get(order_id).expect("order exists");
                telemetry.completed_orders.push(CompletedOrderRecord {
                    order_id,
                    vehicle_entity: entity,
                    created_at: order.created_at,
                    assigned_at: order.assigned_at.expect("completed order was assigned"),
                    pickup_at: order.pickup_at.expect("completed order was picked up"),
                    completed_at: order.completed_at.expect("order just completed"),
                    distance_m: order.distance_m,
                    final_price: order.final_price,
                });

                vehicle.set_idle(now);
            }
            VehicleStatus::ToCharging => {
                let station = vehicle
                    .assigned_station
                    .expect("vehicle en route to charging has a station");
                if depot.request_slot(entity, station) {
                    vehicle.status = VehicleStatus::Charging;
                } else if let Some(alternative) =
                    depot.find_optimal_station(vehicle.current_node, &network)
                {
                    let node = depot.station(alternative).node;
                    let points = network.shortest_path_points(vehicle.current_node, node);
                    match RoutePlan::new(points, node) {
                        Some(plan) => {
                            vehicle.assigned_station = Some(alternative);
                            vehicle.target_node = Some(node);
                            commands.entity(entity).insert(plan);
                        }
                        None => {
                            warn!(
                                "vehicle {} has no route to fallback station {:?}",
                                vehicle.id, alternative
                            );
                            vehicle.set_idle(now);
                        }
                    }
                } else {
                    // Every station is full; try again from idle next time
                    // the charging check fires.
                    vehicle.set_idle(now);
                }
            }
            status => panic!(
                "vehicle {} arrived while {:?}; arrivals only follow a route",
                vehicle.id, status
            ),
        }
    }
}
