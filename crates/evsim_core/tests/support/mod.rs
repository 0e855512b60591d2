//! Shared world-building helpers for the system and integration tests.
#![allow(dead_code)]

use bevy_ecs::prelude::{Entity, Schedule, World};
use bevy_ecs::schedule::IntoSystemConfigs;

use evsim_core::charging::{ChargingDepot, ChargingParams};
use evsim_core::clock::SimClock;
use evsim_core::fleet::{Position, Vehicle};
use evsim_core::matching::{CostBasedDispatch, DispatchPolicyResource, DispatchWeights};
use evsim_core::network::{NodeId, RoadNetwork};
use evsim_core::orders::{OrderBook, OrderId, OrderParams};
use evsim_core::pricing::PricingParams;
use evsim_core::scenario::VehicleParams;
use evsim_core::telemetry::{SimSnapshotConfig, SimSnapshots, SimTelemetry};
use evsim_core::test_helpers::test_grid;

/// World with every schedule resource but no vehicles and no demand; tests
/// spawn vehicles and create orders explicitly.
pub fn base_world() -> World {
    base_world_with(test_grid(), &[NodeId(0), NodeId(99)])
}

pub fn base_world_with(network: RoadNetwork, station_nodes: &[NodeId]) -> World {
    let mut world = World::new();
    world.insert_resource(SimClock::new(1_000));
    world.insert_resource(SimTelemetry::default());
    world.insert_resource(SimSnapshotConfig::default());
    world.insert_resource(SimSnapshots::default());
    world.insert_resource(VehicleParams::default());
    world.insert_resource(PricingParams::default());
    world.insert_resource(OrderBook::new(
        OrderParams {
            hourly_rate: 0.0,
            max_wait_secs: 600,
        },
        1,
    ));
    world.insert_resource(DispatchPolicyResource::new(Box::new(
        CostBasedDispatch::new(DispatchWeights::default()),
    )));

    let params = VehicleParams::default();
    let sites = station_nodes
        .iter()
        .map(|node| {
            (
                *node,
                network.position(*node).expect("station node exists"),
            )
        })
        .collect();
    world.insert_resource(ChargingDepot::new(
        ChargingParams::default(),
        params.charge_threshold_pct,
        sites,
    ));
    world.insert_resource(network);
    world
}

pub fn spawn_vehicle(world: &mut World, id: u32, node: NodeId, battery_pct: f64) -> Entity {
    let position = world
        .resource::<RoadNetwork>()
        .position(node)
        .expect("vehicle node exists");
    let mut vehicle = Vehicle::new(id, node);
    vehicle.battery_pct = battery_pct;
    world.spawn((vehicle, Position(position))).id()
}

/// Creates a pending order between two nodes, priced like generated demand.
pub fn create_order(world: &mut World, pickup: NodeId, dropoff: NodeId) -> OrderId {
    let now = world.resource::<SimClock>().now();
    let (pickup_pos, dropoff_pos, distance_m) = {
        let network = world.resource::<RoadNetwork>();
        (
            network.position(pickup).expect("pickup node exists"),
            network.position(dropoff).expect("dropoff node exists"),
            network.route_distance(pickup, dropoff),
        )
    };
    assert!(distance_m.is_finite(), "test order must be routable");
    let price = world
        .resource::<PricingParams>()
        .order_price(distance_m, 1.0);
    world.resource_mut::<OrderBook>().create_order(
        pickup,
        dropoff,
        pickup_pos,
        dropoff_pos,
        distance_m,
        price,
        price,
        now,
    )
}

/// Runs the given systems once, in order, flushing commands between and
/// after them.
pub fn run_systems<M>(world: &mut World, systems: impl IntoSystemConfigs<M>) {
    let mut schedule = Schedule::default();
    schedule.add_systems(systems.chain());
    schedule.run(world);
}

pub fn advance_clock(world: &mut World) {
    world.resource_mut::<SimClock>().advance();
}
