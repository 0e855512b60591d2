mod support;

use evsim_core::fleet::{RoutePlan, Vehicle, VehicleStatus};
use evsim_core::network::NodeId;
use evsim_core::orders::{OrderBook, OrderStatus};
use evsim_core::systems::matching::matching_system;

use support::{base_world, create_order, run_systems, spawn_vehicle};

#[test]
fn closest_idle_vehicle_gets_the_order_and_a_route_plan() {
    let mut world = base_world();
    let near = spawn_vehicle(&mut world, 0, NodeId(3), 100.0);
    let far = spawn_vehicle(&mut world, 1, NodeId(99), 100.0);
    let order = create_order(&mut world, NodeId(5), NodeId(55));

    run_systems(&mut world, matching_system);

    let book = world.resource::<OrderBook>();
    let stored = book.get(order).expect("order");
    assert_eq!(stored.status, OrderStatus::Assigned);
    assert_eq!(stored.vehicle, Some(near));

    let vehicle = world.entity(near).get::<Vehicle>().expect("vehicle");
    assert_eq!(vehicle.status, VehicleStatus::ToPickup);
    assert_eq!(vehicle.assigned_order, Some(order));
    assert_eq!(vehicle.target_node, Some(NodeId(5)));
    assert!(world.entity(near).contains::<RoutePlan>());

    let other = world.entity(far).get::<Vehicle>().expect("vehicle");
    assert_eq!(other.status, VehicleStatus::Idle);
    assert!(!world.entity(far).contains::<RoutePlan>());
}

#[test]
fn vehicles_at_the_charging_threshold_are_not_candidates() {
    let mut world = base_world();
    // Threshold is 20 %: at or below it a vehicle must not take trips.
    spawn_vehicle(&mut world, 0, NodeId(5), 20.0);
    let order = create_order(&mut world, NodeId(5), NodeId(55));

    run_systems(&mut world, matching_system);

    let book = world.resource::<OrderBook>();
    assert_eq!(book.get(order).expect("order").status, OrderStatus::Pending);
}

#[test]
fn busy_vehicles_are_not_candidates() {
    let mut world = base_world();
    let entity = spawn_vehicle(&mut world, 0, NodeId(5), 100.0);
    world
        .entity_mut(entity)
        .get_mut::<Vehicle>()
        .expect("vehicle")
        .status = VehicleStatus::WithPassenger;
    let order = create_order(&mut world, NodeId(5), NodeId(55));

    run_systems(&mut world, matching_system);

    let book = world.resource::<OrderBook>();
    assert_eq!(book.get(order).expect("order").status, OrderStatus::Pending);
}

#[test]
fn a_vehicle_serves_at_most_one_order_per_step() {
    let mut world = base_world();
    let entity = spawn_vehicle(&mut world, 0, NodeId(0), 100.0);
    let first = create_order(&mut world, NodeId(1), NodeId(9));
    let second = create_order(&mut world, NodeId(2), NodeId(9));

    run_systems(&mut world, matching_system);

    let book = world.resource::<OrderBook>();
    assert_eq!(book.get(first).expect("order").status, OrderStatus::Assigned);
    assert_eq!(
        book.get(second).expect("order").status,
        OrderStatus::Pending,
        "the only vehicle is already committed this step"
    );
    let vehicle = world.entity(entity).get::<Vehicle>().expect("vehicle");
    assert_eq!(vehicle.assigned_order, Some(first));
}

#[test]
fn orders_stay_pending_when_no_vehicle_is_available() {
    let mut world = base_world();
    let order = create_order(&mut world, NodeId(5), NodeId(55));

    run_systems(&mut world, matching_system);

    let book = world.resource::<OrderBook>();
    assert_eq!(book.get(order).expect("order").status, OrderStatus::Pending);
}
