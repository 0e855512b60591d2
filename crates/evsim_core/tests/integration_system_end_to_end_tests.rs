use std::collections::HashMap;

use evsim_core::engine::SimulationEngine;
use evsim_core::fleet::VehicleStatus;
use evsim_core::orders::OrderStatus;
use evsim_core::telemetry::SimSnapshot;
use evsim_core::test_helpers::{test_config, test_grid};

fn assert_snapshot_consistent(snapshot: &SimSnapshot, fleet_size: usize) {
    let counts = &snapshot.counts;
    assert_eq!(
        counts.vehicles_idle
            + counts.vehicles_to_pickup
            + counts.vehicles_with_passenger
            + counts.vehicles_to_charging
            + counts.vehicles_charging,
        fleet_size
    );
    assert!(counts.occupied_slots <= counts.total_slots);

    let orders_by_id: HashMap<u64, _> = snapshot
        .orders
        .iter()
        .map(|order| (order.id.0, order))
        .collect();

    let mut holders: HashMap<u64, u32> = HashMap::new();
    for vehicle in &snapshot.vehicles {
        assert!(
            (0.0..=100.0).contains(&vehicle.battery_pct),
            "vehicle {} battery {} out of range",
            vehicle.vehicle_id,
            vehicle.battery_pct
        );

        match vehicle.status {
            VehicleStatus::ToPickup | VehicleStatus::WithPassenger => {
                let order_id = vehicle
                    .assigned_order
                    .expect("trip-bound vehicle has an order")
                    .0;
                let previous = holders.insert(order_id, vehicle.vehicle_id);
                assert_eq!(
                    previous, None,
                    "order {order_id} held by two vehicles at once"
                );
                let order = orders_by_id
                    .get(&order_id)
                    .expect("assigned order is in the book");
                let expected = if vehicle.status == VehicleStatus::ToPickup {
                    OrderStatus::Assigned
                } else {
                    OrderStatus::PickedUp
                };
                assert_eq!(order.status, expected);
                assert_eq!(order.vehicle, Some(vehicle.entity));
            }
            VehicleStatus::ToCharging | VehicleStatus::Charging => {
                assert!(vehicle.assigned_station.is_some());
                assert_eq!(vehicle.assigned_order, None);
            }
            VehicleStatus::Idle => {
                assert_eq!(vehicle.assigned_order, None);
                assert_eq!(vehicle.assigned_station, None);
            }
        }
    }

    for order in &snapshot.orders {
        if order.status == OrderStatus::Assigned || order.status == OrderStatus::PickedUp {
            assert!(
                holders.contains_key(&order.id.0),
                "in-flight order {} has no vehicle working it",
                order.id.0
            );
        }
    }
}

#[test]
fn invariants_hold_across_a_long_run() {
    let config = test_config();
    let fleet_size = config.fleet_size;
    let mut engine = SimulationEngine::new(config, test_grid()).expect("engine");

    let mut previous_now = engine.now();
    for _ in 0..1_800 {
        assert!(engine.run_step());
        assert!(engine.now() > previous_now, "clock must advance every step");
        previous_now = engine.now();
        assert_snapshot_consistent(&engine.snapshot(), fleet_size);
    }

    let stats = engine.stats();
    assert!(stats.orders_created > 0);
    assert!(stats.orders_completed > 0);
    assert!(stats.total_revenue > 0.0);
    assert!((0.0..=1.0).contains(&stats.fleet_utilization));
    assert_eq!(
        stats.orders_created,
        engine.snapshot().orders.len() as u64,
        "completed and cancelled orders stay in the book"
    );
}

#[test]
fn snapshot_buffer_ticks_at_the_configured_interval() {
    let mut config = test_config();
    config.snapshot_interval_ms = 5_000;
    let mut engine = SimulationEngine::new(config, test_grid()).expect("engine");
    engine.run_for(60_000);

    let world = engine.world_mut();
    let snapshots = world.resource::<evsim_core::telemetry::SimSnapshots>();
    assert!(snapshots.snapshots.len() >= 12);
    let timestamps: Vec<u64> = snapshots.snapshots.iter().map(|s| s.timestamp_ms).collect();
    for pair in timestamps.windows(2) {
        assert!(pair[0] < pair[1], "snapshot timestamps must increase");
        assert!(pair[1] - pair[0] >= 5_000);
    }
}

#[test]
fn charging_keeps_the_fleet_alive_under_sustained_load() {
    let mut config = test_config();
    // Heavy drain: a vehicle empties after 50 km without charging.
    config.vehicle.consumption_pct_per_km = 2.0;
    config.orders.hourly_rate = 240.0;
    let mut engine = SimulationEngine::new(config, test_grid()).expect("engine");
    engine.run_for(3_600_000);

    let stats = engine.stats();
    assert!(
        stats.charging_sessions > 0,
        "an hour of heavy drain must force charging"
    );
    assert!(stats.total_energy_pct > 0.0);
    assert!(stats.charging_revenue > 0.0);
    for vehicle in &engine.snapshot().vehicles {
        assert!(vehicle.battery_pct >= 0.0);
    }
}

#[test]
fn run_to_completion_covers_the_configured_duration() {
    let mut config = test_config();
    config.duration_secs = 120;
    let mut engine = SimulationEngine::new(config, test_grid()).expect("engine");

    let steps = engine.run_to_completion();
    assert_eq!(steps, 120);
    assert_eq!(engine.now(), 120_000);
    assert_eq!(engine.run_to_completion(), 0, "the run is already complete");
    // Explicit run_for still works past the configured length.
    assert_eq!(engine.run_for(5_000), 5);
}

#[test]
fn snapshot_status_views_agree_with_the_counts() {
    let mut engine = SimulationEngine::new(test_config(), test_grid()).expect("engine");
    engine.run_for(300_000);

    let snapshot = engine.snapshot();
    for (status, count) in [
        (VehicleStatus::Idle, snapshot.counts.vehicles_idle),
        (VehicleStatus::ToPickup, snapshot.counts.vehicles_to_pickup),
        (
            VehicleStatus::WithPassenger,
            snapshot.counts.vehicles_with_passenger,
        ),
        (VehicleStatus::ToCharging, snapshot.counts.vehicles_to_charging),
        (VehicleStatus::Charging, snapshot.counts.vehicles_charging),
    ] {
        let view = snapshot.vehicles_by_status(status);
        assert_eq!(view.len(), count);
        assert!(view.iter().all(|v| v.status == status));
    }
}

#[test]
fn pause_and_stop_take_effect_at_step_boundaries() {
    let mut engine = SimulationEngine::new(test_config(), test_grid()).expect("engine");
    let control = engine.control_handle();

    control.pause();
    assert!(!engine.run_step(), "paused engine must not step");
    assert_eq!(engine.now(), 0);

    control.resume();
    assert!(engine.run_step());
    assert_eq!(engine.now(), 1_000);

    control.set_speed(4.0);
    engine.run_step();
    assert_eq!(engine.speed_multiplier(), 4.0);

    control.stop();
    let stepped = engine.run_for(10_000);
    assert_eq!(stepped, 0, "a stopped engine runs no further steps");
    assert!(engine.is_stopped());
}
