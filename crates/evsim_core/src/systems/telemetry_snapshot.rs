//! Snapshot phase: captures engine state into the rolling buffer at the
//! configured interval.

use bevy_ecs::prelude::{Entity, Query, Res, ResMut};

use crate::charging::ChargingDepot;
use crate::clock::SimClock;
use crate::fleet::{Position, Vehicle};
use crate::orders::OrderBook;
use crate::telemetry::{
    build_snapshot, SimSnapshotConfig, SimSnapshots, VehicleSnapshot,
};

/// Run condition: the snapshot interval has elapsed.
pub fn snapshot_due(
    clock: Res<SimClock>,
    config: Res<SimSnapshotConfig>,
    snapshots: Res<SimSnapshots>,
) -> bool {
    match snapshots.last_snapshot_at {
        None => true,
        Some(last) => clock.now().saturating_sub(last) >= config.interval_ms,
    }
}

pub fn capture_snapshot_system(
    clock: Res<SimClock>,
    config: Res<SimSnapshotConfig>,
    mut snapshots: ResMut<SimSnapshots>,
    orders: Res<OrderBook>,
    depot: Res<ChargingDepot>,
    vehicles: Query<(Entity, &Vehicle, &Position)>,
) {
    let vehicle_snaps: Vec<VehicleSnapshot> = vehicles
        .iter()
        .map(|(entity, vehicle, position)| VehicleSnapshot {
            entity,
            vehicle_id: vehicle.id,
            position: position.0,
            status: vehicle.status,
            battery_pct: vehicle.battery_pct,
            assigned_order: vehicle.assigned_order,
            assigned_station: vehicle.assigned_station,
            stats: vehicle.stats,
        })
        .collect();

    let snapshot = build_snapshot(clock.now(), vehicle_snaps, &orders, &depot);
    snapshots.snapshots.push_back(snapshot);
    while snapshots.snapshots.len() > config.max_snapshots {
        snapshots.snapshots.pop_front();
    }
    snapshots.last_snapshot_at = Some(clock.now());
}
