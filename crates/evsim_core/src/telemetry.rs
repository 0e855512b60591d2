//! Telemetry: point-in-time snapshots and aggregate KPIs.
//!
//! External observers only ever see these copies, taken between steps; live
//! entity references never leave the engine.

use std::collections::VecDeque;

use bevy_ecs::prelude::{Entity, Resource, World};
use serde::Serialize;

use crate::charging::{ChargingDepot, StationId, StationStats};
use crate::clock::{SimClock, ONE_SEC_MS};
use crate::fleet::{Position, Vehicle, VehicleStats, VehicleStatus};
use crate::network::{NodeId, Point};
use crate::orders::{Order, OrderBook, OrderId, OrderStatus};

#[derive(Debug, Clone)]
pub struct VehicleSnapshot {
    pub entity: Entity,
    pub vehicle_id: u32,
    pub position: Point,
    pub status: VehicleStatus,
    pub battery_pct: f64,
    pub assigned_order: Option<OrderId>,
    pub assigned_station: Option<StationId>,
    pub stats: VehicleStats,
}

#[derive(Debug, Clone)]
pub struct OrderSnapshot {
    pub id: OrderId,
    pub status: OrderStatus,
    pub pickup_node: NodeId,
    pub dropoff_node: NodeId,
    pub created_at: u64,
    pub assigned_at: Option<u64>,
    pub pickup_at: Option<u64>,
    pub completed_at: Option<u64>,
    pub cancelled_at: Option<u64>,
    pub distance_m: f64,
    pub final_price: f64,
    pub vehicle: Option<Entity>,
}

impl From<&Order> for OrderSnapshot {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            status: order.status,
            pickup_node: order.pickup_node,
            dropoff_node: order.dropoff_node,
            created_at: order.created_at,
            assigned_at: order.assigned_at,
            pickup_at: order.pickup_at,
            completed_at: order.completed_at,
            cancelled_at: order.cancelled_at,
            distance_m: order.distance_m,
            final_price: order.final_price,
            vehicle: order.vehicle,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StationSnapshot {
    pub id: StationId,
    pub node: NodeId,
    pub occupied_slots: usize,
    pub total_slots: usize,
    pub stats: StationStats,
}

/// Per-status tallies at a point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimCounts {
    pub vehicles_idle: usize,
    pub vehicles_to_pickup: usize,
    pub vehicles_with_passenger: usize,
    pub vehicles_to_charging: usize,
    pub vehicles_charging: usize,
    pub orders_pending: usize,
    pub orders_assigned: usize,
    pub orders_picked_up: usize,
    pub orders_completed: usize,
    pub orders_cancelled: usize,
    pub occupied_slots: usize,
    pub total_slots: usize,
}

impl SimCounts {
    pub fn add_vehicle(&mut self, status: VehicleStatus) {
        match status {
            VehicleStatus::Idle => self.vehicles_idle += 1,
            VehicleStatus::ToPickup => self.vehicles_to_pickup += 1,
            VehicleStatus::WithPassenger => self.vehicles_with_passenger += 1,
            VehicleStatus::ToCharging => self.vehicles_to_charging += 1,
            VehicleStatus::Charging => self.vehicles_charging += 1,
        }
    }

    pub fn add_order(&mut self, status: OrderStatus) {
        match status {
            OrderStatus::Pending => self.orders_pending += 1,
            OrderStatus::Assigned => self.orders_assigned += 1,
            OrderStatus::PickedUp => self.orders_picked_up += 1,
            OrderStatus::Completed => self.orders_completed += 1,
            OrderStatus::Cancelled => self.orders_cancelled += 1,
        }
    }
}

/// Consistent copy of engine state at `timestamp_ms`. Safe to hold across
/// steps.
#[derive(Debug, Clone)]
pub struct SimSnapshot {
    pub timestamp_ms: u64,
    pub counts: SimCounts,
    pub vehicles: Vec<VehicleSnapshot>,
    pub orders: Vec<OrderSnapshot>,
    pub stations: Vec<StationSnapshot>,
}

impl SimSnapshot {
    /// Vehicles currently in `status`, the fleet counterpart of
    /// [`OrderBook::by_status`].
    pub fn vehicles_by_status(&self, status: VehicleStatus) -> Vec<&VehicleSnapshot> {
        self.vehicles
            .iter()
            .filter(|vehicle| vehicle.status == status)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Resource)]
pub struct SimSnapshotConfig {
    pub interval_ms: u64,
    pub max_snapshots: usize,
}

impl Default for SimSnapshotConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            max_snapshots: 10_000,
        }
    }
}

/// Rolling snapshot buffer.
#[derive(Debug, Default, Resource)]
pub struct SimSnapshots {
    pub snapshots: VecDeque<SimSnapshot>,
    pub last_snapshot_at: Option<u64>,
}

/// One completed trip, recorded when the vehicle reaches the dropoff.
#[derive(Debug, Clone)]
pub struct CompletedOrderRecord {
    pub order_id: OrderId,
    pub vehicle_entity: Entity,
    pub created_at: u64,
    pub assigned_at: u64,
    pub pickup_at: u64,
    pub completed_at: u64,
    pub distance_m: f64,
    pub final_price: f64,
}

impl CompletedOrderRecord {
    pub fn time_to_match(&self) -> u64 {
        self.assigned_at.saturating_sub(self.created_at)
    }

    pub fn time_to_pickup(&self) -> u64 {
        self.pickup_at.saturating_sub(self.assigned_at)
    }

    pub fn trip_duration(&self) -> u64 {
        self.completed_at.saturating_sub(self.pickup_at)
    }
}

#[derive(Debug, Default, Resource)]
pub struct SimTelemetry {
    pub completed_orders: Vec<CompletedOrderRecord>,
}

/// Aggregate statistics over a whole run. `PartialEq` so determinism tests
/// can compare runs directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimStats {
    pub orders_created: u64,
    pub orders_completed: u64,
    pub orders_cancelled: u64,
    pub total_revenue: f64,
    pub total_distance_km: f64,
    pub total_energy_pct: f64,
    pub charging_sessions: u64,
    pub charging_revenue: f64,
    pub avg_wait_secs: f64,
    /// Fraction of fleet-time spent in a non-idle status.
    pub fleet_utilization: f64,
}

pub(crate) fn build_snapshot(
    timestamp_ms: u64,
    vehicles: Vec<VehicleSnapshot>,
    orders: &OrderBook,
    depot: &ChargingDepot,
) -> SimSnapshot {
    let mut counts = SimCounts::default();
    for vehicle in &vehicles {
        counts.add_vehicle(vehicle.status);
    }

    let mut order_snaps = Vec::with_capacity(orders.len());
    for order in orders.iter() {
        counts.add_order(order.status);
        order_snaps.push(OrderSnapshot::from(order));
    }

    let mut stations = Vec::with_capacity(depot.stations().len());
    for station in depot.stations() {
        counts.occupied_slots += station.occupied_slots();
        counts.total_slots += station.total_slots;
        stations.push(StationSnapshot {
            id: station.id,
            node: station.node,
            occupied_slots: station.occupied_slots(),
            total_slots: station.total_slots,
            stats: station.stats,
        });
    }

    SimSnapshot {
        timestamp_ms,
        counts,
        vehicles,
        orders: order_snaps,
        stations,
    }
}

pub(crate) fn vehicle_snapshots(world: &mut World) -> Vec<VehicleSnapshot> {
    world
        .query::<(Entity, &Vehicle, &Position)>()
        .iter(world)
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
        .collect()
}

/// Copy-on-read snapshot of the whole engine state.
pub fn capture_snapshot(world: &mut World) -> SimSnapshot {
    let now = world.resource::<SimClock>().now();
    let vehicles = vehicle_snapshots(world);
    let orders = world.resource::<OrderBook>();
    let depot = world.resource::<ChargingDepot>();
    build_snapshot(now, vehicles, orders, depot)
}

/// Aggregates run-level KPIs from orders, fleet counters and stations.
pub fn aggregate_stats(world: &mut World) -> SimStats {
    let mut stats = SimStats::default();

    let mut wait_total_secs = 0.0;
    let mut waits = 0u64;
    {
        let orders = world.resource::<OrderBook>();
        for order in orders.iter() {
            stats.orders_created += 1;
            match order.status {
                OrderStatus::Completed => {
                    stats.orders_completed += 1;
                    stats.total_revenue += order.final_price;
                    if let Some(pickup_at) = order.pickup_at {
                        wait_total_secs +=
                            pickup_at.saturating_sub(order.created_at) as f64 / ONE_SEC_MS as f64;
                        waits += 1;
                    }
                }
                OrderStatus::Cancelled => stats.orders_cancelled += 1,
                _ => {}
            }
        }
    }
    if waits > 0 {
        stats.avg_wait_secs = wait_total_secs / waits as f64;
    }

    let elapsed_secs = world.resource::<SimClock>().now_secs();
    let mut fleet = 0usize;
    let mut idle_total_secs = 0.0;
    for vehicle in world.query::<&Vehicle>().iter(world) {
        fleet += 1;
        stats.total_distance_km += vehicle.stats.distance_m / 1000.0;
        idle_total_secs += vehicle.stats.idle_secs;
    }
    if fleet > 0 && elapsed_secs > 0.0 {
        stats.fleet_utilization =
            (1.0 - idle_total_secs / (fleet as f64 * elapsed_secs)).clamp(0.0, 1.0);
    }

    let depot = world.resource::<ChargingDepot>();
    for station in depot.stations() {
        stats.charging_sessions += station.stats.sessions;
        stats.total_energy_pct += station.stats.energy_pct;
        stats.charging_revenue += station.stats.revenue;
    }

    stats
}
