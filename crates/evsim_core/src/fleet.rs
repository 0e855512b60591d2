//! Vehicle fleet state: ECS components and the pure state mutators the
//! schedule systems drive.
//!
//! The fleet layer is physics and bookkeeping only. Business rules (who gets
//! dispatched where) live in the matching and charging systems; dispatching a
//! vehicle that is not idle is a scheduler defect and panics.

use bevy_ecs::prelude::Component;
use serde::{Deserialize, Serialize};

use crate::charging::StationId;
use crate::clock::ONE_SEC_MS;
use crate::network::{NodeId, Point};
use crate::orders::OrderId;

/// Distance below which a waypoint counts as reached.
pub const ARRIVAL_TOLERANCE_M: f64 = 0.5;

pub const FULL_BATTERY_PCT: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleStatus {
    Idle,
    ToPickup,
    WithPassenger,
    ToCharging,
    Charging,
}

/// Cumulative per-vehicle counters, never reset during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleStats {
    pub distance_m: f64,
    pub trips_completed: u64,
    pub revenue: f64,
    pub charging_cost: f64,
    pub idle_secs: f64,
}

#[derive(Debug, Clone, Component)]
pub struct Vehicle {
    pub id: u32,
    pub status: VehicleStatus,
    /// Battery level as a percentage of capacity, clamped to [0, 100].
    pub battery_pct: f64,
    pub current_node: NodeId,
    pub target_node: Option<NodeId>,
    pub assigned_order: Option<OrderId>,
    pub assigned_station: Option<StationId>,
    pub stats: VehicleStats,
    /// When the vehicle last became idle; basis of the idle-time fairness bonus.
    pub idle_since_ms: u64,
    /// Last charging dispatch or release, for the charging cooldown.
    pub last_charge_event_ms: Option<u64>,
}

impl Vehicle {
    pub fn new(id: u32, node: NodeId) -> Self {
        Self {
            id,
            status: VehicleStatus::Idle,
            battery_pct: FULL_BATTERY_PCT,
            current_node: node,
            target_node: None,
            assigned_order: None,
            assigned_station: None,
            stats: VehicleStats::default(),
            idle_since_ms: 0,
            last_charge_event_ms: None,
        }
    }

    pub fn idle_secs(&self, now_ms: u64) -> f64 {
        now_ms.saturating_sub(self.idle_since_ms) as f64 / ONE_SEC_MS as f64
    }

    /// Installs a trip assignment. Panics unless idle: only the scheduler can
    /// violate this.
    pub fn dispatch_to_order(&mut self, order: OrderId, pickup: NodeId) {
        assert_eq!(
            self.status,
            VehicleStatus::Idle,
            "vehicle {} dispatched to order {:?} while {:?}",
            self.id,
            order,
            self.status
        );
        self.status = VehicleStatus::ToPickup;
        self.assigned_order = Some(order);
        self.target_node = Some(pickup);
    }

    /// Installs a charging assignment. Panics unless idle.
    pub fn dispatch_to_charging(&mut self, station: StationId, station_node: NodeId) {
        assert_eq!(
            self.status,
            VehicleStatus::Idle,
            "vehicle {} dispatched to station {:?} while {:?}",
            self.id,
            station,
            self.status
        );
        self.status = VehicleStatus::ToCharging;
        self.assigned_station = Some(station);
        self.target_node = Some(station_node);
    }

    /// Returns the vehicle to idle and clears its assignment.
    pub fn set_idle(&mut self, now_ms: u64) {
        self.status = VehicleStatus::Idle;
        self.assigned_order = None;
        self.assigned_station = None;
        self.target_node = None;
        self.idle_since_ms = now_ms;
    }

    pub fn apply_charge(&mut self, amount_pct: f64) {
        self.battery_pct = (self.battery_pct + amount_pct).min(FULL_BATTERY_PCT);
    }

    pub fn consume_battery(&mut self, distance_m: f64, consumption_pct_per_km: f64) {
        self.battery_pct =
            (self.battery_pct - distance_m / 1000.0 * consumption_pct_per_km).max(0.0);
    }
}

/// Continuous planar position of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Component)]
pub struct Position(pub Point);

/// Path-following state: polyline waypoints plus a cursor. Removed when the
/// vehicle reaches the destination node.
#[derive(Debug, Clone, Component)]
pub struct RoutePlan {
    pub waypoints: Vec<Point>,
    pub cursor: usize,
    pub destination: NodeId,
}

impl RoutePlan {
    /// `None` when the polyline is empty (routing failed upstream).
    pub fn new(waypoints: Vec<Point>, destination: NodeId) -> Option<Self> {
        if waypoints.is_empty() {
            return None;
        }
        Some(Self {
            waypoints,
            cursor: 0,
            destination,
        })
    }

    pub fn current_waypoint(&self) -> Option<Point> {
        self.waypoints.get(self.cursor).copied()
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.waypoints.len()
    }

    pub fn final_waypoint(&self) -> Point {
        *self.waypoints.last().expect("route plan is never empty")
    }
}

/// Marker set by the movement system when a route plan completes; consumed by
/// the arrivals system within the same step.
#[derive(Debug, Clone, Copy, Component)]
pub struct Arrived;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charge_is_capped_at_full_battery() {
        let mut vehicle = Vehicle::new(0, NodeId(1));
        vehicle.battery_pct = 95.0;
        vehicle.apply_charge(20.0);
        assert_eq!(vehicle.battery_pct, FULL_BATTERY_PCT);
    }

    #[test]
    fn battery_never_goes_negative() {
        let mut vehicle = Vehicle::new(0, NodeId(1));
        vehicle.battery_pct = 0.5;
        vehicle.consume_battery(100_000.0, 0.2);
        assert_eq!(vehicle.battery_pct, 0.0);
    }

    #[test]
    #[should_panic(expected = "dispatched to order")]
    fn dispatching_a_busy_vehicle_panics() {
        let mut vehicle = Vehicle::new(0, NodeId(1));
        vehicle.dispatch_to_order(OrderId(1), NodeId(2));
        vehicle.dispatch_to_order(OrderId(2), NodeId(3));
    }

    #[test]
    fn set_idle_clears_assignment() {
        let mut vehicle = Vehicle::new(0, NodeId(1));
        vehicle.dispatch_to_order(OrderId(1), NodeId(2));
        vehicle.set_idle(5_000);
        assert_eq!(vehicle.status, VehicleStatus::Idle);
        assert_eq!(vehicle.assigned_order, None);
        assert_eq!(vehicle.target_node, None);
        assert_eq!(vehicle.idle_secs(8_000), 3.0);
    }

    #[test]
    fn empty_route_plan_is_rejected() {
        assert!(RoutePlan::new(Vec::new(), NodeId(1)).is_none());
    }
}
