//! Charging-station capacity and occupancy.
//!
//! Stations are owned by the [`ChargingDepot`] resource. Occupancy is a
//! `BTreeMap` keyed by vehicle entity so that charge advancement iterates in
//! a deterministic order. A station's occupied slots can never exceed its
//! slot count; `request_slot` is the only way in.

use std::collections::{BTreeMap, HashMap};

use bevy_ecs::prelude::{Entity, Resource};
use serde::{Deserialize, Serialize};

use crate::clock::ONE_SEC_MS;
use crate::fleet::{Vehicle, VehicleStatus};
use crate::network::{NodeId, Point, RoadNetwork};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct StationId(pub u32);

/// Cumulative per-station counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StationStats {
    pub sessions: u64,
    /// Battery percent-points delivered across all sessions.
    pub energy_pct: f64,
    pub revenue: f64,
}

#[derive(Debug, Clone)]
pub struct ChargingStation {
    pub id: StationId,
    pub node: NodeId,
    pub position: Point,
    pub total_slots: usize,
    /// Occupant -> elapsed charging seconds.
    occupants: BTreeMap<Entity, f64>,
    pub stats: StationStats,
}

impl ChargingStation {
    fn new(id: StationId, node: NodeId, position: Point, total_slots: usize) -> Self {
        Self {
            id,
            node,
            position,
            total_slots,
            occupants: BTreeMap::new(),
            stats: StationStats::default(),
        }
    }

    pub fn occupied_slots(&self) -> usize {
        self.occupants.len()
    }

    pub fn has_free_slot(&self) -> bool {
        self.occupants.len() < self.total_slots
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargingParams {
    pub station_count: usize,
    pub slots_per_station: usize,
    /// Battery percent-points added per second of charging.
    pub rate_pct_per_sec: f64,
    /// Price per percent-point delivered.
    pub price_per_pct: f64,
    /// Minimum gap between charging decisions for one vehicle, to stop
    /// charge/idle thrashing.
    pub cooldown_secs: u64,
    /// Metres added to a station's effective distance per occupied slot.
    pub queue_penalty_m: f64,
}

impl Default for ChargingParams {
    fn default() -> Self {
        Self {
            station_count: 4,
            slots_per_station: 3,
            rate_pct_per_sec: 0.5,
            price_per_pct: 0.08,
            cooldown_secs: 300,
            queue_penalty_m: 500.0,
        }
    }
}

#[derive(Resource)]
pub struct ChargingDepot {
    stations: Vec<ChargingStation>,
    by_vehicle: HashMap<Entity, StationId>,
    pub params: ChargingParams,
    /// Battery percentage at or below which idle vehicles should charge.
    /// Copied from the fleet configuration at build time.
    charge_threshold_pct: f64,
}

impl ChargingDepot {
    pub fn new(
        params: ChargingParams,
        charge_threshold_pct: f64,
        sites: Vec<(NodeId, Point)>,
    ) -> Self {
        let slots = params.slots_per_station;
        let stations = sites
            .into_iter()
            .enumerate()
            .map(|(i, (node, position))| {
                ChargingStation::new(StationId(i as u32), node, position, slots)
            })
            .collect();
        Self {
            stations,
            by_vehicle: HashMap::new(),
            params,
            charge_threshold_pct,
        }
    }

    pub fn stations(&self) -> &[ChargingStation] {
        &self.stations
    }

    pub fn station(&self, id: StationId) -> &ChargingStation {
        &self.stations[id.0 as usize]
    }

    pub fn station_of(&self, vehicle: Entity) -> Option<StationId> {
        self.by_vehicle.get(&vehicle).copied()
    }

    /// True iff the vehicle is idle, at or below the charging threshold, and
    /// outside the cooldown window since its last charging event.
    pub fn should_charge(&self, vehicle: &Vehicle, now_ms: u64) -> bool {
        if vehicle.status != VehicleStatus::Idle {
            return false;
        }
        if vehicle.battery_pct > self.charge_threshold_pct {
            return false;
        }
        match vehicle.last_charge_event_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.params.cooldown_secs * ONE_SEC_MS,
        }
    }

    /// Station with a free slot minimizing route distance plus a
    /// load-balancing queue penalty. `None` when every station is full or
    /// unreachable.
    pub fn find_optimal_station(
        &self,
        from: NodeId,
        network: &RoadNetwork,
    ) -> Option<StationId> {
        let mut best: Option<(StationId, f64)> = None;
        for station in &self.stations {
            if !station.has_free_slot() {
                continue;
            }
            let distance_m = network.route_distance(from, station.node);
            if !distance_m.is_finite() {
                continue;
            }
            let cost = distance_m + self.params.queue_penalty_m * station.occupied_slots() as f64;
            match best {
                None => best = Some((station.id, cost)),
                Some((_, best_cost)) if cost < best_cost => best = Some((station.id, cost)),
                _ => {}
            }
        }
        best.map(|(id, _)| id)
    }

    /// Reserves a slot. Returns false when the station filled between
    /// selection and request; the caller re-queries instead of blocking.
    pub fn request_slot(&mut self, vehicle: Entity, station: StationId) -> bool {
        debug_assert!(
            !self.by_vehicle.contains_key(&vehicle),
            "vehicle already holds a slot"
        );
        let station = &mut self.stations[station.0 as usize];
        if !station.has_free_slot() {
            return false;
        }
        station.occupants.insert(vehicle, 0.0);
        self.by_vehicle.insert(vehicle, station.id);
        debug_assert!(station.occupants.len() <= station.total_slots);
        true
    }

    /// Ends a charging session: returns `(energy_pct, cost)` and updates the
    /// station counters once. Returns `(0.0, 0.0)` when the vehicle holds no
    /// slot, so repeated release is harmless.
    pub fn release_slot(&mut self, vehicle: Entity) -> (f64, f64) {
        let Some(station_id) = self.by_vehicle.remove(&vehicle) else {
            return (0.0, 0.0);
        };
        let station = &mut self.stations[station_id.0 as usize];
        let elapsed_secs = station
            .occupants
            .remove(&vehicle)
            .expect("slot index and occupancy map agree");
        let energy_pct = elapsed_secs * self.params.rate_pct_per_sec;
        let cost = energy_pct * self.params.price_per_pct;
        // Energy was already accumulated tick-by-tick in advance(); only the
        // session count and revenue land here.
        station.stats.sessions += 1;
        station.stats.revenue += cost;
        (energy_pct, cost)
    }

    /// Advances every active session by `dt` and returns the per-vehicle
    /// charge deltas for the fleet to apply.
    pub fn advance(&mut self, dt_secs: f64) -> Vec<(Entity, f64)> {
        let mut deltas = Vec::new();
        for station in &mut self.stations {
            let delta = self.params.rate_pct_per_sec * dt_secs;
            for (vehicle, elapsed) in station.occupants.iter_mut() {
                *elapsed += dt_secs;
                station.stats.energy_pct += delta;
                deltas.push((*vehicle, delta));
            }
        }
        deltas
    }

    /// Total occupied slots across all stations.
    pub fn active_sessions(&self) -> usize {
        self.by_vehicle.len()
    }
}
