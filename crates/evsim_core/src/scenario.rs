//! Scenario setup: validated configuration and world building.
//!
//! `build_world` inserts every resource the schedule needs and spawns the
//! fleet at seeded-random nodes with full batteries. Invalid numeric
//! parameters fail construction before any state exists.

use std::error::Error;
use std::fmt;

use bevy_ecs::prelude::{Resource, World};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::charging::{ChargingDepot, ChargingParams};
use crate::clock::SimClock;
use crate::fleet::{Position, Vehicle};
use crate::matching::{CostBasedDispatch, DispatchPolicyResource, DispatchWeights};
use crate::network::RoadNetwork;
use crate::orders::{OrderBook, OrderParams};
use crate::pricing::PricingParams;
use crate::telemetry::{SimSnapshotConfig, SimSnapshots, SimTelemetry};

/// Vehicle physics parameters, shared by the whole fleet.
#[derive(Debug, Clone, Copy, Resource, Serialize, Deserialize)]
pub struct VehicleParams {
    pub speed_mps: f64,
    /// Battery percent-points consumed per kilometre driven.
    pub consumption_pct_per_km: f64,
    /// At or below this battery percentage an idle vehicle is sent to charge.
    pub charge_threshold_pct: f64,
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self {
            speed_mps: 10.0,
            consumption_pct_per_km: 0.4,
            charge_threshold_pct: 20.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub seed: u64,
    pub fleet_size: usize,
    pub vehicle: VehicleParams,
    pub orders: OrderParams,
    pub pricing: PricingParams,
    pub charging: ChargingParams,
    pub dispatch: DispatchWeights,
    pub step_ms: u64,
    /// Total simulated run length; the engine's run-to-completion loop
    /// consumes it.
    pub duration_secs: u64,
    pub snapshot_interval_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            fleet_size: 20,
            vehicle: VehicleParams::default(),
            orders: OrderParams::default(),
            pricing: PricingParams::default(),
            charging: ChargingParams::default(),
            dispatch: DispatchWeights::default(),
            step_ms: 1_000,
            duration_secs: 3_600,
            snapshot_interval_ms: 10_000,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    NonPositive { field: &'static str, value: f64 },
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    EmptyNetwork,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NonPositive { field, value } => {
                write!(f, "{field} must be positive, got {value}")
            }
            ConfigError::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(f, "{field} must be within [{min}, {max}], got {value}"),
            ConfigError::EmptyNetwork => write!(f, "road network has no nodes"),
        }
    }
}

impl Error for ConfigError {}

impl SimulationConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
            if value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::NonPositive { field, value })
            }
        }

        positive("fleet_size", self.fleet_size as f64)?;
        positive("vehicle.speed_mps", self.vehicle.speed_mps)?;
        positive(
            "vehicle.consumption_pct_per_km",
            self.vehicle.consumption_pct_per_km,
        )?;
        if !(0.0..=100.0).contains(&self.vehicle.charge_threshold_pct) {
            return Err(ConfigError::OutOfRange {
                field: "vehicle.charge_threshold_pct",
                value: self.vehicle.charge_threshold_pct,
                min: 0.0,
                max: 100.0,
            });
        }
        // Demand may legitimately be switched off, so zero is in range.
        if self.orders.hourly_rate < 0.0 {
            return Err(ConfigError::NonPositive {
                field: "orders.hourly_rate",
                value: self.orders.hourly_rate,
            });
        }
        positive("orders.max_wait_secs", self.orders.max_wait_secs as f64)?;
        positive("pricing.base_rate_per_km", self.pricing.base_rate_per_km)?;
        positive("pricing.surge_multiplier", self.pricing.surge_multiplier)?;
        positive("charging.station_count", self.charging.station_count as f64)?;
        positive(
            "charging.slots_per_station",
            self.charging.slots_per_station as f64,
        )?;
        positive("charging.rate_pct_per_sec", self.charging.rate_pct_per_sec)?;
        positive("charging.price_per_pct", self.charging.price_per_pct)?;
        positive("step_ms", self.step_ms as f64)?;
        positive("duration_secs", self.duration_secs as f64)?;
        positive(
            "snapshot_interval_ms",
            self.snapshot_interval_ms as f64,
        )?;
        Ok(())
    }
}

/// Builds a ready-to-step world from a validated configuration and a loaded
/// road network.
pub fn build_world(
    config: &SimulationConfig,
    network: RoadNetwork,
) -> Result<World, ConfigError> {
    config.validate()?;
    if network.node_count() == 0 {
        return Err(ConfigError::EmptyNetwork);
    }

    let mut world = World::new();
    world.insert_resource(SimClock::new(config.step_ms));
    world.insert_resource(SimTelemetry::default());
    world.insert_resource(SimSnapshotConfig {
        interval_ms: config.snapshot_interval_ms,
        ..SimSnapshotConfig::default()
    });
    world.insert_resource(SimSnapshots::default());
    world.insert_resource(config.vehicle);
    world.insert_resource(config.pricing.clone());
    world.insert_resource(OrderBook::new(config.orders.clone(), config.seed));
    world.insert_resource(DispatchPolicyResource::new(Box::new(
        CostBasedDispatch::new(config.dispatch),
    )));

    let station_sites = network
        .select_station_nodes(config.charging.station_count, config.seed ^ 0x5eed_cafe)
        .into_iter()
        .map(|node| (node, network.position(node).expect("sampled node exists")))
        .collect();
    world.insert_resource(ChargingDepot::new(
        config.charging.clone(),
        config.vehicle.charge_threshold_pct,
        station_sites,
    ));

    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(1));
    for i in 0..config.fleet_size {
        let node = network.random_node(&mut rng);
        let position = network.position(node).expect("node has a position");
        world.spawn((Vehicle::new(i as u32, node), Position(position)));
    }

    world.insert_resource(network);
    Ok(world)
}
