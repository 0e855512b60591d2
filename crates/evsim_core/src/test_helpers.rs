//! Shared test setup: small deterministic networks and configurations used
//! across unit and integration tests.

use crate::network::{NetworkSource, RoadNetwork, SyntheticGrid};
use crate::scenario::SimulationConfig;

/// 10x10 grid with 100 m edges; every pair of nodes is routable.
pub fn test_grid() -> RoadNetwork {
    SyntheticGrid::new(10, 10, 100.0)
        .load()
        .expect("synthetic grid always loads")
}

/// Smaller 4x4 grid for tests that inspect individual routes.
pub fn small_grid() -> RoadNetwork {
    SyntheticGrid::new(4, 4, 100.0)
        .load()
        .expect("synthetic grid always loads")
}

/// Busy-but-small configuration: enough demand that matching happens within
/// a few steps, few enough vehicles that charging contention shows up.
pub fn test_config() -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.fleet_size = 8;
    config.orders.hourly_rate = 120.0;
    config.charging.station_count = 2;
    config.charging.slots_per_station = 2;
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NodeId;

    #[test]
    fn test_grid_is_fully_routable() {
        let network = test_grid();
        assert_eq!(network.node_count(), 100);
        let route = network.route(NodeId(0), NodeId(99)).expect("corner route");
        assert!((route.distance_m - 1_800.0).abs() < 1e-6);
    }

    #[test]
    fn test_config_is_valid() {
        assert!(test_config().validate().is_ok());
    }
}
