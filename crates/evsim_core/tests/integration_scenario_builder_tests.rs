use evsim_core::engine::SimulationEngine;
use evsim_core::network::{NetworkSource, RoadNetwork, SyntheticGrid};
use evsim_core::scenario::ConfigError;
use evsim_core::test_helpers::{test_config, test_grid};

#[test]
fn engine_rejects_invalid_configuration() {
    let mut config = test_config();
    config.charging.rate_pct_per_sec = -1.0;
    let result = SimulationEngine::new(config, test_grid());
    assert!(matches!(
        result.err(),
        Some(ConfigError::NonPositive {
            field: "charging.rate_pct_per_sec",
            ..
        })
    ));
}

#[test]
fn engine_rejects_an_empty_network() {
    let network = RoadNetwork::new(Vec::new(), Vec::new());
    let result = SimulationEngine::new(test_config(), network);
    assert!(matches!(result.err(), Some(ConfigError::EmptyNetwork)));
}

#[test]
fn degenerate_grids_fail_to_load() {
    assert!(SyntheticGrid::new(0, 5, 100.0).load().is_err());
    assert!(SyntheticGrid::new(1, 1, 100.0).load().is_err());
    assert!(SyntheticGrid::new(2, 1, 100.0).load().is_ok());
}

#[test]
fn station_count_is_clamped_to_the_network() {
    let mut config = test_config();
    config.charging.station_count = 1_000;
    let mut engine = SimulationEngine::new(config, test_grid()).expect("engine");
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.stations.len(), 100, "one station per node at most");
    let nodes: std::collections::BTreeSet<_> =
        snapshot.stations.iter().map(|s| s.node).collect();
    assert_eq!(nodes.len(), 100, "station sites are distinct");
}
