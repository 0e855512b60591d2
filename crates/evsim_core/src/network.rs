//! Road network service: weighted directed graph with shortest-path queries.
//!
//! The graph is immutable after load, so route results are memoized in a
//! bounded LRU cache keyed by `(origin, destination)`. Graph acquisition is
//! behind the [`NetworkSource`] trait; the built-in [`SyntheticGrid`] source
//! generates a rectangular street grid for tests, benches and demos.

use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use bevy_ecs::prelude::Resource;
use log::{debug, warn};
use lru::LruCache;
use pathfinding::prelude::dijkstra;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Default capacity of the route cache.
pub const DEFAULT_ROUTE_CACHE_CAPACITY: usize = 20_000;

/// Identifier of a road-graph node.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Planar position in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Outgoing edge of a node. `geometry` holds intermediate polyline points
/// between the endpoints; empty means a straight segment.
#[derive(Debug, Clone)]
pub struct RoadEdge {
    pub to: NodeId,
    pub length_m: f64,
    pub geometry: Vec<Point>,
}

/// A resolved shortest path between two nodes.
#[derive(Debug, Clone)]
pub struct Route {
    pub nodes: Vec<NodeId>,
    pub distance_m: f64,
}

#[derive(Resource)]
pub struct RoadNetwork {
    positions: BTreeMap<NodeId, Point>,
    adjacency: HashMap<NodeId, Vec<RoadEdge>>,
    /// Sorted node ids, the basis for all reproducible sampling.
    node_ids: Vec<NodeId>,
    route_cache: Mutex<LruCache<(NodeId, NodeId), Option<Arc<Route>>>>,
}

impl RoadNetwork {
    pub fn new(nodes: Vec<(NodeId, Point)>, edges: Vec<(NodeId, RoadEdge)>) -> Self {
        Self::with_cache_capacity(nodes, edges, DEFAULT_ROUTE_CACHE_CAPACITY)
    }

    pub fn with_cache_capacity(
        nodes: Vec<(NodeId, Point)>,
        edges: Vec<(NodeId, RoadEdge)>,
        cache_capacity: usize,
    ) -> Self {
        let positions: BTreeMap<NodeId, Point> = nodes.into_iter().collect();
        let mut adjacency: HashMap<NodeId, Vec<RoadEdge>> = HashMap::new();
        for (from, edge) in edges {
            adjacency.entry(from).or_default().push(edge);
        }
        let node_ids: Vec<NodeId> = positions.keys().copied().collect();
        Self {
            positions,
            adjacency,
            node_ids,
            route_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(cache_capacity.max(1)).expect("cache capacity must be > 0"),
            )),
        }
    }

    pub fn node_count(&self) -> usize {
        self.node_ids.len()
    }

    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.positions.contains_key(&node)
    }

    pub fn position(&self, node: NodeId) -> Option<Point> {
        self.positions.get(&node).copied()
    }

    fn edge_between(&self, from: NodeId, to: NodeId) -> Option<&RoadEdge> {
        self.adjacency
            .get(&from)
            .and_then(|edges| edges.iter().find(|e| e.to == to))
    }

    /// Shortest path by total edge length, memoized. `None` when either node
    /// is absent or no path exists; both are recoverable for callers.
    pub fn route(&self, origin: NodeId, destination: NodeId) -> Option<Arc<Route>> {
        if !self.contains(origin) || !self.contains(destination) {
            debug!("route query with unknown node: {origin} -> {destination}");
            return None;
        }

        if let Ok(mut cache) = self.route_cache.lock() {
            if let Some(cached) = cache.get(&(origin, destination)) {
                return cached.clone();
            }
        }

        let result = self.compute_route(origin, destination).map(Arc::new);
        if result.is_none() {
            debug!("no route between {origin} and {destination}");
        }
        if let Ok(mut cache) = self.route_cache.lock() {
            cache.put((origin, destination), result.clone());
        }
        result
    }

    fn compute_route(&self, origin: NodeId, destination: NodeId) -> Option<Route> {
        // Dijkstra over integer centimetre costs; exact metre distance is
        // re-summed over the resulting node path.
        let (nodes, _cost) = dijkstra(
            &origin,
            |node| {
                self.adjacency
                    .get(node)
                    .map(|edges| {
                        edges
                            .iter()
                            .map(|e| (e.to, (e.length_m * 100.0).round() as u64))
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default()
            },
            |node| *node == destination,
        )?;

        let mut distance_m = 0.0;
        for pair in nodes.windows(2) {
            distance_m += self.edge_between(pair[0], pair[1])?.length_m;
        }
        Some(Route { nodes, distance_m })
    }

    /// Node ids along the shortest path; empty when unreachable (logged).
    pub fn shortest_path_nodes(&self, origin: NodeId, destination: NodeId) -> Vec<NodeId> {
        match self.route(origin, destination) {
            Some(route) => route.nodes.clone(),
            None => {
                warn!("shortest_path_nodes: no path {origin} -> {destination}");
                Vec::new()
            }
        }
    }

    /// Dense polyline along the shortest path: node positions joined through
    /// each edge's geometry, consecutive duplicates removed.
    pub fn shortest_path_points(&self, origin: NodeId, destination: NodeId) -> Vec<Point> {
        let Some(route) = self.route(origin, destination) else {
            warn!("shortest_path_points: no path {origin} -> {destination}");
            return Vec::new();
        };

        let mut points: Vec<Point> = Vec::new();
        let mut push = |p: Point, points: &mut Vec<Point>| {
            if points.last().map(|last| last.distance(&p) > 1e-9).unwrap_or(true) {
                points.push(p);
            }
        };

        for (i, node) in route.nodes.iter().enumerate() {
            if let Some(pos) = self.position(*node) {
                push(pos, &mut points);
            }
            if let Some(next) = route.nodes.get(i + 1) {
                if let Some(edge) = self.edge_between(*node, *next) {
                    for p in &edge.geometry {
                        push(*p, &mut points);
                    }
                }
            }
        }
        points
    }

    /// Total edge length of the shortest path; `f64::INFINITY` when
    /// unreachable.
    pub fn route_distance(&self, origin: NodeId, destination: NodeId) -> f64 {
        self.route(origin, destination)
            .map(|route| route.distance_m)
            .unwrap_or(f64::INFINITY)
    }

    /// Nearest node by planar distance. `None` only for an empty graph.
    pub fn nearest_node(&self, point: Point) -> Option<NodeId> {
        self.positions
            .iter()
            .min_by(|(_, a), (_, b)| {
                point
                    .distance(a)
                    .partial_cmp(&point.distance(b))
                    .expect("node positions are finite")
            })
            .map(|(id, _)| *id)
    }

    /// Reproducible sample of `n` distinct nodes, used once at start-up to
    /// place charging stations.
    pub fn select_station_nodes(&self, n: usize, seed: u64) -> Vec<NodeId> {
        let amount = n.min(self.node_ids.len());
        let mut rng = StdRng::seed_from_u64(seed);
        rand::seq::index::sample(&mut rng, self.node_ids.len(), amount)
            .into_iter()
            .map(|i| self.node_ids[i])
            .collect()
    }

    /// Uniformly random node from the caller's RNG.
    pub fn random_node<R: Rng>(&self, rng: &mut R) -> NodeId {
        self.node_ids[rng.gen_range(0..self.node_ids.len())]
    }
}

/// Errors from loading a road network.
#[derive(Debug)]
pub enum NetworkError {
    NoNodes,
    NoEdges,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::NoNodes => write!(f, "network has no nodes"),
            NetworkError::NoEdges => write!(f, "network has no edges"),
        }
    }
}

impl Error for NetworkError {}

/// Graph-loading collaborator. Implementations own the expensive acquisition
/// (tile fetching, file parsing); the engine only sees the finished graph.
pub trait NetworkSource {
    fn load(&self) -> Result<RoadNetwork, NetworkError>;
}

/// Rectangular street grid with bidirectional edges between 4-neighbours.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticGrid {
    pub cols: u64,
    pub rows: u64,
    pub spacing_m: f64,
}

impl SyntheticGrid {
    pub fn new(cols: u64, rows: u64, spacing_m: f64) -> Self {
        Self {
            cols,
            rows,
            spacing_m,
        }
    }
}

impl NetworkSource for SyntheticGrid {
    fn load(&self) -> Result<RoadNetwork, NetworkError> {
        if self.cols == 0 || self.rows == 0 {
            return Err(NetworkError::NoNodes);
        }
        if self.cols * self.rows < 2 {
            return Err(NetworkError::NoEdges);
        }

        let id = |col: u64, row: u64| NodeId(row * self.cols + col);
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        for row in 0..self.rows {
            for col in 0..self.cols {
                nodes.push((
                    id(col, row),
                    Point::new(col as f64 * self.spacing_m, row as f64 * self.spacing_m),
                ));
                let mut connect = |to_col: u64, to_row: u64| {
                    edges.push((
                        id(col, row),
                        RoadEdge {
                            to: id(to_col, to_row),
                            length_m: self.spacing_m,
                            geometry: Vec::new(),
                        },
                    ));
                };
                if col + 1 < self.cols {
                    connect(col + 1, row);
                }
                if col > 0 {
                    connect(col - 1, row);
                }
                if row + 1 < self.rows {
                    connect(col, row + 1);
                }
                if row > 0 {
                    connect(col, row - 1);
                }
            }
        }
        Ok(RoadNetwork::new(nodes, edges))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_3x3() -> RoadNetwork {
        SyntheticGrid::new(3, 3, 100.0).load().expect("grid")
    }

    #[test]
    fn shortest_path_follows_edge_lengths() {
        let network = grid_3x3();
        // Corner to corner is four 100 m hops.
        let nodes = network.shortest_path_nodes(NodeId(0), NodeId(8));
        assert_eq!(nodes.first(), Some(&NodeId(0)));
        assert_eq!(nodes.last(), Some(&NodeId(8)));
        assert_eq!(nodes.len(), 5);
        assert_eq!(network.route_distance(NodeId(0), NodeId(8)), 400.0);
    }

    #[test]
    fn path_to_self_is_single_node() {
        let network = grid_3x3();
        assert_eq!(network.shortest_path_nodes(NodeId(4), NodeId(4)), vec![NodeId(4)]);
        assert_eq!(network.route_distance(NodeId(4), NodeId(4)), 0.0);
    }

    #[test]
    fn unreachable_nodes_return_sentinels() {
        // Two nodes, one directed edge: b -> a is unreachable.
        let network = RoadNetwork::new(
            vec![
                (NodeId(1), Point::new(0.0, 0.0)),
                (NodeId(2), Point::new(10.0, 0.0)),
            ],
            vec![(
                NodeId(1),
                RoadEdge {
                    to: NodeId(2),
                    length_m: 10.0,
                    geometry: Vec::new(),
                },
            )],
        );
        assert!(network.shortest_path_nodes(NodeId(2), NodeId(1)).is_empty());
        assert!(network.route_distance(NodeId(2), NodeId(1)).is_infinite());
        assert!(network.shortest_path_nodes(NodeId(1), NodeId(99)).is_empty());
    }

    #[test]
    fn path_points_dedupe_consecutive_duplicates() {
        let network = grid_3x3();
        let points = network.shortest_path_points(NodeId(0), NodeId(2));
        assert_eq!(points.len(), 3);
        assert_eq!(points[0], Point::new(0.0, 0.0));
        assert_eq!(points[2], Point::new(200.0, 0.0));
    }

    #[test]
    fn nearest_node_by_planar_distance() {
        let network = grid_3x3();
        assert_eq!(network.nearest_node(Point::new(95.0, 110.0)), Some(NodeId(4)));
        assert_eq!(network.nearest_node(Point::new(-50.0, -50.0)), Some(NodeId(0)));
    }

    #[test]
    fn station_sampling_is_reproducible_and_distinct() {
        let network = grid_3x3();
        let a = network.select_station_nodes(4, 7);
        let b = network.select_station_nodes(4, 7);
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
        let mut dedup = a.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(dedup.len(), 4, "sampled nodes must be distinct");
        // Oversampling is clamped to the node count.
        assert_eq!(network.select_station_nodes(50, 7).len(), 9);
    }

    #[test]
    fn route_cache_serves_repeated_queries() {
        let network = grid_3x3();
        let first = network.route(NodeId(0), NodeId(8)).expect("route");
        let second = network.route(NodeId(0), NodeId(8)).expect("route");
        assert!(Arc::ptr_eq(&first, &second), "second query must hit the cache");
    }
}
