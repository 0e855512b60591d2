//! Trip lifecycle and generation.
//!
//! Orders move strictly forward: Pending -> Assigned -> PickedUp ->
//! Completed, with Pending -> Cancelled when the waiting limit is exceeded.
//! Backward or repeated transitions are scheduler defects and panic.
//! Completed and cancelled orders stay in the book for statistics.

use std::collections::BTreeMap;

use bevy_ecs::prelude::{Entity, Resource};
use log::warn;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Poisson};
use serde::{Deserialize, Serialize};

use crate::clock::ONE_SEC_MS;
use crate::network::{NodeId, Point, RoadNetwork};
use crate::pricing::PricingParams;

const ONE_HOUR_MS: u64 = 60 * 60 * ONE_SEC_MS;

/// Attempts at drawing a routable pickup/dropoff pair before giving up on one
/// generated order.
const MAX_PAIR_ATTEMPTS: usize = 8;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct OrderId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Assigned,
    PickedUp,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub pickup_node: NodeId,
    pub dropoff_node: NodeId,
    pub pickup_pos: Point,
    pub dropoff_pos: Point,
    pub status: OrderStatus,
    pub created_at: u64,
    pub assigned_at: Option<u64>,
    pub pickup_at: Option<u64>,
    pub completed_at: Option<u64>,
    pub cancelled_at: Option<u64>,
    pub distance_m: f64,
    pub base_price: f64,
    /// Base price times the surge multiplier at creation time.
    pub final_price: f64,
    pub vehicle: Option<Entity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderParams {
    /// Expected new orders per simulated hour, before surge scaling.
    pub hourly_rate: f64,
    /// Pending orders older than this are cancelled.
    pub max_wait_secs: u64,
}

impl Default for OrderParams {
    fn default() -> Self {
        Self {
            hourly_rate: 60.0,
            max_wait_secs: 600,
        }
    }
}

/// Owns every order of the run plus the explicitly seeded generator RNG.
/// Orders are keyed in a `BTreeMap` so all iteration is deterministic.
#[derive(Resource)]
pub struct OrderBook {
    orders: BTreeMap<OrderId, Order>,
    rng: StdRng,
    next_id: u64,
    pub params: OrderParams,
}

impl OrderBook {
    pub fn new(params: OrderParams, seed: u64) -> Self {
        Self {
            orders: BTreeMap::new(),
            rng: StdRng::seed_from_u64(seed),
            next_id: 0,
            params,
        }
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    /// Pending order ids in creation order.
    pub fn pending_ids(&self) -> Vec<OrderId> {
        self.orders
            .values()
            .filter(|o| o.status == OrderStatus::Pending)
            .map(|o| o.id)
            .collect()
    }

    pub fn by_status(&self, status: OrderStatus) -> Vec<&Order> {
        self.orders
            .values()
            .filter(|o| o.status == status)
            .collect()
    }

    /// Inserts a fully specified pending order. Generation and tests both go
    /// through here.
    #[allow(clippy::too_many_arguments)]
    pub fn create_order(
        &mut self,
        pickup_node: NodeId,
        dropoff_node: NodeId,
        pickup_pos: Point,
        dropoff_pos: Point,
        distance_m: f64,
        base_price: f64,
        final_price: f64,
        now_ms: u64,
    ) -> OrderId {
        let id = OrderId(self.next_id);
        self.next_id += 1;
        self.orders.insert(
            id,
            Order {
                id,
                pickup_node,
                dropoff_node,
                pickup_pos,
                dropoff_pos,
                status: OrderStatus::Pending,
                created_at: now_ms,
                assigned_at: None,
                pickup_at: None,
                completed_at: None,
                cancelled_at: None,
                distance_m,
                base_price,
                final_price,
                vehicle: None,
            },
        );
        id
    }

    /// Draws the number of new orders from a Poisson process at
    /// `hourly_rate * dt / 3600`, scaled by the surge multiplier for the
    /// current hour, then creates each with random distinct routable
    /// endpoints.
    pub fn generate(
        &mut self,
        now_ms: u64,
        dt_secs: f64,
        network: &RoadNetwork,
        pricing: &PricingParams,
    ) -> Vec<OrderId> {
        if network.node_count() < 2 {
            return Vec::new();
        }
        let hour = ((now_ms / ONE_HOUR_MS) % 24) as u8;
        let surge = pricing.surge_for_hour(hour);
        let lambda = self.params.hourly_rate * dt_secs / 3600.0 * surge;
        if lambda <= 0.0 {
            return Vec::new();
        }
        let poisson = match Poisson::new(lambda) {
            Ok(p) => p,
            Err(_) => return Vec::new(),
        };
        let count = poisson.sample(&mut self.rng) as u64;

        let mut created = Vec::new();
        for _ in 0..count {
            let mut pair = None;
            for _ in 0..MAX_PAIR_ATTEMPTS {
                let pickup = network.random_node(&mut self.rng);
                let dropoff = network.random_node(&mut self.rng);
                if pickup == dropoff {
                    continue;
                }
                let distance_m = network.route_distance(pickup, dropoff);
                if distance_m.is_finite() {
                    pair = Some((pickup, dropoff, distance_m));
                    break;
                }
            }
            let Some((pickup, dropoff, distance_m)) = pair else {
                warn!("order generation: no routable pickup/dropoff pair found");
                continue;
            };
            let pickup_pos = network.position(pickup).expect("node has a position");
            let dropoff_pos = network.position(dropoff).expect("node has a position");
            let base_price = pricing.order_price(distance_m, 1.0);
            let final_price = pricing.order_price(distance_m, surge);
            created.push(self.create_order(
                pickup,
                dropoff,
                pickup_pos,
                dropoff_pos,
                distance_m,
                base_price,
                final_price,
                now_ms,
            ));
        }
        created
    }

    fn order_mut(&mut self, id: OrderId) -> &mut Order {
        self.orders
            .get_mut(&id)
            .unwrap_or_else(|| panic!("unknown order {id:?}"))
    }

    /// Pending -> Assigned. Calling twice for the same order is a scheduler
    /// defect and panics.
    pub fn assign_to_vehicle(&mut self, id: OrderId, vehicle: Entity, now_ms: u64) {
        let order = self.order_mut(id);
        assert_eq!(
            order.status,
            OrderStatus::Pending,
            "order {id:?} assigned while {:?}",
            order.status
        );
        order.status = OrderStatus::Assigned;
        order.assigned_at = Some(now_ms);
        order.vehicle = Some(vehicle);
    }

    /// Assigned -> PickedUp.
    pub fn mark_picked_up(&mut self, id: OrderId, now_ms: u64) {
        let order = self.order_mut(id);
        assert_eq!(
            order.status,
            OrderStatus::Assigned,
            "order {id:?} picked up while {:?}",
            order.status
        );
        order.status = OrderStatus::PickedUp;
        order.pickup_at = Some(now_ms);
    }

    /// PickedUp -> Completed. Returns the final price to credit the vehicle.
    pub fn complete(&mut self, id: OrderId, now_ms: u64) -> f64 {
        let order = self.order_mut(id);
        assert_eq!(
            order.status,
            OrderStatus::PickedUp,
            "order {id:?} completed while {:?}",
            order.status
        );
        order.status = OrderStatus::Completed;
        order.completed_at = Some(now_ms);
        order.final_price
    }

    /// Cancels every pending order whose wait exceeds `max_wait_secs`.
    /// Assigned and picked-up orders never expire.
    pub fn expire_pending(&mut self, now_ms: u64) -> Vec<OrderId> {
        let max_wait_ms = self.params.max_wait_secs * ONE_SEC_MS;
        let mut expired = Vec::new();
        for order in self.orders.values_mut() {
            if order.status == OrderStatus::Pending
                && now_ms.saturating_sub(order.created_at) > max_wait_ms
            {
                order.status = OrderStatus::Cancelled;
                order.cancelled_at = Some(now_ms);
                expired.push(order.id);
            }
        }
        expired
    }
}
