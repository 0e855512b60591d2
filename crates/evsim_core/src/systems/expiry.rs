//! Expiry phase: cancels pending orders past the waiting-time limit.

use bevy_ecs::prelude::{Res, ResMut};
use log::debug;

use crate::clock::SimClock;
use crate::orders::OrderBook;

pub fn order_expiry_system(clock: Res<SimClock>, mut orders: ResMut<OrderBook>) {
    let expired = orders.expire_pending(clock.now());
    if !expired.is_empty() {
        debug!("{} orders expired at {}", expired.len(), clock.now());
    }
}
