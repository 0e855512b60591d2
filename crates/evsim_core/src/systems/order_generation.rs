//! Order generation phase: draws new trip requests for this step.

use bevy_ecs::prelude::{Res, ResMut};

use crate::clock::SimClock;
use crate::network::RoadNetwork;
use crate::orders::OrderBook;
use crate::pricing::PricingParams;

pub fn order_generation_system(
    clock: Res<SimClock>,
    mut orders: ResMut<OrderBook>,
    network: Res<RoadNetwork>,
    pricing: Res<PricingParams>,
) {
    orders.generate(clock.now(), clock.step_secs(), &network, &pricing);
}
