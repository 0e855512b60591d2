//! Trip pricing: per-kilometre base rate with a surge multiplier during
//! configured peak-hour windows.

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Resource, Serialize, Deserialize)]
pub struct PricingParams {
    pub base_rate_per_km: f64,
    /// Multiplier applied inside peak windows; off-peak is 1.0.
    pub surge_multiplier: f64,
    /// Half-open `[start, end)` hour-of-day windows.
    pub peak_hours: Vec<(u8, u8)>,
}

impl Default for PricingParams {
    fn default() -> Self {
        Self {
            base_rate_per_km: 1.5,
            surge_multiplier: 1.5,
            // Morning and evening commute windows.
            peak_hours: vec![(7, 9), (17, 19)],
        }
    }
}

impl PricingParams {
    pub fn surge_for_hour(&self, hour: u8) -> f64 {
        let peak = self
            .peak_hours
            .iter()
            .any(|(start, end)| hour >= *start && hour < *end);
        if peak {
            self.surge_multiplier
        } else {
            1.0
        }
    }

    /// Price of a trip of `distance_m` at the given surge level.
    pub fn order_price(&self, distance_m: f64, surge: f64) -> f64 {
        distance_m / 1000.0 * self.base_rate_per_km * surge
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surge_applies_only_inside_peak_windows() {
        let pricing = PricingParams::default();
        assert_eq!(pricing.surge_for_hour(3), 1.0);
        assert_eq!(pricing.surge_for_hour(7), 1.5);
        assert_eq!(pricing.surge_for_hour(8), 1.5);
        assert_eq!(pricing.surge_for_hour(9), 1.0);
        assert_eq!(pricing.surge_for_hour(18), 1.5);
    }

    #[test]
    fn price_scales_with_distance_and_surge() {
        let pricing = PricingParams::default();
        let base = pricing.order_price(2_000.0, 1.0);
        assert!((base - 3.0).abs() < 1e-9);
        let surged = pricing.order_price(2_000.0, pricing.surge_for_hour(8));
        assert!((surged - 4.5).abs() < 1e-9);
    }
}
