//! Fixed-step simulation clock.
//!
//! Time is simulated milliseconds. Each engine step runs the full phase
//! schedule at `now()` and then advances the clock by exactly one `step_ms`.

use bevy_ecs::prelude::Resource;

pub const ONE_SEC_MS: u64 = 1000;
const ONE_HOUR_MS: u64 = 60 * 60 * ONE_SEC_MS;

#[derive(Debug, Clone, Copy, Resource)]
pub struct SimClock {
    now_ms: u64,
    step_ms: u64,
}

impl SimClock {
    pub fn new(step_ms: u64) -> Self {
        assert!(step_ms > 0, "step size must be positive");
        Self { now_ms: 0, step_ms }
    }

    pub fn now(&self) -> u64 {
        self.now_ms
    }

    pub fn now_secs(&self) -> f64 {
        self.now_ms as f64 / ONE_SEC_MS as f64
    }

    pub fn step_ms(&self) -> u64 {
        self.step_ms
    }

    /// Step size in seconds, the `dt` used by movement and charging physics.
    pub fn step_secs(&self) -> f64 {
        self.step_ms as f64 / ONE_SEC_MS as f64
    }

    pub fn advance(&mut self) {
        self.now_ms += self.step_ms;
    }

    /// Hour of the simulated day (0-23), used by surge pricing and demand.
    pub fn hour_of_day(&self) -> u8 {
        ((self.now_ms / ONE_HOUR_MS) % 24) as u8
    }
}
