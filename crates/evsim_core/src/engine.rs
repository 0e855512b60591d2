//! Simulation engine: owns the world, runs the fixed-order phase schedule
//! one step at a time, and applies external control at step boundaries.
//!
//! The engine is a single logical thread of control. A step runs all phases
//! to completion before the clock advances; observers read copy-on-read
//! snapshots between steps and never see half-updated state. Control
//! commands arrive on an mpsc channel and are drained only at boundaries, so
//! a stop takes effect within at most one in-flight step.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;
use std::time::Duration;

use bevy_ecs::prelude::{Schedule, World};
use bevy_ecs::schedule::{apply_deferred, IntoSystemConfigs};

use crate::clock::{SimClock, ONE_SEC_MS};
use crate::network::RoadNetwork;
use crate::scenario::{build_world, ConfigError, SimulationConfig};
use crate::systems::{
    arrivals::arrivals_system,
    charging::{charging_advance_system, charging_decision_system},
    expiry::order_expiry_system,
    matching::matching_system,
    movement::movement_system,
    order_generation::order_generation_system,
    telemetry_snapshot::{capture_snapshot_system, snapshot_due},
};
use crate::telemetry::{aggregate_stats, capture_snapshot, SimSnapshot, SimStats};

/// How long a paused `run_for` sleeps before re-checking the control queue.
const PAUSE_POLL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineCommand {
    Pause,
    Resume,
    Stop,
    SetSpeed(f64),
}

/// Clonable handle a dashboard or CLI uses to steer the engine. Commands are
/// applied at the next step boundary, never mid-step.
#[derive(Clone)]
pub struct ControlHandle {
    tx: Sender<EngineCommand>,
}

impl ControlHandle {
    pub fn send(&self, command: EngineCommand) {
        // A dropped engine makes the command moot.
        let _ = self.tx.send(command);
    }

    pub fn pause(&self) {
        self.send(EngineCommand::Pause);
    }

    pub fn resume(&self) {
        self.send(EngineCommand::Resume);
    }

    pub fn stop(&self) {
        self.send(EngineCommand::Stop);
    }

    pub fn set_speed(&self, multiplier: f64) {
        self.send(EngineCommand::SetSpeed(multiplier));
    }
}

pub struct SimulationEngine {
    world: World,
    schedule: Schedule,
    /// Configured total run length, consumed by [`Self::run_to_completion`].
    duration_ms: u64,
    command_tx: Sender<EngineCommand>,
    command_rx: Receiver<EngineCommand>,
    paused: bool,
    stopped: bool,
    speed_multiplier: f64,
}

impl SimulationEngine {
    /// Validates the configuration and builds the initial world. Invalid
    /// parameters fail here; the simulation never starts.
    pub fn new(config: SimulationConfig, network: RoadNetwork) -> Result<Self, ConfigError> {
        let duration_ms = config.duration_secs * ONE_SEC_MS;
        let world = build_world(&config, network)?;
        let (command_tx, command_rx) = channel();
        Ok(Self {
            world,
            schedule: step_schedule(),
            duration_ms,
            command_tx,
            command_rx,
            paused: false,
            stopped: false,
            speed_multiplier: 1.0,
        })
    }

    pub fn control_handle(&self) -> ControlHandle {
        ControlHandle {
            tx: self.command_tx.clone(),
        }
    }

    fn apply_commands(&mut self) {
        while let Ok(command) = self.command_rx.try_recv() {
            match command {
                EngineCommand::Pause => self.paused = true,
                EngineCommand::Resume => self.paused = false,
                EngineCommand::Stop => self.stopped = true,
                EngineCommand::SetSpeed(multiplier) => {
                    if multiplier > 0.0 {
                        self.speed_multiplier = multiplier;
                    }
                }
            }
        }
    }

    /// Advances the simulation by exactly one step. Returns false when the
    /// engine is paused or stopped and no step ran.
    pub fn run_step(&mut self) -> bool {
        self.apply_commands();
        if self.stopped || self.paused {
            return false;
        }
        self.schedule.run(&mut self.world);
        self.world.resource_mut::<SimClock>().advance();
        true
    }

    /// Runs steps until `duration_ms` of simulated time has elapsed or a
    /// stop command lands. While paused the engine parks and keeps polling
    /// the control queue. Returns the number of steps executed.
    pub fn run_for(&mut self, duration_ms: u64) -> u64 {
        let end = self.world.resource::<SimClock>().now() + duration_ms;
        let mut steps = 0;
        while self.world.resource::<SimClock>().now() < end {
            self.apply_commands();
            if self.stopped {
                break;
            }
            if self.paused {
                thread::park_timeout(PAUSE_POLL);
                continue;
            }
            self.schedule.run(&mut self.world);
            self.world.resource_mut::<SimClock>().advance();
            steps += 1;
        }
        steps
    }

    /// Runs whatever remains of the configured `duration_secs`. Returns the
    /// number of steps executed; zero once the run length is exhausted.
    pub fn run_to_completion(&mut self) -> u64 {
        let remaining_ms = self.duration_ms.saturating_sub(self.now());
        self.run_for(remaining_ms)
    }

    pub fn now(&self) -> u64 {
        self.world.resource::<SimClock>().now()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Host pacing hint set via [`EngineCommand::SetSpeed`]; the engine
    /// itself never sleeps between unpaused steps.
    pub fn speed_multiplier(&self) -> f64 {
        self.speed_multiplier
    }

    /// Point-in-time copy of all engine state. Safe between steps.
    pub fn snapshot(&mut self) -> SimSnapshot {
        capture_snapshot(&mut self.world)
    }

    /// Aggregate run statistics.
    pub fn stats(&mut self) -> SimStats {
        aggregate_stats(&mut self.world)
    }

    /// Direct world access for tests and embedding hosts. Mutating entities
    /// mid-step from outside the schedule is undefined; use between steps.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn world(&self) -> &World {
        &self.world
    }
}

/// Builds the per-step schedule: the step phases chained in their fixed
/// order, with command flushes wherever a phase inserts or removes
/// components the next phase reads.
pub fn step_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems(
        (
            order_generation_system,
            matching_system,
            // Route plans from matching must exist before movement runs.
            apply_deferred,
            movement_system,
            // Arrived markers must exist before arrival handling runs.
            apply_deferred,
            arrivals_system,
            apply_deferred,
            charging_advance_system,
            charging_decision_system,
            apply_deferred,
            order_expiry_system,
            capture_snapshot_system.run_if(snapshot_due),
        )
            .chain(),
    );
    schedule
}
