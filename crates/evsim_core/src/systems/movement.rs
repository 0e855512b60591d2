//! Movement phase: advances every routed vehicle along its polyline.
//!
//! A vehicle moves up to `speed * dt` per step, consuming waypoints as it
//! comes within the arrival tolerance of each. Battery drains with distance.
//! When the final waypoint is consumed the plan is replaced by an [`Arrived`]
//! marker for the arrivals phase.

use bevy_ecs::prelude::{Commands, Entity, Query, Res};

use crate::clock::SimClock;
use crate::fleet::{Arrived, Position, RoutePlan, Vehicle, VehicleStatus, ARRIVAL_TOLERANCE_M};
use crate::scenario::VehicleParams;

pub fn movement_system(
    mut commands: Commands,
    clock: Res<SimClock>,
    params: Res<VehicleParams>,
    mut query: Query<(Entity, &mut Vehicle, &mut Position, Option<&mut RoutePlan>)>,
) {
    let dt = clock.step_secs();

    for (entity, mut vehicle, mut position, plan) in query.iter_mut() {
        let Some(mut plan) = plan else {
            if vehicle.status == VehicleStatus::Idle {
                vehicle.stats.idle_secs += dt;
            }
            continue;
        };

        let mut budget_m = params.speed_mps * dt;
        let mut travelled_m = 0.0;

        while budget_m > 0.0 {
            let Some(target) = plan.current_waypoint() else {
                break;
            };
            let remaining = position.0.distance(&target);
            if remaining <= ARRIVAL_TOLERANCE_M {
                plan.cursor += 1;
                continue;
            }
            let step = budget_m.min(remaining);
            position.0.x += (target.x - position.0.x) / remaining * step;
            position.0.y += (target.y - position.0.y) / remaining * step;
            travelled_m += step;
            budget_m -= step;
            if remaining - step <= ARRIVAL_TOLERANCE_M {
                plan.cursor += 1;
            }
        }

        if travelled_m > 0.0 {
            vehicle.stats.distance_m += travelled_m;
            vehicle.consume_battery(travelled_m, params.consumption_pct_per_km);
        }

        if plan.is_finished() {
            position.0 = plan.final_waypoint();
            vehicle.current_node = plan.destination;
            commands.entity(entity).remove::<RoutePlan>().insert(Arrived);
        }
    }
}
