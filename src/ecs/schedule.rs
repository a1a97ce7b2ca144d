use bevy_ecs::schedule::{ExecutorKind, IntoScheduleConfigs, Schedule, ScheduleLabel, SystemSet};

use super::clock::advance_day;

/// Schedule label for one simulated day.
/// Run manually each day via `app.world_mut().run_schedule(SimTick)`.
#[derive(ScheduleLabel, Debug, Clone, PartialEq, Eq, Hash)]
pub struct SimTick;

/// Ordered phases within each simulated day.
///
/// Phases run in declaration order: PreUpdate < Update < Last. PreUpdate
/// reseeds the per-domain RNGs and runs the counter reduction barrier, so
/// every decision in Update scores against a globally consistent snapshot.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum SimPhase {
    PreUpdate,
    Update,
    Last,
}

/// Ordered stages inside `SimPhase::Update`.
///
/// ```text
/// Weather → Movement → Transit
/// ```
///
/// Effective distances are recomputed before any decision; departures land on
/// their link before transit progress is advanced, so a departing agent moves
/// on the day it leaves.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum StepSet {
    Weather,
    Movement,
    Transit,
}

/// Build a configured `SimTick` schedule with phase and stage ordering.
pub fn configure_sim_schedule(executor: ExecutorKind) -> Schedule {
    let mut schedule = Schedule::new(SimTick);
    schedule.set_executor_kind(executor);
    schedule.configure_sets((SimPhase::PreUpdate, SimPhase::Update, SimPhase::Last).chain());
    schedule.configure_sets(
        (StepSet::Weather, StepSet::Movement, StepSet::Transit)
            .chain()
            .in_set(SimPhase::Update),
    );
    schedule.add_systems(advance_day.in_set(SimPhase::Last));
    schedule
}
