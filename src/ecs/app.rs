use bevy_app::App;
use bevy_ecs::schedule::{ExecutorKind, IntoScheduleConfigs};

use crate::config::EngineConfig;
use crate::sync::{CounterSync, NoopSync};
use crate::weather::WeatherTables;

use super::clock::DayClock;
use super::graph::LocationGraph;
use super::resources::{
    CounterSyncRes, LocationRegistry, MovementRng, SimRng, TransitRng, WeatherRes, distribute_rng,
};
use super::schedule::{SimPhase, StepSet, configure_sim_schedule};
use super::systems::{advance_transit, decide_moves, recompute_link_distances, sync_counters};

/// Build a headless Bevy app carrying one simulation world.
///
/// Manual tick control, one schedule run per simulated day:
/// ```no_run
/// # use exodus_sim::config::EngineConfig;
/// # use exodus_sim::ecs::app::build_sim_app;
/// # use exodus_sim::ecs::schedule::SimTick;
/// let mut app = build_sim_app(EngineConfig::default(), None, None);
/// for _ in 0..100 {
///     app.world_mut().run_schedule(SimTick);
/// }
/// ```
pub fn build_sim_app(
    config: EngineConfig,
    weather: Option<WeatherTables>,
    sync: Option<Box<dyn CounterSync>>,
) -> App {
    // Single-threaded by default: movement and transit consume the domain
    // RNGs in query iteration order, which must not vary across runs.
    build_sim_app_with_executor(config, weather, sync, ExecutorKind::SingleThreaded)
}

/// Build a headless Bevy app with a specific executor kind.
pub fn build_sim_app_with_executor(
    config: EngineConfig,
    weather: Option<WeatherTables>,
    sync: Option<Box<dyn CounterSync>>,
    executor: ExecutorKind,
) -> App {
    let mut app = App::empty();

    let seed = config.seed;
    app.insert_resource(config);
    app.insert_resource(DayClock::new());
    app.insert_resource(LocationGraph::default());
    app.insert_resource(LocationRegistry::default());
    app.insert_resource(SimRng::seeded(seed));
    app.insert_resource(CounterSyncRes(
        sync.unwrap_or_else(|| Box::new(NoopSync)),
    ));
    if let Some(tables) = weather {
        app.insert_resource(WeatherRes(tables));
    }

    // Per-domain RNGs, reseeded each day by distribute_rng
    app.init_resource::<MovementRng>();
    app.init_resource::<TransitRng>();

    let mut schedule = configure_sim_schedule(executor);
    schedule.add_systems((distribute_rng, sync_counters).chain().in_set(SimPhase::PreUpdate));
    schedule.add_systems(recompute_link_distances.in_set(StepSet::Weather));
    schedule.add_systems(decide_moves.in_set(StepSet::Movement));
    schedule.add_systems(advance_transit.in_set(StepSet::Transit));
    app.add_schedule(schedule);
    app
}
