//! Per-step counter reduction.

use bevy_ecs::world::World;

use crate::ecs::components::LocationCore;
use crate::ecs::graph::LocationGraph;
use crate::ecs::resources::{CounterSyncRes, LocationRegistry};

/// Exclusive system running the summing reduction over all counters.
///
/// The flat vector layout is locations in registration order followed by
/// links in id order; every rank builds the identical topology, so the
/// vectors line up. Runs in `SimPhase::PreUpdate`, before any decision
/// system, so today's decisions score against yesterday's global state.
pub fn sync_counters(world: &mut World) {
    let registry = world.resource::<LocationRegistry>().clone();

    let mut local = Vec::with_capacity(registry.len() + world.resource::<LocationGraph>().num_links());
    for entity in registry.ordered() {
        let core = world.entity(*entity).get::<LocationCore>();
        local.push(core.map_or(0, |c| c.num_agents_on_rank));
    }
    for (_, link) in world.resource::<LocationGraph>().links() {
        local.push(link.num_agents_on_rank);
    }

    let global = world.resource::<CounterSyncRes>().0.reduce_sum(&local);
    debug_assert_eq!(global.len(), local.len());

    let mut offset = 0;
    for entity in registry.ordered() {
        if let Some(mut core) = world.entity_mut(*entity).get_mut::<LocationCore>() {
            core.num_agents = global[offset];
            core.num_agents_synced = core.num_agents_on_rank;
        }
        offset += 1;
    }
    let mut graph = world.resource_mut::<LocationGraph>();
    for link in graph.links_mut() {
        link.num_agents = global[offset];
        link.num_agents_synced = link.num_agents_on_rank;
        offset += 1;
    }
}
