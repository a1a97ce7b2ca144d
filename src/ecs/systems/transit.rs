//! Daily transit progression.

use bevy_ecs::query::With;
use bevy_ecs::system::{Query, Res, ResMut};
use rand::Rng;
use tracing::debug;

use crate::config::EngineConfig;
use crate::ecs::components::{LocationCore, Mobility, Person, PersonState};
use crate::ecs::graph::LocationGraph;
use crate::ecs::resources::TransitRng;

/// Advance every in-transit person by one day's travel.
///
/// Each traveller draws one speed for the day and accumulates it against the
/// link's effective distance as it stands today. Progress is never reset: a
/// link whose distance balloons from environmental coupling merely defers
/// completion until the distance drops back below the accumulated progress.
pub fn advance_transit(
    mut persons: Query<&mut PersonState, With<Person>>,
    mut locs: Query<&mut LocationCore>,
    mut graph: ResMut<LocationGraph>,
    config: Res<EngineConfig>,
    mut rng: ResMut<TransitRng>,
) {
    for mut person in persons.iter_mut() {
        let Mobility::InTransit { link, progress_km } = person.mobility else {
            continue;
        };

        let speed = if config.max_move_speed > config.min_move_speed {
            rng.0.random_range(config.min_move_speed..=config.max_move_speed)
        } else {
            config.min_move_speed
        };
        let progress = progress_km + speed;

        let (dest, distance) = {
            let record = graph.link(link);
            (record.to, record.effective_distance)
        };
        if progress < distance {
            person.mobility = Mobility::InTransit {
                link,
                progress_km: progress,
            };
            continue;
        }

        let Ok(mut dest_core) = locs.get_mut(dest) else {
            continue;
        };
        graph.link_mut(link).num_agents_on_rank -= 1;
        dest_core.num_agents_on_rank += 1;
        person.visited.push(dest);

        let terminal = dest_core.camp && dest_core.movechance <= 0.0 && !config.use_idp_mode;
        person.mobility = if terminal {
            if config.camp_log_level > 0 {
                debug!(camp = %dest_core.name, "agent settled at camp");
            }
            Mobility::Arrived(dest)
        } else {
            if config.agent_log_level > 0 {
                debug!(at = %dest_core.name, "agent arrived");
            }
            Mobility::AtLocation(dest)
        };
    }
}
