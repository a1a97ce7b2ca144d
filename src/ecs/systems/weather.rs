//! Per-day recomputation of link effective distances.

use bevy_ecs::system::{Res, ResMut};
use tracing::debug;

use crate::ecs::clock::DayClock;
use crate::ecs::graph::{Coupling, LinkId, LocationGraph};
use crate::ecs::resources::WeatherRes;
use crate::weather::{CLOSURE_MULTIPLIER, discharge_multiplier, precipitation_multiplier};

/// Recompute every coupled link's effective distance for the current day.
///
/// Couplings live on the forward member of each reciprocal pair; the computed
/// distance is written to both directions so the pair never disagrees.
/// Coupled links cannot exist without weather tables (construction rejects
/// them), so a missing resource leaves every distance at its base value.
pub fn recompute_link_distances(
    mut graph: ResMut<LocationGraph>,
    weather: Option<Res<WeatherRes>>,
    clock: Res<DayClock>,
) {
    let day = clock.day;
    for i in (0..graph.num_links()).step_by(2) {
        let forward = LinkId(i);
        let (base, multiplier) = {
            let record = graph.link(forward);
            let multiplier = match (&record.coupling, &weather) {
                (Coupling::None, _) | (_, None) => 1.0,
                (Coupling::Precipitation { series, x1, x2 }, Some(tables)) => {
                    precipitation_multiplier(tables.0.precipitation_on(series, day), *x1, *x2)
                }
                (Coupling::RiverCrossing { cell }, Some(tables)) => {
                    discharge_multiplier(tables.0.discharge_on(*cell, day))
                }
            };
            (record.base_distance, multiplier)
        };

        let effective = base * multiplier;
        if multiplier >= CLOSURE_MULTIPLIER && graph.link(forward).effective_distance < effective {
            debug!(day, link = forward.0, "link flooded for the step window");
        }
        let twin = graph.twin(forward);
        graph.link_mut(forward).effective_distance = effective;
        graph.link_mut(twin).effective_distance = effective;
    }
}
