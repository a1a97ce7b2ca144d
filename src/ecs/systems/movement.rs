//! Movement decision algorithm.
//!
//! One Bernoulli departure roll per resident per day, then awareness-weighted
//! scoring of every open outgoing link. Decisions read only the globally
//! synchronized counter snapshot plus this rank's own same-step deltas, so
//! within a step they are independent of evaluation order across ranks.

use bevy_ecs::entity::Entity;
use bevy_ecs::query::With;
use bevy_ecs::system::{Query, Res, ResMut};
use rand::Rng;
use tracing::debug;

use crate::config::EngineConfig;
use crate::ecs::components::{LocationCore, Mobility, Person, PersonState};
use crate::ecs::graph::{LinkId, LocationGraph};
use crate::ecs::resources::{LocationRegistry, MovementRng};

/// Weight of a one-hop neighbour's attractiveness at awareness level 2.
const NEIGHBOUR_WEIGHT: f64 = 0.5;

/// One scored open outgoing link.
pub(crate) struct ScoredCandidate {
    pub link: LinkId,
    pub score: f64,
    /// How far past `capacity * CapacityBuffer` the destination would be
    /// after this arrival; <= 0 means within capacity.
    pub overflow: f64,
    pub forced: bool,
}

/// Deterministic route selection over scored candidates.
///
/// A forced-redirection link overrides scoring. Otherwise candidates within
/// capacity are preferred on score; when every candidate is over capacity the
/// least-over one is taken so agents are never deadlocked. All ties break on
/// insertion order (first candidate wins), never randomly.
pub(crate) fn pick_route(candidates: &[ScoredCandidate]) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }
    if let Some(i) = candidates.iter().position(|c| c.forced) {
        return Some(i);
    }

    let mut best: Option<usize> = None;
    for (i, c) in candidates.iter().enumerate() {
        if c.overflow > 0.0 {
            continue;
        }
        if best.is_none_or(|b| c.score > candidates[b].score) {
            best = Some(i);
        }
    }
    if best.is_some() {
        return best;
    }

    // Everyone is over capacity: least-over-capacity, not hard exclusion.
    let mut least: usize = 0;
    for (i, c) in candidates.iter().enumerate().skip(1) {
        if c.overflow < candidates[least].overflow {
            least = i;
        }
    }
    Some(least)
}

/// Probability that a resident attempts to leave today.
pub(crate) fn departure_probability(location: &LocationCore, config: &EngineConfig) -> f64 {
    let mut p = location.movechance;
    if location.conflict {
        p *= config.conflict_weight;
    }
    p.clamp(0.0, 1.0)
}

/// Base attractiveness of a destination, before distance weighting.
pub(crate) fn attractiveness(location: &LocationCore, config: &EngineConfig) -> f64 {
    if location.camp { config.camp_weight } else { 1.0 }
}

/// Destination crowding estimate: global snapshot plus this rank's own
/// same-step changes, plus everyone already underway toward the destination.
fn expected_occupancy(dest: Entity, dest_core: &LocationCore, graph: &LocationGraph) -> f64 {
    let mut occupancy = dest_core.num_agents + dest_core.local_delta();
    for out in graph.outgoing(dest) {
        let inbound = graph.link(graph.twin(*out));
        occupancy += inbound.num_agents + inbound.local_delta();
    }
    occupancy as f64
}

fn capacity_overflow(
    dest: Entity,
    dest_core: &LocationCore,
    graph: &LocationGraph,
    config: &EngineConfig,
) -> f64 {
    if dest_core.capacity < 0 {
        return 0.0;
    }
    let cap = dest_core.capacity as f64 * config.capacity_buffer;
    expected_occupancy(dest, dest_core, graph) + 1.0 - cap
}

/// Awareness-weighted score of one open link.
fn link_score(
    link: LinkId,
    person: &PersonState,
    origin: Entity,
    graph: &LocationGraph,
    locs: &Query<&mut LocationCore>,
    registry: &LocationRegistry,
    config: &EngineConfig,
) -> f64 {
    let record = graph.link(link);
    let distance = record.effective_distance.max(f64::EPSILON);
    let Ok(dest_core) = locs.get(record.to) else {
        return 0.0;
    };

    let weight = match person.awareness {
        i8::MIN..=0 => 1.0,
        1 => attractiveness(dest_core, config),
        2 => {
            // Aggregate one hop further, skipping the origin and anywhere the
            // person has already been.
            let mut weight = attractiveness(dest_core, config);
            for next in graph.outgoing(record.to) {
                let hop = graph.link(*next);
                if hop.closed || hop.to == origin || person.visited.contains(&hop.to) {
                    continue;
                }
                if let Ok(hop_core) = locs.get(hop.to)
                    && !hop_core.closed
                {
                    weight += NEIGHBOUR_WEIGHT * attractiveness(hop_core, config);
                }
            }
            weight
        }
        _ => {
            // Level 3+: aggregate over the destination's country grouping.
            let mut weight = 0.0;
            for entity in registry.ordered() {
                if let Ok(core) = locs.get(*entity)
                    && core.country == dest_core.country
                    && !core.closed
                {
                    weight += attractiveness(core, config);
                }
            }
            weight
        }
    };

    weight / distance
}

/// Evaluate one movement decision for every resident person.
pub fn decide_moves(
    mut persons: Query<&mut PersonState, With<Person>>,
    mut locs: Query<&mut LocationCore>,
    mut graph: ResMut<LocationGraph>,
    registry: Res<LocationRegistry>,
    config: Res<EngineConfig>,
    mut rng: ResMut<MovementRng>,
) {
    for mut person in persons.iter_mut() {
        let Mobility::AtLocation(origin) = person.mobility else {
            continue;
        };
        let probability = match locs.get(origin) {
            Ok(core) => departure_probability(core, &config),
            Err(_) => continue,
        };
        if probability <= 0.0 || rng.0.random_range(0.0..1.0) >= probability {
            continue;
        }

        let outgoing: Vec<LinkId> = graph.outgoing(origin).to_vec();
        let mut candidates = Vec::with_capacity(outgoing.len());
        for id in outgoing {
            let record = graph.link(id);
            if record.closed {
                continue;
            }
            let Ok(dest_core) = locs.get(record.to) else {
                continue;
            };
            if dest_core.closed {
                continue;
            }
            candidates.push(ScoredCandidate {
                link: id,
                score: link_score(id, &person, origin, &graph, &locs, &registry, &config),
                overflow: capacity_overflow(record.to, dest_core, &graph, &config),
                forced: record.forced_redirection,
            });
        }

        let chosen = if person.awareness < 0 && !candidates.iter().any(|c| c.forced) {
            // No weighting at all: uniform random pick among open links.
            if candidates.is_empty() {
                None
            } else {
                Some(rng.0.random_range(0..candidates.len()))
            }
        } else {
            pick_route(&candidates)
        };

        let Some(index) = chosen else {
            continue;
        };
        let link = candidates[index].link;

        person.mobility = Mobility::InTransit {
            link,
            progress_km: 0.0,
        };
        graph.link_mut(link).num_agents_on_rank += 1;
        if let Ok(mut origin_core) = locs.get_mut(origin) {
            origin_core.num_agents_on_rank -= 1;
            if config.agent_log_level > 0 {
                debug!(from = %origin_core.name, link = link.0, "agent departed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_location(name: &str) -> LocationCore {
        LocationCore {
            name: name.to_string(),
            x: 0.0,
            y: 0.0,
            movechance: 0.3,
            capacity: -1,
            pop: 0,
            conflict: false,
            camp: false,
            closed: false,
            foreign: false,
            country: "unknown".to_string(),
            num_agents: 0,
            num_agents_on_rank: 0,
            num_agents_synced: 0,
        }
    }

    fn candidate(score: f64, overflow: f64) -> ScoredCandidate {
        ScoredCandidate {
            link: LinkId(0),
            score,
            overflow,
            forced: false,
        }
    }

    #[test]
    fn pick_route_prefers_highest_score_within_capacity() {
        let candidates = vec![candidate(0.1, 0.0), candidate(0.9, 0.0), candidate(0.5, 0.0)];
        assert_eq!(pick_route(&candidates), Some(1));
    }

    #[test]
    fn pick_route_breaks_ties_by_insertion_order() {
        let candidates = vec![candidate(0.5, 0.0), candidate(0.5, 0.0)];
        assert_eq!(pick_route(&candidates), Some(0));
    }

    #[test]
    fn over_capacity_candidates_lose_to_any_open_one() {
        let candidates = vec![candidate(100.0, 3.0), candidate(0.01, 0.0)];
        assert_eq!(pick_route(&candidates), Some(1));
    }

    #[test]
    fn all_over_capacity_picks_least_over() {
        let candidates = vec![candidate(0.9, 5.0), candidate(0.1, 2.0), candidate(0.5, 2.0)];
        // least overflow wins; tie on overflow keeps the earlier candidate
        assert_eq!(pick_route(&candidates), Some(1));
    }

    #[test]
    fn forced_redirection_overrides_scoring() {
        let mut candidates = vec![candidate(0.9, 0.0), candidate(0.1, 10.0)];
        candidates[1].forced = true;
        assert_eq!(pick_route(&candidates), Some(1));
    }

    #[test]
    fn no_candidates_means_stay() {
        assert_eq!(pick_route(&[]), None);
    }

    #[test]
    fn conflict_zone_reduces_departure_probability() {
        let config = EngineConfig::default();
        let mut loc = plain_location("war");
        loc.movechance = 1.0;
        assert_eq!(departure_probability(&loc, &config), 1.0);
        loc.conflict = true;
        assert_eq!(departure_probability(&loc, &config), config.conflict_weight);
    }

    #[test]
    fn camps_are_more_attractive() {
        let config = EngineConfig::default();
        let mut loc = plain_location("camp");
        assert_eq!(attractiveness(&loc, &config), 1.0);
        loc.camp = true;
        assert_eq!(attractiveness(&loc, &config), config.camp_weight);
    }
}
