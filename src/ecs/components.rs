use bevy_ecs::component::Component;
use bevy_ecs::entity::Entity;

use crate::ecs::graph::LinkId;

/// Marker for location entities.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Location;

/// A graph node holding resident agents and its static/mutable attributes.
///
/// Counter discipline: `num_agents` is the globally synchronized snapshot
/// every movement decision scores against; `num_agents_on_rank` is the
/// rank-local running value mutated by this rank's own transitions;
/// `num_agents_synced` records the local value at the last reduction so the
/// current step's local delta can be recovered.
#[derive(Component, Debug, Clone)]
pub struct LocationCore {
    pub name: String,
    /// Latitude in decimal degrees.
    pub x: f64,
    /// Longitude in decimal degrees.
    pub y: f64,
    /// Daily probability that a resident attempts to leave, in [0, 1].
    pub movechance: f64,
    /// Maximum intended residents; -1 is unbounded.
    pub capacity: i64,
    /// Background population, drawn down by `add_agent` when
    /// `TakeRefugeesFromPopulation` is set.
    pub pop: u32,
    pub conflict: bool,
    pub camp: bool,
    /// Closed to new arrivals; agents already in transit still complete.
    pub closed: bool,
    pub foreign: bool,
    pub country: String,
    /// Global resident count snapshot (valid as of the last reduction).
    pub num_agents: i64,
    /// Rank-local resident count, exact at all times for this rank's agents.
    pub num_agents_on_rank: i64,
    /// Rank-local count at the last reduction.
    pub num_agents_synced: i64,
}

impl LocationCore {
    /// Rank-local change since the last reduction. Added to the global
    /// snapshot when estimating destination crowding mid-step.
    pub fn local_delta(&self) -> i64 {
        self.num_agents_on_rank - self.num_agents_synced
    }
}

/// Marker for person entities.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Person;

/// Where a person currently is.
#[derive(Debug, Clone, PartialEq)]
pub enum Mobility {
    /// Resident at a location, evaluating one movement decision per day.
    AtLocation(Entity),
    /// On a link, with accumulated progress in km. Progress never resets;
    /// completion is simply deferred while the link's effective distance
    /// exceeds it.
    InTransit { link: LinkId, progress_km: f64 },
    /// Settled at a terminal camp; no further movement is evaluated.
    Arrived(Entity),
}

/// One simulated displaced individual.
#[derive(Component, Debug, Clone)]
pub struct PersonState {
    pub mobility: Mobility,
    /// Locations visited so far, in arrival order. Awareness levels >= 2 use
    /// this to stop counting places the person has already been through.
    pub visited: Vec<Entity>,
    /// Evaluation horizon, inherited from the engine configuration at spawn.
    pub awareness: i8,
}

impl PersonState {
    pub fn at(location: Entity, awareness: i8) -> Self {
        Self {
            mobility: Mobility::AtLocation(location),
            visited: vec![location],
            awareness,
        }
    }

    /// The location this person's state currently references, if any.
    pub fn location(&self) -> Option<Entity> {
        match self.mobility {
            Mobility::AtLocation(loc) | Mobility::Arrived(loc) => Some(loc),
            Mobility::InTransit { .. } => None,
        }
    }
}
