//! The public simulation facade.
//!
//! An [`Ecosystem`] wraps the ECS world behind the handful of operations a
//! driver needs: build a topology, seed agents, step the clock, read counts.
//! All mutation goes through the daily schedule; the facade itself only
//! spawns entities and flips flags.

use bevy_app::App;
use bevy_ecs::entity::Entity;
use bevy_ecs::query::With;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::ecs::app::build_sim_app;
use crate::ecs::clock::DayClock;
use crate::ecs::components::{Location, LocationCore, Mobility, Person, PersonState};
use crate::ecs::graph::{Coupling, LinkId, LocationGraph};
use crate::ecs::resources::{CounterSyncRes, LocationRegistry, WeatherRes};
use crate::ecs::schedule::SimTick;
use crate::error::{DataLookupError, SimError, TopologyError};
use crate::sync::CounterSync;
use crate::weather::{WeatherTables, spherical_midpoint};

/// Attributes of a location to be added, builder style.
#[derive(Debug, Clone)]
pub struct LocationSpec {
    pub name: String,
    /// Latitude in decimal degrees.
    pub x: f64,
    /// Longitude in decimal degrees.
    pub y: f64,
    pub movechance: f64,
    /// -1 means unbounded.
    pub capacity: i64,
    pub pop: u32,
    pub conflict: bool,
    pub camp: bool,
    pub foreign: bool,
    pub country: String,
}

impl LocationSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            x: 0.0,
            y: 0.0,
            movechance: 0.3,
            capacity: -1,
            pop: 0,
            conflict: false,
            camp: false,
            foreign: false,
            country: "unknown".to_string(),
        }
    }

    pub fn coords(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn movechance(mut self, movechance: f64) -> Self {
        self.movechance = movechance;
        self
    }

    pub fn capacity(mut self, capacity: i64) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn population(mut self, pop: u32) -> Self {
        self.pop = pop;
        self
    }

    /// Mark as an active conflict zone with certain daily departure.
    pub fn conflict(mut self) -> Self {
        self.conflict = true;
        self.movechance = 1.0;
        self
    }

    /// Mark as a camp, where arrival is terminal unless IDP mode is on.
    pub fn camp(mut self) -> Self {
        self.camp = true;
        self.movechance = 0.001;
        self
    }

    pub fn foreign(mut self) -> Self {
        self.foreign = true;
        self
    }

    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }
}

/// Environmental coupling requested for a new link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    /// Ordinary road, reweighted by same-day precipitation at its midpoint.
    Precipitation,
    /// River crossing, closed outright on high discharge.
    Crossing,
}

/// One simulation world: a location graph, its agents, and a day clock.
pub struct Ecosystem {
    app: App,
    /// Global count of agents ever added, on every rank. Drives round-robin
    /// ownership assignment, so all ranks must observe every `add_agent`.
    total_added: u64,
}

impl Default for Ecosystem {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Ecosystem {
    /// Single-rank ecosystem without environmental coupling.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_parts(config, None, None)
    }

    /// Ecosystem with weather tables, enabling coupled link types.
    pub fn with_weather(config: EngineConfig, weather: WeatherTables) -> Self {
        Self::with_parts(config, Some(weather), None)
    }

    /// Ecosystem participating in a multi-rank run through `sync`.
    pub fn with_sync(config: EngineConfig, sync: Box<dyn CounterSync>) -> Self {
        Self::with_parts(config, None, Some(sync))
    }

    pub fn with_parts(
        config: EngineConfig,
        weather: Option<WeatherTables>,
        sync: Option<Box<dyn CounterSync>>,
    ) -> Self {
        Self {
            app: build_sim_app(config, weather, sync),
            total_added: 0,
        }
    }

    /// Add a location to the graph. Names are unique.
    pub fn add_location(&mut self, spec: LocationSpec) -> Result<Entity, SimError> {
        let world = self.app.world_mut();
        if world.resource::<LocationRegistry>().contains(&spec.name) {
            return Err(TopologyError::DuplicateLocation { name: spec.name }.into());
        }

        if world.resource::<EngineConfig>().init_log_level > 0 {
            info!(
                name = %spec.name,
                movechance = spec.movechance,
                capacity = spec.capacity,
                conflict = spec.conflict,
                camp = spec.camp,
                "adding location"
            );
        }

        let name = spec.name.clone();
        let entity = world
            .spawn((
                Location,
                LocationCore {
                    name: spec.name,
                    x: spec.x,
                    y: spec.y,
                    movechance: spec.movechance,
                    capacity: spec.capacity,
                    pop: spec.pop,
                    conflict: spec.conflict,
                    camp: spec.camp,
                    closed: false,
                    foreign: spec.foreign,
                    country: spec.country,
                    num_agents: 0,
                    num_agents_on_rank: 0,
                    num_agents_synced: 0,
                },
            ))
            .id();
        world.resource_mut::<LocationRegistry>().insert(&name, entity);
        Ok(entity)
    }

    /// Connect two named locations with a reciprocal uncoupled link pair.
    /// `forced_redirection` applies in the `from` → `to` direction only.
    pub fn link_up(
        &mut self,
        from: &str,
        to: &str,
        distance_km: f64,
        forced_redirection: bool,
    ) -> Result<(LinkId, LinkId), SimError> {
        self.add_link_pair(from, to, distance_km, forced_redirection, Coupling::None)
    }

    /// Connect two named locations with an environmentally coupled link pair.
    /// Requires weather tables; the coupling is resolved at construction time
    /// so a missing series or grid fails the setup rather than the run.
    pub fn link_up_typed(
        &mut self,
        from: &str,
        to: &str,
        distance_km: f64,
        forced_redirection: bool,
        link_type: LinkType,
    ) -> Result<(LinkId, LinkId), SimError> {
        let (from_loc, to_loc) = {
            let world = self.app.world();
            (
                Self::resolve(world.resource::<LocationRegistry>(), from)?,
                Self::resolve(world.resource::<LocationRegistry>(), to)?,
            )
        };
        let (mid_lat, mid_lon) = {
            let world = self.app.world();
            let a = world
                .get::<LocationCore>(from_loc)
                .map(|c| (c.x, c.y))
                .unwrap_or_default();
            let b = world
                .get::<LocationCore>(to_loc)
                .map(|c| (c.x, c.y))
                .unwrap_or_default();
            spherical_midpoint(a.0, a.1, b.0, b.1)
        };

        let coupling = {
            let world = self.app.world();
            let tables = world
                .get_resource::<WeatherRes>()
                .ok_or(DataLookupError::NoWeatherSources)?;
            match link_type {
                LinkType::Precipitation => {
                    let series = tables.0.precipitation_key(from, to)?;
                    let (x1, x2) = tables.0.flood_thresholds(mid_lat, mid_lon)?;
                    Coupling::Precipitation { series, x1, x2 }
                }
                LinkType::Crossing => Coupling::RiverCrossing {
                    cell: tables.0.nearest_discharge_cell(mid_lat, mid_lon)?,
                },
            }
        };

        self.add_link_pair(from, to, distance_km, forced_redirection, coupling)
    }

    fn add_link_pair(
        &mut self,
        from: &str,
        to: &str,
        distance_km: f64,
        forced_redirection: bool,
        coupling: Coupling,
    ) -> Result<(LinkId, LinkId), SimError> {
        let world = self.app.world_mut();
        let registry = world.resource::<LocationRegistry>();
        let from_loc = Self::resolve(registry, from)?;
        let to_loc = Self::resolve(registry, to)?;

        if world.resource::<EngineConfig>().init_log_level > 0 {
            info!(%from, %to, distance_km, "adding link pair");
        }

        Ok(world.resource_mut::<LocationGraph>().add_pair(
            from_loc,
            to_loc,
            distance_km,
            forced_redirection,
            coupling,
        ))
    }

    fn resolve(registry: &LocationRegistry, name: &str) -> Result<Entity, TopologyError> {
        registry.get(name).ok_or_else(|| TopologyError::UnknownEndpoint {
            name: name.to_string(),
            known: registry.known_names(),
        })
    }

    /// Insert one agent at a named location.
    ///
    /// In multi-rank runs, agents are assigned to ranks round-robin; every
    /// rank must call `add_agent` identically so the assignment sequence
    /// matches, but only the owning rank actually spawns the entity.
    pub fn add_agent(&mut self, location: &str) -> Result<(), SimError> {
        let entity = {
            let registry = self.app.world().resource::<LocationRegistry>();
            Self::resolve(registry, location)?
        };

        let num_ranks = self
            .app
            .world()
            .resource::<CounterSyncRes>()
            .0
            .num_ranks() as u64;
        let rank = self.app.world().resource::<CounterSyncRes>().0.rank() as u64;
        let owner = self.total_added % num_ranks;
        self.total_added += 1;

        let world = self.app.world_mut();
        let (awareness, take_from_pop, log_agents) = {
            let config = world.resource::<EngineConfig>();
            (
                config.awareness_level,
                config.take_refugees_from_population,
                config.agent_log_level > 0,
            )
        };

        // Population draw-down is shared graph state: applied on every rank.
        if let Some(mut core) = world.get_mut::<LocationCore>(entity) {
            if take_from_pop && core.pop > 0 {
                core.pop -= 1;
            }
            if owner == rank {
                core.num_agents_on_rank += 1;
                if log_agents {
                    debug!(at = %core.name, "agent spawned");
                }
            }
        }
        if owner == rank {
            world.spawn((Person, PersonState::at(entity, awareness)));
        }
        Ok(())
    }

    /// Insert `count` agents at a named location.
    pub fn add_agents(&mut self, location: &str, count: u32) -> Result<(), SimError> {
        for _ in 0..count {
            self.add_agent(location)?;
        }
        Ok(())
    }

    /// Advance the simulation by one day.
    pub fn evolve(&mut self) {
        self.app.world_mut().run_schedule(SimTick);
    }

    /// Close a location to new arrivals; inbound links stop admitting new
    /// departures but agents already underway still complete. Returns false
    /// when the location is unknown or already closed.
    pub fn close_location(&mut self, name: &str) -> bool {
        let world = self.app.world_mut();
        let Some(entity) = world.resource::<LocationRegistry>().get(name) else {
            return false;
        };
        let was_open = match world.get_mut::<LocationCore>(entity) {
            Some(mut core) => {
                let was_open = !core.closed;
                core.closed = true;
                was_open
            }
            None => false,
        };
        if was_open {
            world.resource_mut::<LocationGraph>().close_inbound(entity);
        }
        was_open
    }

    /// Global count of active agents across all ranks (settled arrivals
    /// excluded). Collective: like `evolve`, every rank must call it the same
    /// number of times, since the count is obtained through the reduction.
    pub fn num_agents(&mut self) -> usize {
        let local = self.num_agents_on_rank() as i64;
        let global = self
            .app
            .world()
            .resource::<CounterSyncRes>()
            .0
            .reduce_sum(&[local]);
        global[0] as usize
    }

    /// Rank-local count of active agents (settled arrivals excluded).
    pub fn num_agents_on_rank(&mut self) -> usize {
        let world = self.app.world_mut();
        let mut query = world.query_filtered::<&PersonState, With<Person>>();
        query
            .iter(world)
            .filter(|p| !matches!(p.mobility, Mobility::Arrived(_)))
            .count()
    }

    /// Rank-local count of agents settled at terminal camps.
    pub fn num_arrived(&mut self) -> usize {
        let world = self.app.world_mut();
        let mut query = world.query_filtered::<&PersonState, With<Person>>();
        query
            .iter(world)
            .filter(|p| matches!(p.mobility, Mobility::Arrived(_)))
            .count()
    }

    /// Rank-local agent count at a named location, including settled arrivals.
    pub fn location_agents(&self, name: &str) -> Option<i64> {
        let world = self.app.world();
        let entity = world.resource::<LocationRegistry>().get(name)?;
        world
            .get::<LocationCore>(entity)
            .map(|core| core.num_agents_on_rank)
    }

    /// Globally synchronized agent count at a named location, as of the last
    /// reduction at the top of the most recent `evolve`.
    pub fn location_agents_global(&self, name: &str) -> Option<i64> {
        let world = self.app.world();
        let entity = world.resource::<LocationRegistry>().get(name)?;
        world.get::<LocationCore>(entity).map(|core| core.num_agents)
    }

    /// Rank-local count of agents currently on links.
    pub fn num_in_transit(&self) -> i64 {
        self.app
            .world()
            .resource::<LocationGraph>()
            .in_transit_on_rank()
    }

    /// Today's effective distance of the link from `from` to `to`, if any.
    pub fn link_effective_distance(&self, from: &str, to: &str) -> Option<f64> {
        let world = self.app.world();
        let registry = world.resource::<LocationRegistry>();
        let (from_loc, to_loc) = (registry.get(from)?, registry.get(to)?);
        let graph = world.resource::<LocationGraph>();
        graph
            .outgoing(from_loc)
            .iter()
            .map(|id| graph.link(*id))
            .find(|record| record.to == to_loc)
            .map(|record| record.effective_distance)
    }

    /// Current simulated day (number of completed `evolve` calls).
    pub fn day(&self) -> u32 {
        self.app.world().resource::<DayClock>().day
    }

    pub fn rank(&self) -> usize {
        self.app.world().resource::<CounterSyncRes>().0.rank()
    }

    pub fn num_ranks(&self) -> usize {
        self.app.world().resource::<CounterSyncRes>().0.num_ranks()
    }

    /// Total agents ever added across all ranks.
    pub fn total_added(&self) -> u64 {
        self.total_added
    }
}
