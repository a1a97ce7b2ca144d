use std::collections::BTreeMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use bevy_ecs::entity::Entity;
use bevy_ecs::resource::Resource;
use bevy_ecs::world::World;
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::sync::CounterSync;
use crate::weather::WeatherTables;

/// Deterministic master RNG seed for the simulation.
#[derive(Resource)]
pub struct SimRng {
    pub rng: SmallRng,
    pub seed: u64,
}

impl SimRng {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            seed,
        }
    }
}

macro_rules! domain_rng {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Resource)]
        pub struct $name(pub SmallRng);

        impl Default for $name {
            fn default() -> Self {
                Self(SmallRng::seed_from_u64(0))
            }
        }
    };
}

domain_rng!(MovementRng, "Per-domain RNG for movement decisions.");
domain_rng!(TransitRng, "Per-domain RNG for transit speed draws.");

/// Derive a deterministic per-domain seed from the global seed, domain name,
/// current day, and rank. Including the rank keeps partitioned runs from
/// replaying identical draw sequences on every rank.
fn derive_domain_seed(seed: u64, domain: &str, day: u32, rank: usize) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    domain.hash(&mut hasher);
    day.hash(&mut hasher);
    rank.hash(&mut hasher);
    hasher.finish()
}

/// Exclusive system that re-seeds the per-domain RNGs each day.
/// Runs in `SimPhase::PreUpdate` before any decision system.
pub fn distribute_rng(world: &mut World) {
    let seed = world.resource::<SimRng>().seed;
    let day = world.resource::<crate::ecs::clock::DayClock>().day;
    let rank = world.resource::<CounterSyncRes>().0.rank();

    world.resource_mut::<MovementRng>().0 =
        SmallRng::seed_from_u64(derive_domain_seed(seed, "movement", day, rank));
    world.resource_mut::<TransitRng>().0 =
        SmallRng::seed_from_u64(derive_domain_seed(seed, "transit", day, rank));
}

/// Name lookup and stable insertion order for location entities.
///
/// The insertion order fixes the layout of the flat counter vector exchanged
/// in the reduction step, so all ranks must register locations in the same
/// order (they build identical topologies).
#[derive(Resource, Debug, Clone, Default)]
pub struct LocationRegistry {
    by_name: BTreeMap<String, Entity>,
    order: Vec<Entity>,
}

impl LocationRegistry {
    /// Register a location. Returns false when the name is already taken.
    pub fn insert(&mut self, name: &str, entity: Entity) -> bool {
        if self.by_name.contains_key(name) {
            return false;
        }
        self.by_name.insert(name.to_string(), entity);
        self.order.push(entity);
        true
    }

    pub fn get(&self, name: &str) -> Option<Entity> {
        self.by_name.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Location entities in registration order.
    pub fn ordered(&self) -> &[Entity] {
        &self.order
    }

    /// All known names, for topology-error diagnostics.
    pub fn known_names(&self) -> Vec<String> {
        self.by_name.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// The injected synchronization capability (no-op in single-rank mode).
#[derive(Resource)]
pub struct CounterSyncRes(pub Box<dyn CounterSync>);

/// Weather tables, present only when environmental coupling is enabled.
#[derive(Resource, Debug, Clone)]
pub struct WeatherRes(pub WeatherTables);
