//! Link storage for the location graph.
//!
//! Links are created in reciprocal pairs and live in a single resource;
//! per-origin lists preserve insertion order, which the movement decision
//! relies on for deterministic tie-breaking. BTreeMap keeps iteration
//! deterministic.

use std::collections::BTreeMap;

use bevy_ecs::entity::Entity;
use bevy_ecs::resource::Resource;

/// Index of a directional link in the graph's link table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkId(pub usize);

/// Environmental coupling for a physical connection, stored once per pair on
/// the forward (even-indexed) link. Recomputation dispatches on the variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Coupling {
    None,
    /// Ordinary precipitation-coupled link: same-day tp at the link midpoint
    /// against the X1/X2 percentile thresholds.
    Precipitation { series: String, x1: f64, x2: f64 },
    /// River crossing gated by same-day discharge at the nearest grid cell.
    RiverCrossing { cell: usize },
}

/// One directional link. Both members of a reciprocal pair always report the
/// same base distance and the same coupling-derived effective distance.
#[derive(Debug, Clone)]
pub struct LinkRecord {
    pub from: Entity,
    pub to: Entity,
    /// Static distance in km.
    pub base_distance: f64,
    /// Today's traversal cost after environmental adjustment.
    pub effective_distance: f64,
    /// When set, agents departing `from` take this link unconditionally.
    pub forced_redirection: bool,
    pub closed: bool,
    pub coupling: Coupling,
    /// Global in-transit count snapshot (valid as of the last reduction).
    pub num_agents: i64,
    /// Rank-local in-transit count.
    pub num_agents_on_rank: i64,
    /// Rank-local count at the last reduction.
    pub num_agents_synced: i64,
}

impl LinkRecord {
    pub fn local_delta(&self) -> i64 {
        self.num_agents_on_rank - self.num_agents_synced
    }
}

/// All links of the ecosystem, plus per-origin insertion-ordered egress lists.
#[derive(Resource, Debug, Default)]
pub struct LocationGraph {
    links: Vec<LinkRecord>,
    outgoing: BTreeMap<Entity, Vec<LinkId>>,
}

impl LocationGraph {
    /// Add a reciprocal pair of links. The coupling is carried by the forward
    /// member; `forced_redirection` applies to the forward direction only.
    pub fn add_pair(
        &mut self,
        from: Entity,
        to: Entity,
        distance: f64,
        forced_redirection: bool,
        coupling: Coupling,
    ) -> (LinkId, LinkId) {
        let forward = LinkId(self.links.len());
        self.links.push(LinkRecord {
            from,
            to,
            base_distance: distance,
            effective_distance: distance,
            forced_redirection,
            closed: false,
            coupling,
            num_agents: 0,
            num_agents_on_rank: 0,
            num_agents_synced: 0,
        });
        let reverse = LinkId(self.links.len());
        self.links.push(LinkRecord {
            from: to,
            to: from,
            base_distance: distance,
            effective_distance: distance,
            forced_redirection: false,
            closed: false,
            coupling: Coupling::None,
            num_agents: 0,
            num_agents_on_rank: 0,
            num_agents_synced: 0,
        });

        self.outgoing.entry(from).or_default().push(forward);
        self.outgoing.entry(to).or_default().push(reverse);
        (forward, reverse)
    }

    /// The other direction of the same physical connection. Pairs are pushed
    /// consecutively, so the twin is the index with the low bit flipped.
    pub fn twin(&self, id: LinkId) -> LinkId {
        LinkId(id.0 ^ 1)
    }

    pub fn link(&self, id: LinkId) -> &LinkRecord {
        &self.links[id.0]
    }

    pub fn link_mut(&mut self, id: LinkId) -> &mut LinkRecord {
        &mut self.links[id.0]
    }

    /// Outgoing links of a location in insertion order.
    pub fn outgoing(&self, from: Entity) -> &[LinkId] {
        self.outgoing.get(&from).map_or(&[], |v| v.as_slice())
    }

    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    pub fn links(&self) -> impl Iterator<Item = (LinkId, &LinkRecord)> {
        self.links.iter().enumerate().map(|(i, l)| (LinkId(i), l))
    }

    pub fn links_mut(&mut self) -> impl Iterator<Item = &mut LinkRecord> {
        self.links.iter_mut()
    }

    /// Close every link that leads into `location`. Used when a location is
    /// closed to new arrivals; agents already on those links still finish.
    pub fn close_inbound(&mut self, location: Entity) {
        for link in &mut self.links {
            if link.to == location {
                link.closed = true;
            }
        }
    }

    /// Total agents currently in transit, rank-local view.
    pub fn in_transit_on_rank(&self) -> i64 {
        self.links.iter().map(|l| l.num_agents_on_rank).sum()
    }
}
