pub mod movement;
pub mod sync;
pub mod transit;
pub mod weather;

pub use movement::decide_moves;
pub use sync::sync_counters;
pub use transit::advance_transit;
pub use weather::recompute_link_distances;
