pub mod app;
pub mod clock;
pub mod components;
pub mod graph;
pub mod resources;
pub mod schedule;
pub mod systems;
