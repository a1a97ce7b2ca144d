//! Discrete-time agent-based simulation of forced displacement over a
//! location graph, with optional environmental link coupling and
//! multi-rank agent partitioning.

pub mod config;
pub mod ecosystem;
pub mod ecs;
pub mod error;
pub mod input;
pub mod sync;
pub mod weather;

pub use config::EngineConfig;
pub use ecosystem::{Ecosystem, LinkType, LocationSpec};
pub use error::{ConfigError, DataLookupError, SimError, TopologyError};
pub use input::{ArrivalData, TableArrivalData};
pub use sync::{CounterSync, NoopSync, ThreadBarrierSync};
pub use weather::WeatherTables;
