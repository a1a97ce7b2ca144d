//! Ingestion collaborator contract.
//!
//! Historical arrival counts and ground-truth series are produced outside the
//! engine; drivers hand the engine an implementation of [`ArrivalData`] and
//! feed `get_new_refugees` into `Ecosystem::add_agents` each day.

use std::collections::BTreeMap;

/// Daily arrival counts and cumulative ground-truth series for a run.
pub trait ArrivalData {
    /// Exogenous number of new arrivals at the default entry location on `day`.
    fn get_new_refugees(&self, day: u32) -> u32;

    /// Cumulative ground-truth count for a named location on `day`.
    /// Consumed only by validation layers, never by the engine itself.
    fn get_field(&self, name: &str, day: u32) -> i64;
}

/// In-memory [`ArrivalData`] backed by plain vectors; used by tests and small
/// drivers. Days past the end of a series hold the last value.
#[derive(Debug, Clone, Default)]
pub struct TableArrivalData {
    daily_arrivals: Vec<u32>,
    fields: BTreeMap<String, Vec<i64>>,
}

impl TableArrivalData {
    pub fn new(daily_arrivals: Vec<u32>) -> Self {
        Self {
            daily_arrivals,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, series: Vec<i64>) -> Self {
        self.fields.insert(name.into(), series);
        self
    }
}

impl ArrivalData for TableArrivalData {
    fn get_new_refugees(&self, day: u32) -> u32 {
        *self.daily_arrivals.get(day as usize).unwrap_or(&0)
    }

    fn get_field(&self, name: &str, day: u32) -> i64 {
        let Some(series) = self.fields.get(name) else {
            return 0;
        };
        match series.last() {
            None => 0,
            Some(last) => *series.get(day as usize).unwrap_or(last),
        }
    }
}
