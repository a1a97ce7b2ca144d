//! Weather collaborator data and the link-reweighting policy.
//!
//! Tables are day-indexed: the ingestion layer resolves calendar dates against
//! the conflict start date before handing series over, so the engine only ever
//! indexes by simulated day. Series shorter than the run hold their last value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DataLookupError;

/// Discharge level (units of dis24) above which a river crossing is
/// effectively closed for the day.
pub const DISCHARGE_THRESHOLD: f64 = 8000.0;

/// Absolute precipitation (mm) that must also be exceeded, together with the
/// X2 percentile threshold, before an ordinary link floods.
pub const FLOOD_PRECIPITATION_MM: f64 = 15.0;

/// Multiplier applied to a link's base distance while it is flooded. Large
/// enough that no agent can complete the traversal inside one step window.
pub const CLOSURE_MULTIPLIER: f64 = 10000.0;

/// One grid cell of a day-indexed river discharge series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DischargeCell {
    pub lat: f64,
    pub lon: f64,
    /// dis24 per simulated day.
    pub dis24: Vec<f64>,
}

/// One grid cell of the 40-year historical precipitation sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryCell {
    pub lat: f64,
    pub lon: f64,
    /// Raw tp samples over the historical window.
    pub tp: Vec<f64>,
}

/// Environmental data handed to the engine by the (out-of-scope) ingestion
/// layer. Entirely absent when coupling is disabled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeatherTables {
    /// Conflict start date, metadata only ("YYYY-MM-DD"); series are already
    /// aligned so index 0 is day 0 of the run.
    #[serde(default)]
    pub start_date: String,
    /// Same-day precipitation per physical link, keyed "A - B".
    pub precipitation: BTreeMap<String, Vec<f64>>,
    /// River discharge grid.
    #[serde(default)]
    pub river_discharge: Vec<DischargeCell>,
    /// 40-year total precipitation grid.
    #[serde(default)]
    pub precipitation_history: Vec<HistoryCell>,
}

impl WeatherTables {
    /// Load tables from a JSON document.
    pub fn from_json_str(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    /// Resolve the precipitation series key for a link between two named
    /// endpoints, accepting either direction.
    pub fn precipitation_key(&self, a: &str, b: &str) -> Result<String, DataLookupError> {
        let direct = format!("{a} - {b}");
        if self.precipitation.contains_key(&direct) {
            return Ok(direct);
        }
        let reverse = format!("{b} - {a}");
        if self.precipitation.contains_key(&reverse) {
            return Ok(reverse);
        }
        Err(DataLookupError::MissingPrecipitationSeries { link: direct })
    }

    /// Same-day precipitation for a resolved series key. Days past the end of
    /// the series hold the last recorded value.
    pub fn precipitation_on(&self, key: &str, day: u32) -> f64 {
        self.precipitation
            .get(key)
            .map_or(0.0, |series| sample(series, day))
    }

    /// Index of the discharge cell nearest the given point, exact grid match
    /// first, haversine otherwise.
    pub fn nearest_discharge_cell(&self, lat: f64, lon: f64) -> Result<usize, DataLookupError> {
        nearest_cell(self.river_discharge.iter().map(|c| (c.lat, c.lon)), lat, lon)
            .ok_or(DataLookupError::NoGridCell { lat, lon })
    }

    /// Same-day discharge for a cell index.
    pub fn discharge_on(&self, cell: usize, day: u32) -> f64 {
        self.river_discharge
            .get(cell)
            .map_or(0.0, |c| sample(&c.dis24, day))
    }

    /// X1/X2 flood thresholds (15th/75th percentile of the 40-year sample) at
    /// the grid cell nearest the given midpoint. An empty sample yields
    /// infinite thresholds, leaving the coupling inert rather than failing.
    pub fn flood_thresholds(&self, lat: f64, lon: f64) -> Result<(f64, f64), DataLookupError> {
        let idx = nearest_cell(
            self.precipitation_history.iter().map(|c| (c.lat, c.lon)),
            lat,
            lon,
        )
        .ok_or(DataLookupError::NoGridCell { lat, lon })?;
        let sample = &self.precipitation_history[idx].tp;
        if sample.is_empty() {
            return Ok((f64::INFINITY, f64::INFINITY));
        }
        Ok((percentile(sample, 0.15), percentile(sample, 0.75)))
    }
}

fn sample(series: &[f64], day: u32) -> f64 {
    match series.last() {
        None => 0.0,
        Some(last) => *series.get(day as usize).unwrap_or(last),
    }
}

fn nearest_cell(cells: impl Iterator<Item = (f64, f64)>, lat: f64, lon: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, (clat, clon)) in cells.enumerate() {
        if clat == lat && clon == lon {
            return Some(i);
        }
        let d = haversine_km(lat, lon, clat, clon);
        if best.is_none_or(|(_, bd)| d < bd) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}

// ---------------------------------------------------------------------------
// Reweighting policy
// ---------------------------------------------------------------------------

/// Distance multiplier for an ordinary precipitation-coupled link.
pub fn precipitation_multiplier(tp: f64, x1: f64, x2: f64) -> f64 {
    if tp <= x1 {
        1.0
    } else if tp <= x2 {
        2.0
    } else if tp > FLOOD_PRECIPITATION_MM {
        CLOSURE_MULTIPLIER
    } else {
        2.0
    }
}

/// Distance multiplier for a river crossing.
pub fn discharge_multiplier(dis24: f64) -> f64 {
    if dis24 < DISCHARGE_THRESHOLD {
        1.0
    } else {
        CLOSURE_MULTIPLIER
    }
}

// ---------------------------------------------------------------------------
// Geodesy
// ---------------------------------------------------------------------------

/// Great-circle distance in km between two points in decimal degrees.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let p = std::f64::consts::PI / 180.0;
    let a = 0.5 - ((lat2 - lat1) * p).cos() / 2.0
        + (lat1 * p).cos() * (lat2 * p).cos() * (1.0 - ((lon2 - lon1) * p).cos()) / 2.0;
    12742.0 * a.sqrt().asin()
}

/// Spherical midpoint of two points, rounded to whole degrees to match the
/// resolution of the historical grids.
pub fn spherical_midpoint(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> (f64, f64) {
    let (lat1, lon1) = (lat1.to_radians(), lon1.to_radians());
    let (lat2, lon2) = (lat2.to_radians(), lon2.to_radians());

    let bx = lat2.cos() * (lon2 - lon1).cos();
    let by = lat2.cos() * (lon2 - lon1).sin();
    let lat_mid = (lat1.sin() + lat2.sin())
        .atan2(((lat1.cos() + bx) * (lat1.cos() + bx) + by * by).sqrt());
    let lon_mid = lon1 + by.atan2(lat1.cos() + bx);

    (lat_mid.to_degrees().round(), lon_mid.to_degrees().round())
}

/// Percentile with linear interpolation between closest ranks.
pub fn percentile(sample: &[f64], q: f64) -> f64 {
    let mut sorted: Vec<f64> = sample.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precipitation_multiplier_bands() {
        // x1 = 2, x2 = 10
        assert_eq!(precipitation_multiplier(1.0, 2.0, 10.0), 1.0);
        assert_eq!(precipitation_multiplier(2.0, 2.0, 10.0), 1.0);
        assert_eq!(precipitation_multiplier(5.0, 2.0, 10.0), 2.0);
        // above x2 but at most 15mm: still doubled, not closed
        assert_eq!(precipitation_multiplier(12.0, 2.0, 10.0), 2.0);
        assert_eq!(precipitation_multiplier(16.0, 2.0, 10.0), CLOSURE_MULTIPLIER);
    }

    #[test]
    fn flood_needs_both_thresholds() {
        // x2 above 15mm: exceeding x2 alone is enough since tp > 15 follows
        assert_eq!(precipitation_multiplier(20.0, 2.0, 18.0), CLOSURE_MULTIPLIER);
        // tp > 15 but below x2: doubled only
        assert_eq!(precipitation_multiplier(16.0, 2.0, 18.0), 2.0);
    }

    #[test]
    fn discharge_multiplier_threshold() {
        assert_eq!(discharge_multiplier(7999.9), 1.0);
        assert_eq!(discharge_multiplier(8000.0), CLOSURE_MULTIPLIER);
    }

    #[test]
    fn haversine_known_distance() {
        // Bujumbura to Gitega is roughly 62 km as the crow flies.
        let d = haversine_km(-3.383, 29.367, -3.428, 29.925);
        assert!((55.0..70.0).contains(&d), "got {d}");
    }

    #[test]
    fn midpoint_rounds_to_whole_degrees() {
        let (lat, lon) = spherical_midpoint(4.0, 30.0, 6.0, 32.0);
        assert_eq!(lat, 5.0);
        assert_eq!(lon, 31.0);
    }

    #[test]
    fn midpoint_of_identical_points_is_the_point() {
        let (lat, lon) = spherical_midpoint(4.0, 30.0, 4.0, 30.0);
        assert_eq!((lat, lon), (4.0, 30.0));
    }

    #[test]
    fn percentile_interpolates() {
        let sample = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&sample, 0.0), 1.0);
        assert_eq!(percentile(&sample, 0.5), 3.0);
        assert_eq!(percentile(&sample, 1.0), 5.0);
        assert_eq!(percentile(&sample, 0.75), 4.0);
    }

    #[test]
    fn percentile_of_degenerate_samples() {
        assert_eq!(percentile(&[], 0.5), 0.0);
        assert_eq!(percentile(&[7.0], 0.15), 7.0);
    }

    #[test]
    fn empty_history_sample_gives_inert_thresholds() {
        let tables = WeatherTables {
            precipitation_history: vec![HistoryCell {
                lat: 5.0,
                lon: 31.0,
                tp: vec![],
            }],
            ..Default::default()
        };
        let (x1, x2) = tables.flood_thresholds(5.0, 31.0).unwrap();
        assert!(x1.is_infinite() && x2.is_infinite());
        assert_eq!(precipitation_multiplier(1000.0, x1, x2), 1.0);
    }

    #[test]
    fn nearest_cell_prefers_exact_match() {
        let tables = WeatherTables {
            river_discharge: vec![
                DischargeCell {
                    lat: 4.0,
                    lon: 30.0,
                    dis24: vec![1.0],
                },
                DischargeCell {
                    lat: 5.0,
                    lon: 31.0,
                    dis24: vec![2.0],
                },
            ],
            ..Default::default()
        };
        assert_eq!(tables.nearest_discharge_cell(5.0, 31.0).unwrap(), 1);
        // nearest fallback
        assert_eq!(tables.nearest_discharge_cell(4.2, 30.1).unwrap(), 0);
    }

    #[test]
    fn missing_grid_is_a_lookup_error() {
        let tables = WeatherTables::default();
        assert!(tables.nearest_discharge_cell(0.0, 0.0).is_err());
        assert!(tables.flood_thresholds(0.0, 0.0).is_err());
    }

    #[test]
    fn precipitation_key_accepts_either_direction() {
        let mut tables = WeatherTables::default();
        tables.precipitation.insert("A - B".to_string(), vec![1.0]);
        assert_eq!(tables.precipitation_key("A", "B").unwrap(), "A - B");
        assert_eq!(tables.precipitation_key("B", "A").unwrap(), "A - B");
        assert!(tables.precipitation_key("A", "C").is_err());
    }

    #[test]
    fn series_holds_last_value_past_the_end() {
        let mut tables = WeatherTables::default();
        tables.precipitation.insert("A - B".to_string(), vec![1.0, 9.0]);
        assert_eq!(tables.precipitation_on("A - B", 0), 1.0);
        assert_eq!(tables.precipitation_on("A - B", 1), 9.0);
        assert_eq!(tables.precipitation_on("A - B", 50), 9.0);
    }

    #[test]
    fn loads_from_json() {
        let json = r#"{
            "start_date": "2015-05-01",
            "precipitation": { "A - B": [0.0, 20.0] },
            "river_discharge": [{ "lat": 5.0, "lon": 31.0, "dis24": [100.0] }],
            "precipitation_history": [{ "lat": 5.0, "lon": 31.0, "tp": [1.0, 2.0] }]
        }"#;
        let tables = WeatherTables::from_json_str(json).unwrap();
        assert_eq!(tables.precipitation_on("A - B", 1), 20.0);
        assert_eq!(tables.river_discharge.len(), 1);
    }
}
