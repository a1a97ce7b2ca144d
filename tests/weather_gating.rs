//! Environmental coupling: precipitation reweighting and river-crossing
//! closures, driven through the public facade.

use exodus_sim::weather::{DischargeCell, HistoryCell};
use exodus_sim::{
    DataLookupError, Ecosystem, EngineConfig, LinkType, LocationSpec, SimError, WeatherTables,
};

fn tables_with_precipitation(series: Vec<f64>) -> WeatherTables {
    let mut tables = WeatherTables::default();
    tables.precipitation.insert("A - B".to_string(), series);
    // 15th percentile 1.6, 75th percentile 4.0
    tables.precipitation_history.push(HistoryCell {
        lat: 4.0,
        lon: 30.0,
        tp: vec![1.0, 2.0, 3.0, 4.0, 5.0],
    });
    tables
}

fn two_nodes(weather: WeatherTables, config: EngineConfig) -> Ecosystem {
    let mut eco = Ecosystem::with_weather(config, weather);
    eco.add_location(LocationSpec::new("A").coords(4.0, 30.0).movechance(1.0))
        .unwrap();
    eco.add_location(LocationSpec::new("B").coords(4.0, 30.0).movechance(0.0))
        .unwrap();
    eco
}

#[test]
fn precipitation_bands_rescale_both_directions() {
    // day 0 dry, day 1 moderate, day 2 torrential, day 3 dry again
    let weather = tables_with_precipitation(vec![1.0, 3.0, 20.0, 1.0]);
    let mut eco = two_nodes(weather, EngineConfig::default());
    eco.link_up_typed("A", "B", 100.0, false, LinkType::Precipitation)
        .unwrap();

    let expected = [100.0, 200.0, 1_000_000.0, 100.0];
    for want in expected {
        eco.evolve();
        assert_eq!(eco.link_effective_distance("A", "B"), Some(want));
        // reciprocal pairs never disagree
        assert_eq!(eco.link_effective_distance("B", "A"), Some(want));
    }
}

#[test]
fn flooded_link_stalls_transit_without_resetting_progress() {
    let mut weather = WeatherTables::default();
    // closed for two days, then open
    weather.river_discharge.push(DischargeCell {
        lat: 4.0,
        lon: 30.0,
        dis24: vec![9000.0, 9000.0, 0.0],
    });
    let config = EngineConfig {
        min_move_speed: 50.0,
        max_move_speed: 50.0,
        ..EngineConfig::default()
    };
    let mut eco = two_nodes(weather, config);
    eco.link_up_typed("A", "B", 50.0, false, LinkType::Crossing)
        .unwrap();
    eco.add_agent("A").unwrap();

    // departs on day 0 but the crossing is flooded: 50 km becomes 500 000
    eco.evolve();
    assert_eq!(eco.location_agents("B"), Some(0));
    assert_eq!(eco.num_in_transit(), 1);

    eco.evolve();
    assert_eq!(eco.location_agents("B"), Some(0));
    assert_eq!(eco.num_in_transit(), 1);

    // day 2 the water recedes; accumulated progress (150 km) already exceeds
    // the restored distance, so the crossing completes at once
    eco.evolve();
    assert_eq!(eco.location_agents("B"), Some(1));
    assert_eq!(eco.num_in_transit(), 0);
}

#[test]
fn crossing_survives_past_the_end_of_the_series() {
    let mut weather = WeatherTables::default();
    weather.river_discharge.push(DischargeCell {
        lat: 4.0,
        lon: 30.0,
        dis24: vec![9000.0],
    });
    let mut eco = two_nodes(weather, EngineConfig::default());
    eco.link_up_typed("A", "B", 50.0, false, LinkType::Crossing)
        .unwrap();

    // the single recorded value holds forever: permanently flooded
    for _ in 0..5 {
        eco.evolve();
        assert_eq!(eco.link_effective_distance("A", "B"), Some(500_000.0));
    }
}

#[test]
fn missing_precipitation_series_fails_link_construction() {
    let weather = tables_with_precipitation(vec![0.0]);
    let mut eco = two_nodes(weather, EngineConfig::default());
    eco.add_location(LocationSpec::new("C").coords(4.0, 30.0))
        .unwrap();
    let err = eco
        .link_up_typed("A", "C", 10.0, false, LinkType::Precipitation)
        .unwrap_err();
    assert!(matches!(
        err,
        SimError::DataLookup(DataLookupError::MissingPrecipitationSeries { link }) if link == "A - C"
    ));
}

#[test]
fn uncoupled_links_ignore_the_weather() {
    let weather = tables_with_precipitation(vec![100.0, 100.0]);
    let mut eco = two_nodes(weather, EngineConfig::default());
    eco.link_up("A", "B", 100.0, false).unwrap();
    eco.evolve();
    assert_eq!(eco.link_effective_distance("A", "B"), Some(100.0));
}
