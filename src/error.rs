use thiserror::Error;

/// Top-level error for ecosystem construction and configuration loading.
///
/// Everything here is fatal before or during setup; nothing in the per-step
/// numeric path (scoring, distance comparison) can fail — degenerate inputs
/// are resolved by fallback rules instead.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    DataLookup(#[from] DataLookupError),
}

/// Settings-file errors. Fatal: the run must not start with a misread config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unrecognized simulation parameter: {key}")]
    UnrecognizedKey { key: String },

    #[error("malformed settings row at line {line}: {row:?}")]
    MalformedRow { line: usize, row: String },

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
}

/// Topology construction errors.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("duplicate location name: {name}")]
    DuplicateLocation { name: String },

    /// The diagnostic carries every known location name, matching the
    /// original behavior of dumping the full name list on a bad link.
    #[error("link endpoint {name:?} does not exist (known locations: {known:?})")]
    UnknownEndpoint { name: String, known: Vec<String> },
}

/// Weather-data lookup errors. Fatal only when a coupled link is requested;
/// uncoupled runs never construct these.
#[derive(Debug, Error)]
pub enum DataLookupError {
    #[error("link coupling requested but no weather sources are configured")]
    NoWeatherSources,

    #[error("no precipitation series for link {link:?}")]
    MissingPrecipitationSeries { link: String },

    #[error("no grid cell found near midpoint ({lat}, {lon})")]
    NoGridCell { lat: f64, lon: f64 },
}
