use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration integrity check failed (code {code}): {reason}")]
    ConfigurationIntegrity { code: u8, reason: String },

    #[error("Marker count does not fit given resistivities: mesh has {mesh_regions} regions, {resistivities} resistivities given")]
    ModelMismatch { mesh_regions: usize, resistivities: usize },

    #[error("Scheme `{0}` has no configurations")]
    EmptyScheme(String),

    #[error("Configuration {index} has no equivalent in the reference scheme")]
    ConfigurationNotFound { index: usize },

    #[error("Configuration {config} references electrode {electrode}, but only {n_sensors} sensors exist")]
    InvalidElectrodeIndex { config: usize, electrode: usize, n_sensors: usize },

    #[error("Configuration index {index} out of range for scheme with {len} configurations")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch { context: String, expected: usize, found: usize },

    #[error("Unknown configuration type: {0}")]
    UnknownSchemeType(String),

    #[error("Scheme file format error at line {line}: {message}")]
    SchemeFormat { line: usize, message: String },

    #[error("External engine error: {0}")]
    Engine(String),

    #[error("Linear algebra error: {0}")]
    LinAlg(#[from] ndarray_linalg::error::LinalgError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Controller is {found}, expected {expected}")]
    InvalidState { expected: String, found: String },
}
