use thiserror::Error;

/// Errors surfaced by the library's fallible edges (config, export, import).
///
/// The emission path itself never fails: clamping and insufficient-data
/// conditions are handled in place.
#[derive(Debug, Error)]
pub enum CadenceError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Insufficient data for {what}: need {needed} samples, have {have}")]
    InsufficientData {
        what: &'static str,
        needed: usize,
        have: usize,
    },
}

/// Validation failures for [`crate::config::EngineConfig`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field}: range {min}..={max} is empty or not finite")]
    InvalidRange {
        field: &'static str,
        min: f64,
        max: f64,
    },

    #[error("{field}: probability {value} outside 0..=1")]
    InvalidProbability { field: &'static str, value: f64 },

    #[error("{field}: weights must be non-negative with a positive total")]
    InvalidWeights { field: &'static str },

    #[error("{field}: must be greater than zero")]
    ZeroWindow { field: &'static str },
}

pub type Result<T> = std::result::Result<T, CadenceError>;
