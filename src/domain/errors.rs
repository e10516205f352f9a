use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the forecasting pipeline.
///
/// `ArtifactLoad` is the only fatal variant: it is raised once at startup and
/// keeps the service from ever reporting ready. Everything else is scoped to a
/// single request and ends up as an `{"error": ...}` response.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    #[error("Failed to load artifact {}: {reason}", path.display())]
    ArtifactLoad { path: PathBuf, reason: String },

    #[error(
        "Not enough rows ({available}) remaining after indicator warm-up to create a sequence of {required}"
    )]
    InsufficientHistory { available: usize, required: usize },

    #[error("Invalid input shape. Expected {expected:?}, got {actual:?}")]
    Shape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Scaler expects {scaler_features} features, but the model uses {model_features}")]
    ScalerMismatch {
        scaler_features: usize,
        model_features: usize,
    },

    #[error("Scoring failed: {0}")]
    Scoring(String),

    #[error("LSTM model not loaded")]
    ModelUnavailable,

    #[error("Symbol '{symbol}' is not in the defined {universe} list.")]
    UnknownSymbol {
        symbol: String,
        universe: &'static str,
    },

    #[error("Failed to fetch bars for {ticker}: {reason}")]
    DataSource { ticker: String, reason: String },

    #[error("{0}")]
    InvalidInput(String),
}

impl ForecastError {
    pub fn shape(expected: &[usize], actual: &[usize]) -> Self {
        Self::Shape {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// True for failures that must stop the process instead of failing one request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ArtifactLoad { .. })
    }
}

/// Validation failures while turning a persisted artifact into model parameters.
///
/// The loader wraps these into [`ForecastError::ArtifactLoad`] together with the
/// offending file path.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArtifactError {
    #[error("{field}: expected {expected} values, got {actual}")]
    Length {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{field}: row {row} has {actual} columns, expected {expected}")]
    RaggedMatrix {
        field: &'static str,
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("{field}: matrix is empty")]
    Empty { field: &'static str },

    #[error("{field}: invalid value {value} at index {index}")]
    InvalidValue {
        field: &'static str,
        index: usize,
        value: f64,
    },

    #[error("{layer}: input width {actual} does not match upstream width {expected}")]
    LayerWidth {
        layer: String,
        expected: usize,
        actual: usize,
    },

    #[error("{0}")]
    Unsupported(String),
}
