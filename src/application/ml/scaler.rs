use crate::domain::errors::{ArtifactError, ForecastError};
use crate::domain::ml::{FeatureWindow, N_FEATURES};
use ndarray::{Array1, Array2};

/// Frozen per-feature standardization fitted at training time.
///
/// Never refit at inference. The feature count is allowed to differ from the
/// model's at load time so that skew is reported per request instead of being
/// silently truncated or padded.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalerState {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl ScalerState {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ArtifactError> {
        if mean.is_empty() {
            return Err(ArtifactError::Empty { field: "mean" });
        }
        if scale.len() != mean.len() {
            return Err(ArtifactError::Length {
                field: "scale",
                expected: mean.len(),
                actual: scale.len(),
            });
        }
        if let Some((index, &value)) = mean.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(ArtifactError::InvalidValue {
                field: "mean",
                index,
                value,
            });
        }
        if let Some((index, &value)) = scale
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v == 0.0)
        {
            return Err(ArtifactError::InvalidValue {
                field: "scale",
                index,
                value,
            });
        }

        Ok(Self {
            mean: Array1::from(mean),
            scale: Array1::from(scale),
        })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// `(x - mean) / scale`, column by column, over every time step.
    pub fn transform(&self, window: &FeatureWindow) -> Result<Array2<f64>, ForecastError> {
        if self.n_features() != N_FEATURES {
            return Err(ForecastError::ScalerMismatch {
                scaler_features: self.n_features(),
                model_features: N_FEATURES,
            });
        }

        let mut scaled = window.values().to_owned();
        scaled -= &self.mean;
        scaled /= &self.scale;
        Ok(scaled)
    }
}
