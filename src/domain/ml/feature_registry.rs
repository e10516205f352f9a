use crate::domain::errors::ForecastError;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

/// Sequence length the model was trained with.
pub const TIME_STEPS: usize = 20;

/// Feature width of every time step.
pub const N_FEATURES: usize = 9;

/// Ordered list of feature names.
/// This order MUST match exactly with the order used when the model was trained.
/// Any change here is a breaking change for ML models.
pub const FEATURE_NAMES: [&str; N_FEATURES] = [
    "current_price",
    "open",
    "high",
    "low",
    "volume",
    "rsi",
    "macd",
    "macd_signal",
    "sma10",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    CurrentPrice,
    Open,
    High,
    Low,
    Volume,
    Rsi,
    Macd,
    MacdSignal,
    Sma,
}

impl Feature {
    pub const ALL: [Feature; N_FEATURES] = [
        Feature::CurrentPrice,
        Feature::Open,
        Feature::High,
        Feature::Low,
        Feature::Volume,
        Feature::Rsi,
        Feature::Macd,
        Feature::MacdSignal,
        Feature::Sma,
    ];

    /// Column index in the trained schema.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        FEATURE_NAMES[self.index()]
    }
}

/// One assembled time step in trained column order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRow {
    values: [f64; N_FEATURES],
}

impl FeatureRow {
    pub fn from_array(values: [f64; N_FEATURES]) -> Self {
        Self { values }
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    pub fn current_price(&self) -> f64 {
        self.get(Feature::CurrentPrice)
    }

    pub fn rsi(&self) -> f64 {
        self.get(Feature::Rsi)
    }

    pub fn sma(&self) -> f64 {
        self.get(Feature::Sma)
    }

    pub fn to_array(&self) -> [f64; N_FEATURES] {
        self.values
    }
}

impl AsRef<[f64]> for FeatureRow {
    fn as_ref(&self) -> &[f64] {
        &self.values
    }
}

/// A (TIME_STEPS, N_FEATURES) matrix: the unit the sequence model consumes.
///
/// The shape is checked on construction, so every value of this type is a
/// valid model input before scaling.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureWindow {
    values: Array2<f64>,
}

impl FeatureWindow {
    /// Builds a window from exactly `TIME_STEPS` rows of `N_FEATURES` values.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self, ForecastError> {
        if rows.len() != TIME_STEPS {
            let width = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
            return Err(ForecastError::shape(
                &[TIME_STEPS, N_FEATURES],
                &[rows.len(), width],
            ));
        }

        let mut flat = Vec::with_capacity(TIME_STEPS * N_FEATURES);
        for row in rows {
            let row = row.as_ref();
            if row.len() != N_FEATURES {
                return Err(ForecastError::shape(
                    &[TIME_STEPS, N_FEATURES],
                    &[rows.len(), row.len()],
                ));
            }
            flat.extend_from_slice(row);
        }

        let values = Array2::from_shape_vec((TIME_STEPS, N_FEATURES), flat)
            .map_err(|e| ForecastError::Scoring(e.to_string()))?;
        Ok(Self { values })
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn column(&self, feature: Feature) -> ArrayView1<'_, f64> {
        self.values.index_axis(Axis(1), feature.index())
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// Row-major nested vectors, the JSON wire layout.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.values.outer_iter().map(|row| row.to_vec()).collect()
    }
}
