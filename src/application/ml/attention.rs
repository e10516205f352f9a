//! Temporal attention over the recurrent body's hidden states.
//!
//! For hidden states `x` of shape (T, F):
//!
//! ```text
//! e = tanh(x · W + b)          (T, F)
//! a = softmax(e) over axis T   (T, F), every column sums to 1
//! context = Σ_t x[t] ⊙ a[t]    (F)
//! ```
//!
//! The softmax runs over time for each feature column independently, not over
//! features.

use crate::domain::errors::{ArtifactError, ForecastError};
use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Trained attention parameters: a square (F, F) matrix and a length-F bias.
#[derive(Debug, Clone, PartialEq)]
pub struct AttentionWeights {
    weight: Array2<f64>,
    bias: Array1<f64>,
}

impl AttentionWeights {
    pub fn new(weight: Array2<f64>, bias: Array1<f64>) -> Result<Self, ArtifactError> {
        let (rows, cols) = weight.dim();
        if rows == 0 {
            return Err(ArtifactError::Empty {
                field: "attention.weight",
            });
        }
        if rows != cols {
            return Err(ArtifactError::Length {
                field: "attention.weight columns",
                expected: rows,
                actual: cols,
            });
        }
        if bias.len() != rows {
            return Err(ArtifactError::Length {
                field: "attention.bias",
                expected: rows,
                actual: bias.len(),
            });
        }
        if let Some((index, &value)) = weight.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(ArtifactError::InvalidValue {
                field: "attention.weight",
                index,
                value,
            });
        }
        if let Some((index, &value)) = bias.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(ArtifactError::InvalidValue {
                field: "attention.bias",
                index,
                value,
            });
        }
        Ok(Self { weight, bias })
    }

    /// Zero matrix and bias: uniform weights over time.
    pub fn zeros(width: usize) -> Self {
        Self {
            weight: Array2::zeros((width, width)),
            bias: Array1::zeros(width),
        }
    }

    pub fn width(&self) -> usize {
        self.bias.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttentionOutput {
    /// Time-collapsed summary, one value per feature.
    pub context: Array1<f64>,
    /// Per time step, per feature weights; each column sums to 1.
    pub weights: Array2<f64>,
}

pub fn attend(
    hidden: ArrayView2<'_, f64>,
    params: &AttentionWeights,
) -> Result<AttentionOutput, ForecastError> {
    let (steps, width) = hidden.dim();
    if steps == 0 || width != params.width() {
        return Err(ForecastError::shape(
            &[steps.max(1), params.width()],
            &[steps, width],
        ));
    }

    let scores = (hidden.dot(&params.weight) + &params.bias).mapv(f64::tanh);
    let weights = softmax_over_time(scores);
    let context = (&hidden * &weights).sum_axis(Axis(0));

    Ok(AttentionOutput { context, weights })
}

fn softmax_over_time(mut scores: Array2<f64>) -> Array2<f64> {
    for mut column in scores.columns_mut() {
        let max = column.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        column.mapv_inplace(|v| (v - max).exp());
        let sum = column.sum();
        column /= sum;
    }
    scores
}
