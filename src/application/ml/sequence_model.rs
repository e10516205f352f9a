use super::attention::{AttentionWeights, attend};
use super::recurrent::Dense;
use crate::domain::errors::{ArtifactError, ForecastError};
use crate::domain::ml::{N_FEATURES, TIME_STEPS};
use crate::domain::ports::SequenceEncoder;
use ndarray::{Array1, ArrayView1, ArrayView3, Axis};
use std::fmt;
use tracing::debug;

/// Dense layers mapping the attention context to a single scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputHead {
    layers: Vec<Dense>,
}

impl OutputHead {
    pub fn new(input_width: usize, layers: Vec<Dense>) -> Result<Self, ArtifactError> {
        if layers.is_empty() {
            return Err(ArtifactError::Empty { field: "head" });
        }

        let mut width = input_width;
        for (index, layer) in layers.iter().enumerate() {
            if layer.input_width() != width {
                return Err(ArtifactError::LayerWidth {
                    layer: format!("head[{}]", index),
                    expected: width,
                    actual: layer.input_width(),
                });
            }
            width = layer.output_width();
        }
        if width != 1 {
            return Err(ArtifactError::Length {
                field: "head output",
                expected: 1,
                actual: width,
            });
        }
        Ok(Self { layers })
    }

    pub fn input_width(&self) -> usize {
        self.layers[0].input_width()
    }

    pub fn forward(&self, context: ArrayView1<'_, f64>) -> f64 {
        let mut x: Array1<f64> = context.to_owned();
        for layer in &self.layers {
            x = layer.forward(x.view());
        }
        x[0]
    }
}

/// Recurrent body, temporal attention and output head.
///
/// Parameters are immutable after construction; scoring borrows the model.
pub struct SequenceModel {
    encoder: Box<dyn SequenceEncoder>,
    attention: AttentionWeights,
    head: OutputHead,
}

impl SequenceModel {
    pub fn new(
        encoder: Box<dyn SequenceEncoder>,
        attention: AttentionWeights,
        head: OutputHead,
    ) -> Result<Self, ArtifactError> {
        if attention.width() != N_FEATURES {
            return Err(ArtifactError::Length {
                field: "attention width",
                expected: N_FEATURES,
                actual: attention.width(),
            });
        }
        if let Some(width) = encoder.output_width() {
            if width != attention.width() {
                return Err(ArtifactError::LayerWidth {
                    layer: "attention".to_string(),
                    expected: width,
                    actual: attention.width(),
                });
            }
        }
        if head.input_width() != attention.width() {
            return Err(ArtifactError::LayerWidth {
                layer: "head[0]".to_string(),
                expected: attention.width(),
                actual: head.input_width(),
            });
        }

        Ok(Self {
            encoder,
            attention,
            head,
        })
    }

    pub fn encoder_name(&self) -> &str {
        self.encoder.name()
    }

    /// Scores one batch-of-one window of shape (1, TIME_STEPS, N_FEATURES).
    ///
    /// The output is the predicted percentage change as trained; it is not
    /// inverse-scaled.
    pub fn predict(&self, input: ArrayView3<'_, f64>) -> Result<f64, ForecastError> {
        let expected = [1, TIME_STEPS, N_FEATURES];
        if input.shape() != expected {
            return Err(ForecastError::shape(&expected, input.shape()));
        }

        let sequence = input.index_axis(Axis(0), 0);
        let hidden = self.encoder.encode(sequence)?;
        if hidden.dim() != (TIME_STEPS, self.attention.width()) {
            return Err(ForecastError::shape(
                &[TIME_STEPS, self.attention.width()],
                hidden.shape(),
            ));
        }

        let attended = attend(hidden.view(), &self.attention)?;
        let prediction = self.head.forward(attended.context.view());
        debug!("Attention context: {:?}", attended.context);

        if !prediction.is_finite() {
            return Err(ForecastError::Scoring(format!(
                "model produced a non-finite prediction ({})",
                prediction
            )));
        }
        Ok(prediction)
    }
}

impl fmt::Debug for SequenceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceModel")
            .field("encoder", &self.encoder.name())
            .field("attention_width", &self.attention.width())
            .field("head", &self.head)
            .finish()
    }
}
