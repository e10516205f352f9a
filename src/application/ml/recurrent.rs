//! Native recurrent body: stacked (bi)LSTM and time-distributed dense layers.
//!
//! Weight layouts follow the Keras convention so exported weights can be used
//! as-is: kernels are (input, units), LSTM gates are packed `i, f, c, o`.

use crate::domain::errors::{ArtifactError, ForecastError};
use crate::domain::ports::SequenceEncoder;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, concatenate, s};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Tanh,
    Sigmoid,
}

impl Activation {
    pub fn apply(self, v: f64) -> f64 {
        match self {
            Self::Linear => v,
            Self::Relu => v.max(0.0),
            Self::Tanh => v.tanh(),
            Self::Sigmoid => sigmoid(v),
        }
    }
}

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

fn check_finite(
    field: &'static str,
    values: impl Iterator<Item = f64>,
) -> Result<(), ArtifactError> {
    for (index, value) in values.enumerate() {
        if !value.is_finite() {
            return Err(ArtifactError::InvalidValue {
                field,
                index,
                value,
            });
        }
    }
    Ok(())
}

/// Fully connected layer, `activation(x · kernel + bias)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dense {
    kernel: Array2<f64>,
    bias: Array1<f64>,
    activation: Activation,
}

impl Dense {
    pub fn new(
        kernel: Array2<f64>,
        bias: Array1<f64>,
        activation: Activation,
    ) -> Result<Self, ArtifactError> {
        if kernel.is_empty() {
            return Err(ArtifactError::Empty {
                field: "dense.kernel",
            });
        }
        if bias.len() != kernel.ncols() {
            return Err(ArtifactError::Length {
                field: "dense.bias",
                expected: kernel.ncols(),
                actual: bias.len(),
            });
        }
        check_finite("dense.kernel", kernel.iter().copied())?;
        check_finite("dense.bias", bias.iter().copied())?;
        Ok(Self {
            kernel,
            bias,
            activation,
        })
    }

    pub fn input_width(&self) -> usize {
        self.kernel.nrows()
    }

    pub fn output_width(&self) -> usize {
        self.kernel.ncols()
    }

    pub fn forward(&self, x: ArrayView1<'_, f64>) -> Array1<f64> {
        let activation = self.activation;
        (x.dot(&self.kernel) + &self.bias).mapv(|v| activation.apply(v))
    }

    /// Same projection applied independently to every time step.
    pub fn forward_sequence(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        let activation = self.activation;
        (x.dot(&self.kernel) + &self.bias).mapv(|v| activation.apply(v))
    }
}

/// One LSTM direction.
#[derive(Debug, Clone, PartialEq)]
pub struct LstmCell {
    units: usize,
    kernel: Array2<f64>,
    recurrent_kernel: Array2<f64>,
    bias: Array1<f64>,
}

impl LstmCell {
    pub fn new(
        kernel: Array2<f64>,
        recurrent_kernel: Array2<f64>,
        bias: Array1<f64>,
    ) -> Result<Self, ArtifactError> {
        let gates = kernel.ncols();
        if kernel.is_empty() || gates % 4 != 0 {
            return Err(ArtifactError::Unsupported(format!(
                "lstm.kernel must have 4 * units columns, got {}",
                gates
            )));
        }
        let units = gates / 4;
        if recurrent_kernel.dim() != (units, gates) {
            return Err(ArtifactError::Length {
                field: "lstm.recurrent_kernel",
                expected: units * gates,
                actual: recurrent_kernel.len(),
            });
        }
        if bias.len() != gates {
            return Err(ArtifactError::Length {
                field: "lstm.bias",
                expected: gates,
                actual: bias.len(),
            });
        }
        check_finite("lstm.kernel", kernel.iter().copied())?;
        check_finite("lstm.recurrent_kernel", recurrent_kernel.iter().copied())?;
        check_finite("lstm.bias", bias.iter().copied())?;

        Ok(Self {
            units,
            kernel,
            recurrent_kernel,
            bias,
        })
    }

    pub fn input_width(&self) -> usize {
        self.kernel.nrows()
    }

    pub fn units(&self) -> usize {
        self.units
    }

    /// Runs the whole sequence and returns the hidden state of every step.
    ///
    /// With `reverse` the sequence is consumed last step first, and outputs
    /// are written back at their original time index.
    pub fn run(&self, x: ArrayView2<'_, f64>, reverse: bool) -> Array2<f64> {
        let steps = x.nrows();
        let u = self.units;
        let mut h = Array1::<f64>::zeros(u);
        let mut c = Array1::<f64>::zeros(u);
        let mut outputs = Array2::<f64>::zeros((steps, u));

        for k in 0..steps {
            let t = if reverse { steps - 1 - k } else { k };
            let z = x.row(t).dot(&self.kernel) + h.dot(&self.recurrent_kernel) + &self.bias;

            let i = z.slice(s![0..u]).mapv(sigmoid);
            let f = z.slice(s![u..2 * u]).mapv(sigmoid);
            let g = z.slice(s![2 * u..3 * u]).mapv(f64::tanh);
            let o = z.slice(s![3 * u..4 * u]).mapv(sigmoid);

            c = &f * &c + &i * &g;
            h = &o * &c.mapv(f64::tanh);
            outputs.row_mut(t).assign(&h);
        }
        outputs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    #[default]
    Concat,
    Sum,
    Ave,
    Mul,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EncoderLayer {
    Lstm(LstmCell),
    Bidirectional {
        forward: LstmCell,
        backward: LstmCell,
        merge: MergeMode,
    },
    Dense(Dense),
}

impl EncoderLayer {
    pub fn bidirectional(
        forward: LstmCell,
        backward: LstmCell,
        merge: MergeMode,
    ) -> Result<Self, ArtifactError> {
        if forward.input_width() != backward.input_width() || forward.units() != backward.units()
        {
            return Err(ArtifactError::Unsupported(format!(
                "bidirectional directions differ: forward ({}, {}) vs backward ({}, {})",
                forward.input_width(),
                forward.units(),
                backward.input_width(),
                backward.units()
            )));
        }
        Ok(Self::Bidirectional {
            forward,
            backward,
            merge,
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Lstm(_) => "lstm",
            Self::Bidirectional { .. } => "bidirectional",
            Self::Dense(_) => "dense",
        }
    }

    pub fn input_width(&self) -> usize {
        match self {
            Self::Lstm(cell) => cell.input_width(),
            Self::Bidirectional { forward, .. } => forward.input_width(),
            Self::Dense(dense) => dense.input_width(),
        }
    }

    pub fn output_width(&self) -> usize {
        match self {
            Self::Lstm(cell) => cell.units(),
            Self::Bidirectional { forward, merge, .. } => match merge {
                MergeMode::Concat => forward.units() * 2,
                _ => forward.units(),
            },
            Self::Dense(dense) => dense.output_width(),
        }
    }

    pub fn forward(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, ForecastError> {
        match self {
            Self::Lstm(cell) => Ok(cell.run(x, false)),
            Self::Bidirectional {
                forward,
                backward,
                merge,
            } => {
                let fwd = forward.run(x, false);
                let bwd = backward.run(x, true);
                match merge {
                    MergeMode::Concat => concatenate(Axis(1), &[fwd.view(), bwd.view()])
                        .map_err(|e| ForecastError::Scoring(e.to_string())),
                    MergeMode::Sum => Ok(fwd + bwd),
                    MergeMode::Ave => Ok((fwd + bwd) * 0.5),
                    MergeMode::Mul => Ok(fwd * bwd),
                }
            }
            Self::Dense(dense) => Ok(dense.forward_sequence(x)),
        }
    }
}

/// Stack of encoder layers applied in order. An empty stack is the identity.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurrentEncoder {
    input_width: usize,
    layers: Vec<EncoderLayer>,
}

impl RecurrentEncoder {
    pub fn new(input_width: usize, layers: Vec<EncoderLayer>) -> Result<Self, ArtifactError> {
        let mut width = input_width;
        for (index, layer) in layers.iter().enumerate() {
            if layer.input_width() != width {
                return Err(ArtifactError::LayerWidth {
                    layer: format!("encoder[{}] ({})", index, layer.kind()),
                    expected: width,
                    actual: layer.input_width(),
                });
            }
            width = layer.output_width();
        }
        Ok(Self {
            input_width,
            layers,
        })
    }

    pub fn identity(width: usize) -> Self {
        Self {
            input_width: width,
            layers: Vec::new(),
        }
    }

    pub fn layers(&self) -> &[EncoderLayer] {
        &self.layers
    }
}

impl SequenceEncoder for RecurrentEncoder {
    fn encode(&self, sequence: ArrayView2<'_, f64>) -> Result<Array2<f64>, ForecastError> {
        if sequence.ncols() != self.input_width {
            return Err(ForecastError::shape(
                &[sequence.nrows(), self.input_width],
                &[sequence.nrows(), sequence.ncols()],
            ));
        }

        let mut hidden = sequence.to_owned();
        for layer in &self.layers {
            hidden = layer.forward(hidden.view())?;
        }
        Ok(hidden)
    }

    fn output_width(&self) -> Option<usize> {
        Some(
            self.layers
                .last()
                .map(EncoderLayer::output_width)
                .unwrap_or(self.input_width),
        )
    }

    fn name(&self) -> &str {
        "native recurrent encoder"
    }
}
