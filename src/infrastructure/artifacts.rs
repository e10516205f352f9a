//! Loading of trained artifacts (model weights and feature scaler) from JSON.
//!
//! Model document:
//! ```json
//! {
//!   "time_steps": 20,
//!   "n_features": 9,
//!   "encoder": {"kind": "native", "layers": [
//!     {"type": "bidirectional", "merge_mode": "sum",
//!      "forward": {"kernel": [[..]], "recurrent_kernel": [[..]], "bias": [..]},
//!      "backward": {"kernel": [[..]], "recurrent_kernel": [[..]], "bias": [..]}}
//!   ]},
//!   "attention": {"weight": [[..]], "bias": [..]},
//!   "head": [{"kernel": [[..]], "bias": [..], "activation": "linear"}]
//! }
//! ```
//!
//! Scaler document: `{"mean": [..], "scale": [..]}` (`mean_` / `scale_` accepted).

use crate::application::forecaster::ArtifactBundle;
use crate::application::ml::{
    Activation, AttentionWeights, Dense, EncoderLayer, LstmCell, MergeMode, OutputHead,
    RecurrentEncoder, ScalerState, SequenceModel,
};
use crate::domain::errors::{ArtifactError, ForecastError};
use crate::domain::ml::{N_FEATURES, TIME_STEPS};
use crate::domain::ports::SequenceEncoder;
use ndarray::{Array1, Array2};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub scaler: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ModelDocument {
    time_steps: usize,
    n_features: usize,
    encoder: EncoderDocument,
    attention: AttentionDocument,
    head: Vec<DenseDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum EncoderDocument {
    Native {
        #[serde(default)]
        layers: Vec<LayerDocument>,
    },
    Onnx {
        path: PathBuf,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum LayerDocument {
    Lstm(LstmDocument),
    Bidirectional {
        #[serde(default)]
        merge_mode: MergeMode,
        forward: LstmDocument,
        backward: LstmDocument,
    },
    Dense(DenseDocument),
}

#[derive(Debug, Deserialize)]
struct LstmDocument {
    kernel: Vec<Vec<f64>>,
    recurrent_kernel: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct DenseDocument {
    kernel: Vec<Vec<f64>>,
    bias: Vec<f64>,
    #[serde(default)]
    activation: Activation,
}

#[derive(Debug, Deserialize)]
struct AttentionDocument {
    weight: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct ScalerDocument {
    #[serde(alias = "mean_")]
    mean: Vec<f64>,
    #[serde(alias = "scale_")]
    scale: Vec<f64>,
}

fn matrix(field: &'static str, rows: Vec<Vec<f64>>) -> Result<Array2<f64>, ArtifactError> {
    let width = rows.first().map(Vec::len).unwrap_or(0);
    if width == 0 {
        return Err(ArtifactError::Empty { field });
    }

    let height = rows.len();
    let mut flat = Vec::with_capacity(height * width);
    for (row, values) in rows.into_iter().enumerate() {
        if values.len() != width {
            return Err(ArtifactError::RaggedMatrix {
                field,
                row,
                expected: width,
                actual: values.len(),
            });
        }
        flat.extend(values);
    }

    Array2::from_shape_vec((height, width), flat)
        .map_err(|e| ArtifactError::Unsupported(format!("{}: {}", field, e)))
}

impl LstmDocument {
    fn into_cell(self) -> Result<LstmCell, ArtifactError> {
        LstmCell::new(
            matrix("lstm.kernel", self.kernel)?,
            matrix("lstm.recurrent_kernel", self.recurrent_kernel)?,
            Array1::from(self.bias),
        )
    }
}

impl DenseDocument {
    fn into_dense(self) -> Result<Dense, ArtifactError> {
        Dense::new(
            matrix("dense.kernel", self.kernel)?,
            Array1::from(self.bias),
            self.activation,
        )
    }
}

impl LayerDocument {
    fn into_layer(self) -> Result<EncoderLayer, ArtifactError> {
        match self {
            Self::Lstm(doc) => Ok(EncoderLayer::Lstm(doc.into_cell()?)),
            Self::Bidirectional {
                merge_mode,
                forward,
                backward,
            } => {
                EncoderLayer::bidirectional(forward.into_cell()?, backward.into_cell()?, merge_mode)
            }
            Self::Dense(doc) => Ok(EncoderLayer::Dense(doc.into_dense()?)),
        }
    }
}

fn artifact_error(path: &Path, reason: impl ToString) -> ForecastError {
    ForecastError::ArtifactLoad {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn open(path: &Path) -> Result<BufReader<File>, ForecastError> {
    if !path.exists() {
        error!("Artifact file not found at {:?}", path);
        return Err(artifact_error(path, "file not found"));
    }
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| artifact_error(path, e))
}

fn parse<T: DeserializeOwned, R: Read>(reader: R, origin: &Path) -> Result<T, ForecastError> {
    serde_json::from_reader(reader)
        .map_err(|e| artifact_error(origin, format!("malformed JSON: {}", e)))
}

#[cfg(feature = "onnx")]
fn onnx_encoder(path: &Path) -> Result<Box<dyn SequenceEncoder>, ForecastError> {
    Ok(Box::new(crate::application::ml::onnx_encoder::OnnxEncoder::load(path)?))
}

#[cfg(not(feature = "onnx"))]
fn onnx_encoder(path: &Path) -> Result<Box<dyn SequenceEncoder>, ForecastError> {
    Err(artifact_error(
        path,
        "ONNX encoders require the `onnx` feature",
    ))
}

/// Parses a model document. `origin` names the source in errors and anchors
/// relative ONNX encoder paths.
pub fn read_model<R: Read>(reader: R, origin: &Path) -> Result<SequenceModel, ForecastError> {
    let doc: ModelDocument = parse(reader, origin)?;

    if doc.time_steps != TIME_STEPS || doc.n_features != N_FEATURES {
        return Err(artifact_error(
            origin,
            format!(
                "model expects ({}, {}) windows, this build uses ({}, {})",
                doc.time_steps, doc.n_features, TIME_STEPS, N_FEATURES
            ),
        ));
    }

    let encoder: Box<dyn SequenceEncoder> = match doc.encoder {
        EncoderDocument::Native { layers } => {
            let layers = layers
                .into_iter()
                .map(LayerDocument::into_layer)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| artifact_error(origin, e))?;
            let encoder = RecurrentEncoder::new(N_FEATURES, layers)
                .map_err(|e| artifact_error(origin, e))?;
            Box::new(encoder)
        }
        EncoderDocument::Onnx { path } => {
            let resolved = if path.is_relative() {
                origin.parent().unwrap_or(Path::new(".")).join(path)
            } else {
                path
            };
            onnx_encoder(&resolved)?
        }
    };

    let attention = AttentionWeights::new(
        matrix("attention.weight", doc.attention.weight).map_err(|e| artifact_error(origin, e))?,
        Array1::from(doc.attention.bias),
    )
    .map_err(|e| artifact_error(origin, e))?;

    let head_layers = doc
        .head
        .into_iter()
        .map(DenseDocument::into_dense)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| artifact_error(origin, e))?;
    let head = OutputHead::new(attention.width(), head_layers)
        .map_err(|e| artifact_error(origin, e))?;

    SequenceModel::new(encoder, attention, head).map_err(|e| artifact_error(origin, e))
}

pub fn read_scaler<R: Read>(reader: R, origin: &Path) -> Result<ScalerState, ForecastError> {
    let doc: ScalerDocument = parse(reader, origin)?;
    ScalerState::new(doc.mean, doc.scale).map_err(|e| artifact_error(origin, e))
}

pub fn load_model(path: &Path) -> Result<SequenceModel, ForecastError> {
    let model = read_model(open(path)?, path)?;
    info!(
        "Model loaded successfully from {:?} (encoder: {})",
        path,
        model.encoder_name()
    );
    Ok(model)
}

pub fn load_scaler(path: &Path) -> Result<ScalerState, ForecastError> {
    let scaler = read_scaler(open(path)?, path)?;
    info!("Scaler loaded successfully from {:?}", path);
    if scaler.n_features() != N_FEATURES {
        warn!(
            "Scaler expected {} features, but model uses {}. Predictions will be refused.",
            scaler.n_features(),
            N_FEATURES
        );
    }
    Ok(scaler)
}

/// Loads scaler then model. Either failing is fatal for the process.
pub fn load_bundle(paths: &ArtifactPaths) -> Result<ArtifactBundle, ForecastError> {
    let scaler = load_scaler(&paths.scaler)?;
    let model = load_model(&paths.model)?;
    Ok(ArtifactBundle::new(model, scaler))
}
