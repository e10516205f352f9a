use crate::domain::errors::ForecastError;
use crate::domain::ports::SequenceEncoder;
use ndarray::{Array2, ArrayView2};
use ort::session::Session;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info};

/// Recurrent body exported as an ONNX graph: (1, T, F) -> (1, T, H).
pub struct OnnxEncoder {
    session: Mutex<Session>,
    model_path: PathBuf,
}

impl OnnxEncoder {
    pub fn load(model_path: &Path) -> Result<Self, ForecastError> {
        let load_error = |reason: String| ForecastError::ArtifactLoad {
            path: model_path.to_path_buf(),
            reason,
        };

        if !model_path.exists() {
            return Err(load_error("ONNX encoder file not found".to_string()));
        }

        let builder = Session::builder().map_err(|e| {
            error!("Failed to create ONNX session builder: {}", e);
            load_error(e.to_string())
        })?;
        let session = builder.commit_from_file(model_path).map_err(|e| {
            error!("Failed to load ONNX encoder: {}", e);
            load_error(e.to_string())
        })?;

        info!("Successfully loaded ONNX encoder from {:?}", model_path);
        Ok(Self {
            session: Mutex::new(session),
            model_path: model_path.to_path_buf(),
        })
    }
}

impl SequenceEncoder for OnnxEncoder {
    fn encode(&self, sequence: ArrayView2<'_, f64>) -> Result<Array2<f64>, ForecastError> {
        let (steps, width) = sequence.dim();
        let flat_data: Vec<f32> = sequence.iter().map(|&v| v as f32).collect();
        let shape = vec![1, steps, width];

        let input_value = ort::value::Value::from_array((shape.as_slice(), flat_data))
            .map_err(|e| ForecastError::Scoring(format!("Input value creation failed: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| ForecastError::Scoring(format!("Mutex lock failed: {}", e)))?;
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| ForecastError::Scoring(e.to_string()))?;

        let output_value = outputs
            .iter()
            .next()
            .map(|(_, v)| v)
            .ok_or_else(|| ForecastError::Scoring("No output found".to_string()))?;
        let (out_shape, data) = output_value
            .try_extract_tensor::<f32>()
            .map_err(|e| ForecastError::Scoring(e.to_string()))?;

        let dims: Vec<usize> = out_shape.iter().map(|&d| d.max(0) as usize).collect();
        if dims.len() != 3 || dims[0] != 1 || dims[1] != steps {
            return Err(ForecastError::shape(&[1, steps, width], &dims));
        }

        Array2::from_shape_vec(
            (dims[1], dims[2]),
            data.iter().map(|&v| f64::from(v)).collect(),
        )
        .map_err(|e| ForecastError::Scoring(e.to_string()))
    }

    fn output_width(&self) -> Option<usize> {
        None
    }

    fn name(&self) -> &str {
        self.model_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("ONNX encoder")
    }
}
