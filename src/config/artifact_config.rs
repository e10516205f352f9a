//! Artifact and bar-file locations from environment variables.

use std::path::PathBuf;

/// Where the trained artifacts and daily bar files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEnvConfig {
    pub model_path: PathBuf,
    pub scaler_path: PathBuf,
    pub bars_dir: PathBuf,
}

impl Default for ArtifactEnvConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/attention_lstm.json"),
            scaler_path: PathBuf::from("models/lstm_scaler.json"),
            bars_dir: PathBuf::from("data/bars"),
        }
    }
}

impl ArtifactEnvConfig {
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let path = |key: &str, default: PathBuf| lookup(key).map(PathBuf::from).unwrap_or(default);
        Self {
            model_path: path("MODEL_PATH", defaults.model_path),
            scaler_path: path("SCALER_PATH", defaults.scaler_path),
            bars_dir: path("BARS_DIR", defaults.bars_dir),
        }
    }
}
