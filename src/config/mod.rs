//! Configuration for rustcast.
//!
//! Loaded from environment variables (after `.env`), organized by concern:
//! artifact locations and indicator periods. CLI flags override both.

mod artifact_config;
mod indicator_env_config;

pub use artifact_config::ArtifactEnvConfig;
pub use indicator_env_config::IndicatorEnvConfig;

use crate::application::market_data::IndicatorConfig;
use crate::infrastructure::artifacts::ArtifactPaths;
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ForecastConfig {
    pub model_path: PathBuf,
    pub scaler_path: PathBuf,
    pub bars_dir: PathBuf,
    pub indicators: IndicatorConfig,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self::from_parts(ArtifactEnvConfig::default(), IndicatorConfig::default())
    }
}

impl ForecastConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let artifacts = ArtifactEnvConfig::from_lookup(lookup);
        let indicators = IndicatorEnvConfig::from_lookup(lookup)
            .context("Failed to load indicator configuration")?;
        Ok(Self::from_parts(artifacts, indicators))
    }

    fn from_parts(artifacts: ArtifactEnvConfig, indicators: IndicatorConfig) -> Self {
        Self {
            model_path: artifacts.model_path,
            scaler_path: artifacts.scaler_path,
            bars_dir: artifacts.bars_dir,
            indicators,
        }
    }

    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths {
            model: self.model_path.clone(),
            scaler: self.scaler_path.clone(),
        }
    }
}
