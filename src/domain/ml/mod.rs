pub mod feature_registry;
pub mod prediction;

pub use feature_registry::{
    FEATURE_NAMES, Feature, FeatureRow, FeatureWindow, N_FEATURES, TIME_STEPS,
};
pub use prediction::{PredictionResponse, PredictionResult, Signal, WindowResponse};
