pub mod feature_assembler;
pub mod indicators;

pub use feature_assembler::{AssembledFeatures, FeatureAssembler};
pub use indicators::{IndicatorConfig, MacdSeries, compute_macd, compute_rsi, compute_sma};
