//! Indicator period overrides from environment variables.
//!
//! The defaults are the periods the model was trained with; changing them
//! without retraining skews every prediction.

use crate::application::market_data::IndicatorConfig;
use anyhow::{Context, Result, bail};

pub struct IndicatorEnvConfig;

impl IndicatorEnvConfig {
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<IndicatorConfig> {
        let defaults = IndicatorConfig::default();
        let config = IndicatorConfig {
            rsi_period: Self::parse_period(lookup, "RSI_PERIOD", defaults.rsi_period)?,
            macd_fast_period: Self::parse_period(
                lookup,
                "MACD_FAST_PERIOD",
                defaults.macd_fast_period,
            )?,
            macd_slow_period: Self::parse_period(
                lookup,
                "MACD_SLOW_PERIOD",
                defaults.macd_slow_period,
            )?,
            macd_signal_period: Self::parse_period(
                lookup,
                "MACD_SIGNAL_PERIOD",
                defaults.macd_signal_period,
            )?,
            sma_period: Self::parse_period(lookup, "SMA_PERIOD", defaults.sma_period)?,
            macd_warmup_trim: Self::parse_bool(
                lookup,
                "MACD_WARMUP_TRIM",
                defaults.macd_warmup_trim,
            ),
        };

        if config.macd_fast_period >= config.macd_slow_period {
            bail!(
                "MACD_FAST_PERIOD ({}) must be shorter than MACD_SLOW_PERIOD ({})",
                config.macd_fast_period,
                config.macd_slow_period
            );
        }
        Ok(config)
    }

    fn parse_period(
        lookup: &impl Fn(&str) -> Option<String>,
        key: &str,
        default: usize,
    ) -> Result<usize> {
        let period = lookup(key)
            .unwrap_or_else(|| default.to_string())
            .parse::<usize>()
            .context(format!("Failed to parse {}", key))?;
        if period == 0 {
            bail!("{} must be at least 1", key);
        }
        Ok(period)
    }

    fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
        lookup(key)
            .unwrap_or_else(|| default.to_string())
            .parse::<bool>()
            .unwrap_or(default)
    }
}
