use super::indicators::{IndicatorConfig, compute_macd, compute_rsi, compute_sma};
use crate::domain::errors::ForecastError;
use crate::domain::market::{PriceColumn, RawBar};
use crate::domain::ml::{FeatureRow, N_FEATURES, TIME_STEPS};
use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

/// Feature rows that survived indicator warm-up trimming.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledFeatures {
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<FeatureRow>,
    /// Rows removed because at least one feature was undefined.
    pub dropped_rows: usize,
    /// No bar had an adjusted close; prices are raw closes.
    pub degraded: bool,
}

impl AssembledFeatures {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Turns raw daily bars into the model's 9-column feature rows.
#[derive(Debug, Clone)]
pub struct FeatureAssembler {
    config: IndicatorConfig,
    min_rows: usize,
}

impl FeatureAssembler {
    pub fn new(config: IndicatorConfig) -> Self {
        Self {
            config,
            min_rows: TIME_STEPS,
        }
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    pub fn assemble(&self, bars: &[RawBar]) -> Result<AssembledFeatures, ForecastError> {
        let bars = sorted_unique(bars)?;

        let column = PriceColumn::for_series(bars.iter().copied());
        if column == PriceColumn::Close {
            warn!("Adjusted close not found, using close instead.");
        }

        // Bars without a price stay in place: every window covering them is
        // undefined, so they and their neighbours are dropped below.
        let prices: Vec<f64> = bars.iter().map(|bar| bar.price(column)).collect();
        let missing = prices.iter().filter(|p| p.is_nan()).count();
        if missing > 0 {
            warn!(
                "{} of {} bars have no usable price; rows around them will be dropped.",
                missing,
                bars.len()
            );
        }

        let rsi = compute_rsi(&prices, self.config.rsi_period);
        let macd = compute_macd(
            &prices,
            self.config.macd_fast_period,
            self.config.macd_slow_period,
            self.config.macd_signal_period,
        );
        let sma = compute_sma(&prices, self.config.sma_period);

        let mut dates = Vec::with_capacity(bars.len());
        let mut rows = Vec::with_capacity(bars.len());

        for (i, bar) in bars.iter().enumerate() {
            let macd_cold = self.config.macd_warmup_trim && i < self.config.macd_warmup();
            let (macd_line, macd_signal) = if macd_cold {
                (None, None)
            } else {
                (macd.macd[i], macd.signal[i])
            };

            let candidate: [Option<f64>; N_FEATURES] = [
                defined(prices[i]),
                defined(bar.open),
                defined(bar.high),
                defined(bar.low),
                Some(bar.volume_or_zero()),
                rsi[i],
                macd_line,
                macd_signal,
                sma[i],
            ];

            if let Some(values) = complete(candidate) {
                dates.push(bar.date);
                rows.push(FeatureRow::from_array(values));
            }
        }

        let dropped_rows = bars.len() - rows.len();
        info!(
            "Dropped {} rows with undefined values after indicator calculation.",
            dropped_rows
        );

        if rows.len() < self.min_rows {
            error!(
                "Not enough rows ({}) remaining after dropping undefined values to create a sequence of {}.",
                rows.len(),
                self.min_rows
            );
            return Err(ForecastError::InsufficientHistory {
                available: rows.len(),
                required: self.min_rows,
            });
        }

        debug!("Assembled {} feature rows", rows.len());

        Ok(AssembledFeatures {
            dates,
            rows,
            dropped_rows,
            degraded: column == PriceColumn::Close,
        })
    }
}

fn defined(value: f64) -> Option<f64> {
    Some(value).filter(|v| !v.is_nan())
}

fn complete(candidate: [Option<f64>; N_FEATURES]) -> Option<[f64; N_FEATURES]> {
    let mut values = [0.0; N_FEATURES];
    for (slot, value) in values.iter_mut().zip(candidate) {
        *slot = value?;
    }
    Some(values)
}

/// Bars in ascending date order; duplicate dates are rejected.
fn sorted_unique(bars: &[RawBar]) -> Result<Vec<&RawBar>, ForecastError> {
    let mut sorted: Vec<&RawBar> = bars.iter().collect();
    sorted.sort_by_key(|bar| bar.date);

    if let Some(pair) = sorted.windows(2).find(|pair| pair[0].date == pair[1].date) {
        return Err(ForecastError::InvalidInput(format!(
            "Duplicate bar for {}",
            pair[0].date
        )));
    }
    Ok(sorted)
}
