//! Technical indicators computed exactly as the model's training data was.
//!
//! Every function returns one entry per input observation. `None` marks rows
//! where the indicator is undefined (warm-up); callers drop those rows.

use ta::Next;
use ta::indicators::MovingAverageConvergenceDivergence;
use tracing::warn;

/// Indicator periods used at training time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub macd_fast_period: usize,
    pub macd_slow_period: usize,
    pub macd_signal_period: usize,
    pub sma_period: usize,
    /// Treat MACD as undefined until `slow + signal` observations have elapsed.
    /// Off by default: training kept those rows.
    pub macd_warmup_trim: bool,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast_period: 12,
            macd_slow_period: 26,
            macd_signal_period: 9,
            sma_period: 10,
            macd_warmup_trim: false,
        }
    }
}

impl IndicatorConfig {
    /// Longest lookback of any indicator, MACD counted as slow + signal.
    pub fn longest_lookback(&self) -> usize {
        self.sma_period
            .max(self.rsi_period)
            .max(self.macd_slow_period + self.macd_signal_period)
    }

    /// Number of leading rows for which MACD is considered cold.
    pub fn macd_warmup(&self) -> usize {
        (self.macd_slow_period + self.macd_signal_period).saturating_sub(1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub macd: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
}

/// Rolling arithmetic mean with `min_periods == period`.
///
/// Each window is summed from scratch so a window of zeros is exactly zero,
/// which the RSI division guard depends on.
fn rolling_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let window = &values[i + 1 - period..=i];
            if window.iter().any(|v| v.is_nan()) {
                None
            } else {
                Some(window.iter().sum::<f64>() / period as f64)
            }
        })
        .collect()
}

/// Relative Strength Index using simple rolling means of gains and losses.
///
/// This is not Wilder's smoothing; it reproduces the training features.
/// The first delta is undefined and counts as neither gain nor loss.
/// When the average loss is exactly zero RSI is 100.
pub fn compute_rsi(series: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut gains = Vec::with_capacity(series.len());
    let mut losses = Vec::with_capacity(series.len());

    for i in 0..series.len() {
        let delta = if i == 0 {
            f64::NAN
        } else {
            series[i] - series[i - 1]
        };
        // NaN compares false on both sides, so an undefined delta lands as 0
        gains.push(if delta > 0.0 { delta } else { 0.0 });
        losses.push(if delta < 0.0 { -delta } else { 0.0 });
    }

    let avg_gain = rolling_mean(&gains, period);
    let avg_loss = rolling_mean(&losses, period);

    avg_gain
        .into_iter()
        .zip(avg_loss)
        .map(|(gain, loss)| match (gain, loss) {
            (Some(_), Some(loss)) if loss == 0.0 => Some(100.0),
            (Some(gain), Some(loss)) => {
                let rs = gain / loss;
                Some(100.0 - (100.0 / (1.0 + rs)))
            }
            _ => None,
        })
        .collect()
}

/// MACD line and signal line from recursive (adjust=false) EMAs seeded by the
/// first observation.
///
/// Defined from the first observation onward. A non-finite input yields `None`
/// for that row and is not fed into the averages.
pub fn compute_macd(series: &[f64], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    let mut indicator = match MovingAverageConvergenceDivergence::new(fast, slow, signal) {
        Ok(indicator) => indicator,
        Err(e) => {
            warn!(
                "Invalid MACD periods ({}, {}, {}): {:?}. MACD left undefined.",
                fast, slow, signal, e
            );
            return MacdSeries {
                macd: vec![None; series.len()],
                signal: vec![None; series.len()],
            };
        }
    };

    let (macd, signal) = series
        .iter()
        .map(|&price| {
            if !price.is_finite() {
                return (None, None);
            }
            let out = indicator.next(price);
            (Some(out.macd), Some(out.signal))
        })
        .unzip();

    MacdSeries { macd, signal }
}

/// Simple moving average; undefined for the first `period - 1` rows.
pub fn compute_sma(series: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling_mean(series, period)
}
