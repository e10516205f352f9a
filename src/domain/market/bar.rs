use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily OHLCV bar as delivered by a bar source.
///
/// Missing OHLC prints are carried as `NaN`; adjusted close and volume are
/// optional because upstream exports omit them often enough to matter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adjusted_close: Option<f64>,
    pub volume: Option<f64>,
}

/// Column the model calls "current price".
///
/// Chosen once per series: a source that delivers adjusted closes at all uses
/// them for every bar, and a bar with a blank adjusted close has no price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceColumn {
    AdjustedClose,
    /// No bar carries an adjusted close; features degrade to the raw close.
    Close,
}

impl PriceColumn {
    pub fn for_series<'a>(bars: impl IntoIterator<Item = &'a RawBar>) -> Self {
        if bars.into_iter().any(RawBar::is_adjusted) {
            Self::AdjustedClose
        } else {
            Self::Close
        }
    }
}

impl RawBar {
    /// Current price from `column`, `NaN` when the bar has no usable value.
    pub fn price(&self, column: PriceColumn) -> f64 {
        let value = match column {
            PriceColumn::AdjustedClose => self.adjusted_close.unwrap_or(f64::NAN),
            PriceColumn::Close => self.close,
        };
        if value.is_finite() { value } else { f64::NAN }
    }

    pub fn is_adjusted(&self) -> bool {
        self.adjusted_close.is_some()
    }

    /// Volume coerced to a number. Missing or non-numeric volume counts as 0.
    pub fn volume_or_zero(&self) -> f64 {
        self.volume.filter(|v| !v.is_nan()).unwrap_or(0.0)
    }
}
