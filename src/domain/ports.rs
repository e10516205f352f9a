use crate::domain::errors::ForecastError;
use crate::domain::market::RawBar;
use chrono::NaiveDate;
use ndarray::{Array2, ArrayView2};

/// Half-open date range `[start, end)` of daily bars for one exchange ticker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub ticker: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Source of raw daily bars (files, vendor APIs, fixtures).
pub trait BarSource: Send + Sync {
    /// Returns the bars inside the requested range, ascending by date.
    fn daily_bars(&self, request: &HistoryRequest) -> Result<Vec<RawBar>, ForecastError>;
}

/// Recurrent body of the sequence model.
///
/// Maps a (time, features) window to one hidden vector per time step.
pub trait SequenceEncoder: Send + Sync {
    fn encode(&self, sequence: ArrayView2<'_, f64>) -> Result<Array2<f64>, ForecastError>;

    /// Per-step hidden width, when it is known before running the encoder.
    fn output_width(&self) -> Option<usize>;

    /// Get encoder name/type
    fn name(&self) -> &str;
}
