use crate::domain::errors::ForecastError;
use crate::domain::market::RawBar;
use crate::domain::ports::{BarSource, HistoryRequest};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One row of a Yahoo-style daily export.
///
/// Vendor gaps show up as `null` or empty cells; those parse to `None`.
#[derive(Debug, Deserialize)]
struct BarRecord {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Open", deserialize_with = "csv::invalid_option")]
    open: Option<f64>,
    #[serde(rename = "High", deserialize_with = "csv::invalid_option")]
    high: Option<f64>,
    #[serde(rename = "Low", deserialize_with = "csv::invalid_option")]
    low: Option<f64>,
    #[serde(rename = "Close", deserialize_with = "csv::invalid_option")]
    close: Option<f64>,
    #[serde(
        rename = "Adj Close",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    adjusted_close: Option<f64>,
    #[serde(rename = "Volume", default, deserialize_with = "csv::invalid_option")]
    volume: Option<f64>,
}

impl BarRecord {
    fn into_bar(self) -> Result<RawBar, String> {
        // Some exports carry a time and offset after the date.
        let day = self.date.get(..10).unwrap_or(&self.date);
        let date = NaiveDate::parse_from_str(day, "%Y-%m-%d")
            .map_err(|e| format!("bad date '{}': {}", self.date, e))?;

        Ok(RawBar {
            date,
            open: self.open.unwrap_or(f64::NAN),
            high: self.high.unwrap_or(f64::NAN),
            low: self.low.unwrap_or(f64::NAN),
            close: self.close.unwrap_or(f64::NAN),
            adjusted_close: self.adjusted_close,
            volume: self.volume,
        })
    }
}

/// Parses daily bars from CSV with a header row.
pub fn read_bars<R: Read>(reader: R) -> Result<Vec<RawBar>, String> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars = Vec::new();
    for (line, record) in rdr.deserialize::<BarRecord>().enumerate() {
        let record = record.map_err(|e| format!("record {}: {}", line + 1, e))?;
        bars.push(record.into_bar()?);
    }
    Ok(bars)
}

/// Reads `<directory>/<exchange ticker>.csv`, one file per instrument.
#[derive(Debug, Clone)]
pub struct CsvBarSource {
    directory: PathBuf,
}

impl CsvBarSource {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn path_for(&self, ticker: &str) -> PathBuf {
        self.directory.join(format!("{}.csv", ticker))
    }

    fn load(&self, ticker: &str, path: &Path) -> Result<Vec<RawBar>, ForecastError> {
        let data_error = |reason: String| ForecastError::DataSource {
            ticker: ticker.to_string(),
            reason,
        };

        if !path.exists() {
            return Err(data_error(format!("no bar file at {}", path.display())));
        }
        let file = File::open(path).map_err(|e| data_error(e.to_string()))?;
        read_bars(file).map_err(data_error)
    }
}

impl BarSource for CsvBarSource {
    fn daily_bars(&self, request: &HistoryRequest) -> Result<Vec<RawBar>, ForecastError> {
        let path = self.path_for(&request.ticker);
        let mut bars = self.load(&request.ticker, &path)?;
        let total = bars.len();

        bars.retain(|bar| bar.date >= request.start && bar.date < request.end);
        bars.sort_by_key(|bar| bar.date);

        debug!("Read {} bars from {:?}", total, path);
        info!(
            "Loaded {} bars for {} in [{}, {})",
            bars.len(),
            request.ticker,
            request.start,
            request.end
        );
        Ok(bars)
    }
}
