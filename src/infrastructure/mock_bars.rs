use crate::domain::errors::ForecastError;
use crate::domain::market::RawBar;
use crate::domain::ports::{BarSource, HistoryRequest};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// In-memory bar source keyed by exchange ticker. Counts fetches.
#[derive(Debug, Default)]
pub struct MockBarSource {
    bars: HashMap<String, Vec<RawBar>>,
    calls: AtomicUsize,
}

impl MockBarSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bars(mut self, ticker: impl Into<String>, bars: Vec<RawBar>) -> Self {
        self.bars.insert(ticker.into(), bars);
        self
    }

    /// Number of `daily_bars` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BarSource for MockBarSource {
    fn daily_bars(&self, request: &HistoryRequest) -> Result<Vec<RawBar>, ForecastError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        debug!("Mock fetch for {}", request.ticker);

        let bars = self
            .bars
            .get(&request.ticker)
            .map(|bars| {
                bars.iter()
                    .filter(|bar| bar.date >= request.start && bar.date < request.end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(bars)
    }
}
