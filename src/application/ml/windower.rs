use crate::domain::errors::ForecastError;
use crate::domain::ml::{FeatureWindow, N_FEATURES, TIME_STEPS};

/// Most recent `TIME_STEPS` rows, in order, as a model-ready window.
///
/// Rows must already be null-free and ascending by date. Every row is checked
/// for width, not just the ones that end up in the window.
pub fn latest_window<R: AsRef<[f64]>>(rows: &[R]) -> Result<FeatureWindow, ForecastError> {
    if let Some(bad) = rows.iter().find(|row| row.as_ref().len() != N_FEATURES) {
        return Err(ForecastError::shape(
            &[TIME_STEPS, N_FEATURES],
            &[rows.len().min(TIME_STEPS), bad.as_ref().len()],
        ));
    }

    if rows.len() < TIME_STEPS {
        return Err(ForecastError::shape(
            &[TIME_STEPS, N_FEATURES],
            &[rows.len(), N_FEATURES],
        ));
    }

    FeatureWindow::from_rows(&rows[rows.len() - TIME_STEPS..])
}
