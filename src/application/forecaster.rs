//! End-to-end forecasting: symbol check, bars, features, window, scaling,
//! scoring and signal derivation.

use crate::application::market_data::{FeatureAssembler, IndicatorConfig};
use crate::application::ml::{ScalerState, SequenceModel, latest_window};
use crate::domain::errors::ForecastError;
use crate::domain::market::resolve_symbol;
use crate::domain::ml::{FeatureWindow, PredictionResponse, PredictionResult, TIME_STEPS};
use crate::domain::ports::{BarSource, HistoryRequest};
use crate::infrastructure::artifacts::{ArtifactPaths, load_bundle};
use chrono::{Days, NaiveDate};
use ndarray::Axis;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

/// Model and scaler loaded together; read-only for the rest of the process.
#[derive(Debug)]
pub struct ArtifactBundle {
    pub model: SequenceModel,
    pub scaler: ScalerState,
}

impl ArtifactBundle {
    pub fn new(model: SequenceModel, scaler: ScalerState) -> Self {
        Self { model, scaler }
    }

    pub fn load(paths: &ArtifactPaths) -> Result<Self, ForecastError> {
        load_bundle(paths)
    }
}

/// Scores one window. The scaler is checked before any forward work.
pub fn forecast(
    bundle: &ArtifactBundle,
    window: &FeatureWindow,
) -> Result<PredictionResult, ForecastError> {
    let scaled = bundle.scaler.transform(window)?;
    info!("Input features scaled successfully.");

    let model_input = scaled.insert_axis(Axis(0));
    info!(
        "Predicting price with input shape: {:?}",
        model_input.shape()
    );

    let predicted_pct_change = bundle.model.predict(model_input.view())?;
    info!(
        "Raw model prediction (predicted % change): {}",
        predicted_pct_change
    );

    Ok(PredictionResult::from_prediction(predicted_pct_change))
}

/// Calendar days of history to request for one forecast.
///
/// Three times the rows needed, to cover weekends, holidays and indicator warm-up.
pub fn history_days(config: &IndicatorConfig) -> u64 {
    ((TIME_STEPS + config.longest_lookback()) * 3) as u64
}

/// Turns a symbol into a model-ready window using a bar source.
pub struct ForecastPipeline<S: BarSource> {
    source: S,
    assembler: FeatureAssembler,
}

impl<S: BarSource> ForecastPipeline<S> {
    pub fn new(source: S, indicators: IndicatorConfig) -> Self {
        Self {
            source,
            assembler: FeatureAssembler::new(indicators),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// History range ending the day after `as_of`, so `as_of` itself is included.
    pub fn history_request(&self, exchange_ticker: String, as_of: NaiveDate) -> HistoryRequest {
        let end = as_of + Days::new(1);
        let start = end - Days::new(history_days(self.assembler.config()));
        HistoryRequest {
            ticker: exchange_ticker,
            start,
            end,
        }
    }

    pub fn prepare_window(
        &self,
        symbol: &str,
        as_of: NaiveDate,
    ) -> Result<FeatureWindow, ForecastError> {
        let ticker = resolve_symbol(symbol)?;
        let request = self.history_request(ticker.exchange_ticker(), as_of);
        info!(
            "Fetching data for {} from {} to {}",
            request.ticker, request.start, request.end
        );

        let bars = self.source.daily_bars(&request)?;
        if bars.is_empty() {
            return Err(ForecastError::DataSource {
                ticker: request.ticker,
                reason: "no data returned".to_string(),
            });
        }

        let features = self.assembler.assemble(&bars)?;
        if features.degraded {
            warn!("Features for {} built from unadjusted closes", ticker.symbol());
        }

        let window = latest_window(&features.rows)?;
        info!(
            "Successfully prepared {} time steps of features for {}",
            window.shape().0,
            symbol
        );
        Ok(window)
    }

    pub fn run(
        &self,
        bundle: &ArtifactBundle,
        symbol: &str,
        as_of: NaiveDate,
    ) -> Result<PredictionResult, ForecastError> {
        let window = self.prepare_window(symbol, as_of)?;
        forecast(bundle, &window)
    }
}

/// Initialize-once holder for long-lived processes.
///
/// Requests made before a successful [`ForecastService::initialize`] fail with
/// [`ForecastError::ModelUnavailable`]. There is no reload; restart instead.
#[derive(Debug, Default)]
pub struct ForecastService {
    bundle: OnceLock<Arc<ArtifactBundle>>,
}

impl ForecastService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize(&self, paths: &ArtifactPaths) -> Result<Arc<ArtifactBundle>, ForecastError> {
        self.initialize_with(|| ArtifactBundle::load(paths))
    }

    /// Runs `load` only if nothing has been loaded yet.
    pub fn initialize_with<F>(&self, load: F) -> Result<Arc<ArtifactBundle>, ForecastError>
    where
        F: FnOnce() -> Result<ArtifactBundle, ForecastError>,
    {
        if let Some(bundle) = self.bundle.get() {
            return Ok(Arc::clone(bundle));
        }
        let bundle = Arc::new(load()?);
        let _ = self.bundle.set(Arc::clone(&bundle));
        Ok(self.bundle.get().cloned().unwrap_or(bundle))
    }

    pub fn is_ready(&self) -> bool {
        self.bundle.get().is_some()
    }

    pub fn bundle(&self) -> Result<Arc<ArtifactBundle>, ForecastError> {
        self.bundle
            .get()
            .cloned()
            .ok_or(ForecastError::ModelUnavailable)
    }

    pub fn predict(&self, window: &FeatureWindow) -> Result<PredictionResult, ForecastError> {
        let bundle = self.bundle()?;
        forecast(&bundle, window)
    }

    /// Validates a raw (20, 9) matrix and scores it, as a wire response.
    ///
    /// Readiness is checked before the input is looked at.
    pub fn respond(&self, features: &[Vec<f64>]) -> PredictionResponse {
        let result = self.bundle().and_then(|bundle| {
            let window = FeatureWindow::from_rows(features)?;
            forecast(&bundle, &window)
        });
        if let Err(e) = &result {
            warn!("Prediction failed: {}", e);
        }
        PredictionResponse::from(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ml::{
        Activation, AttentionWeights, Dense, OutputHead, RecurrentEncoder,
    };
    use crate::domain::ml::{N_FEATURES, Signal};
    use ndarray::{Array1, Array2};

    fn bundle(bias: f64) -> ArtifactBundle {
        let head = OutputHead::new(
            N_FEATURES,
            vec![
                Dense::new(
                    Array2::zeros((N_FEATURES, 1)),
                    Array1::from_elem(1, bias),
                    Activation::Linear,
                )
                .unwrap(),
            ],
        )
        .unwrap();
        let model = SequenceModel::new(
            Box::new(RecurrentEncoder::identity(N_FEATURES)),
            AttentionWeights::zeros(N_FEATURES),
            head,
        )
        .unwrap();
        let scaler = ScalerState::new(vec![0.0; N_FEATURES], vec![1.0; N_FEATURES]).unwrap();
        ArtifactBundle::new(model, scaler)
    }

    fn rows() -> Vec<Vec<f64>> {
        vec![vec![1.0; N_FEATURES]; TIME_STEPS]
    }

    #[test]
    fn test_zero_prediction_yields_buy() {
        let window = FeatureWindow::from_rows(&rows()).unwrap();
        let result = forecast(&bundle(0.0), &window).unwrap();
        assert_eq!(result.predicted_pct_change, 0.0);
        assert_eq!(result.signal, Signal::Buy);
    }

    #[test]
    fn test_prediction_is_not_inverse_scaled() {
        let window = FeatureWindow::from_rows(&rows()).unwrap();
        let result = forecast(&bundle(-2.5), &window).unwrap();
        assert_eq!(result.predicted_pct_change, -2.5);
        assert_eq!(result.signal, Signal::Sell);
    }

    #[test]
    fn test_service_requires_initialization() {
        let service = ForecastService::new();
        assert!(!service.is_ready());
        assert_eq!(
            service.respond(&rows()),
            PredictionResponse::Error {
                error: "LSTM model not loaded".to_string()
            }
        );
    }

    #[test]
    fn test_unready_service_reports_missing_model_before_shape() {
        let service = ForecastService::new();
        let mut short = rows();
        short.truncate(3);
        assert_eq!(
            service.respond(&short),
            PredictionResponse::Error {
                error: "LSTM model not loaded".to_string()
            }
        );
    }

    #[test]
    fn test_service_loads_once() {
        let service = ForecastService::new();
        service.initialize_with(|| Ok(bundle(1.25))).unwrap();
        // a second loader is never invoked
        service
            .initialize_with(|| panic!("artifacts must not be reloaded"))
            .unwrap();

        assert!(service.is_ready());
        assert_eq!(
            service.respond(&rows()),
            PredictionResponse::Prediction {
                prediction_pct_change: 1.25,
                signal: Signal::Buy
            }
        );
    }

    #[test]
    fn test_failed_initialization_leaves_service_unready() {
        let service = ForecastService::new();
        let err = service
            .initialize(&ArtifactPaths {
                model: "does/not/exist/model.json".into(),
                scaler: "does/not/exist/scaler.json".into(),
            })
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(!service.is_ready());
    }

    #[test]
    fn test_service_rejects_malformed_window() {
        let service = ForecastService::new();
        service.initialize_with(|| Ok(bundle(0.0))).unwrap();

        let mut short = rows();
        short.pop();
        match service.respond(&short) {
            PredictionResponse::Error { error } => {
                assert_eq!(error, "Invalid input shape. Expected [20, 9], got [19, 9]")
            }
            other => panic!("expected error response, got {:?}", other),
        }
    }

    #[test]
    fn test_history_days() {
        assert_eq!(history_days(&IndicatorConfig::default()), 165);
    }
}
