use crate::domain::errors::ForecastError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Directional signal derived from the forecast. Serialized as `1` / `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Signal {
    Buy,
    Sell,
}

impl Signal {
    /// Buy on any non-negative forecast; there is no dead zone.
    pub fn from_prediction(predicted_pct_change: f64) -> Self {
        if predicted_pct_change >= 0.0 {
            Self::Buy
        } else {
            Self::Sell
        }
    }
}

impl From<Signal> for i8 {
    fn from(signal: Signal) -> Self {
        match signal {
            Signal::Buy => 1,
            Signal::Sell => -1,
        }
    }
}

impl TryFrom<i8> for Signal {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Buy),
            -1 => Ok(Self::Sell),
            other => Err(format!("signal must be 1 or -1, got {}", other)),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionResult {
    pub predicted_pct_change: f64,
    pub signal: Signal,
}

impl PredictionResult {
    pub fn from_prediction(predicted_pct_change: f64) -> Self {
        Self {
            predicted_pct_change,
            signal: Signal::from_prediction(predicted_pct_change),
        }
    }
}

/// Wire form of a prediction: a result or an error, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictionResponse {
    Prediction {
        prediction_pct_change: f64,
        signal: Signal,
    },
    Error {
        error: String,
    },
}

impl From<Result<PredictionResult, ForecastError>> for PredictionResponse {
    fn from(result: Result<PredictionResult, ForecastError>) -> Self {
        match result {
            Ok(prediction) => Self::Prediction {
                prediction_pct_change: prediction.predicted_pct_change,
                signal: prediction.signal,
            },
            Err(e) => Self::Error {
                error: e.to_string(),
            },
        }
    }
}

/// Wire form of a prepared feature window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WindowResponse {
    Features { features: Vec<Vec<f64>> },
    Error { error: String },
}

impl From<Result<super::FeatureWindow, ForecastError>> for WindowResponse {
    fn from(result: Result<super::FeatureWindow, ForecastError>) -> Self {
        match result {
            Ok(window) => Self::Features {
                features: window.to_rows(),
            },
            Err(e) => Self::Error {
                error: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_prediction_is_buy() {
        assert_eq!(Signal::from_prediction(0.0), Signal::Buy);
        assert_eq!(Signal::from_prediction(0.42), Signal::Buy);
        assert_eq!(Signal::from_prediction(-1e-9), Signal::Sell);
    }

    #[test]
    fn test_prediction_response_json() {
        let response = PredictionResponse::from(Ok(PredictionResult::from_prediction(-0.75)));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"prediction_pct_change": -0.75, "signal": -1})
        );
    }

    #[test]
    fn test_error_response_has_only_error_field() {
        let response = PredictionResponse::from(Err(ForecastError::ModelUnavailable));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, serde_json::json!({"error": "LSTM model not loaded"}));
    }

    #[test]
    fn test_response_parses_back() {
        let parsed: PredictionResponse =
            serde_json::from_str(r#"{"prediction_pct_change": 1.5, "signal": 1}"#).unwrap();
        assert_eq!(
            parsed,
            PredictionResponse::Prediction {
                prediction_pct_change: 1.5,
                signal: Signal::Buy
            }
        );

        let parsed: PredictionResponse = serde_json::from_str(r#"{"error": "boom"}"#).unwrap();
        assert_eq!(
            parsed,
            PredictionResponse::Error {
                error: "boom".to_string()
            }
        );
    }

    #[test]
    fn test_signal_rejects_other_values() {
        assert!(serde_json::from_str::<Signal>("0").is_err());
        assert_eq!(serde_json::from_str::<Signal>("-1").unwrap(), Signal::Sell);
    }
}
