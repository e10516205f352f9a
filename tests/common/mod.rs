#![allow(dead_code)]

use chrono::{Days, NaiveDate};
use ndarray::{Array1, Array2, ArrayView2};
use rustcast::application::forecaster::ArtifactBundle;
use rustcast::application::ml::{
    Activation, AttentionWeights, Dense, OutputHead, RecurrentEncoder, ScalerState, SequenceModel,
};
use rustcast::domain::errors::ForecastError;
use rustcast::domain::market::RawBar;
use rustcast::domain::ml::N_FEATURES;
use rustcast::domain::ports::SequenceEncoder;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 28).unwrap()
}

/// `count` consecutive daily bars ending on `as_of()`, close rising by 0.5 a day.
pub fn linear_bars(count: usize) -> Vec<RawBar> {
    let first = as_of() - Days::new(count as u64 - 1);
    (0..count)
        .map(|i| {
            let close = 100.0 + 0.5 * i as f64;
            RawBar {
                date: first + Days::new(i as u64),
                open: close - 0.25,
                high: close + 1.0,
                low: close - 1.0,
                close,
                adjusted_close: Some(close),
                volume: Some(250_000.0),
            }
        })
        .collect()
}

pub fn linear_head(weight: f64, bias: f64) -> OutputHead {
    let dense = Dense::new(
        Array2::from_elem((N_FEATURES, 1), weight),
        Array1::from_elem(1, bias),
        Activation::Linear,
    )
    .unwrap();
    OutputHead::new(N_FEATURES, vec![dense]).unwrap()
}

pub fn unit_scaler(n_features: usize) -> ScalerState {
    ScalerState::new(vec![0.0; n_features], vec![1.0; n_features]).unwrap()
}

/// Identity encoder, uniform attention, head returning a constant.
pub fn constant_bundle(prediction: f64) -> ArtifactBundle {
    let model = SequenceModel::new(
        Box::new(RecurrentEncoder::identity(N_FEATURES)),
        AttentionWeights::zeros(N_FEATURES),
        linear_head(0.0, prediction),
    )
    .unwrap();
    ArtifactBundle::new(model, unit_scaler(N_FEATURES))
}

/// Identity encoder that records how many times it ran.
#[derive(Debug, Clone, Default)]
pub struct CountingEncoder {
    pub calls: Arc<AtomicUsize>,
}

impl CountingEncoder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SequenceEncoder for CountingEncoder {
    fn encode(&self, sequence: ArrayView2<'_, f64>) -> Result<Array2<f64>, ForecastError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(sequence.to_owned())
    }

    fn output_width(&self) -> Option<usize> {
        Some(N_FEATURES)
    }

    fn name(&self) -> &str {
        "counting encoder"
    }
}

pub fn counting_model(encoder: CountingEncoder) -> SequenceModel {
    SequenceModel::new(
        Box::new(encoder),
        AttentionWeights::zeros(N_FEATURES),
        linear_head(0.0, 0.5),
    )
    .unwrap()
}
