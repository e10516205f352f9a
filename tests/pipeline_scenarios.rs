mod common;

use common::{
    CountingEncoder, as_of, constant_bundle, counting_model, linear_bars, unit_scaler,
};
use rustcast::application::forecaster::{ArtifactBundle, ForecastPipeline, forecast};
use rustcast::application::market_data::{FeatureAssembler, IndicatorConfig};
use rustcast::domain::errors::ForecastError;
use rustcast::domain::ml::{
    Feature, FeatureWindow, N_FEATURES, PredictionResponse, Signal, TIME_STEPS, WindowResponse,
};
use rustcast::infrastructure::{CsvBarSource, MockBarSource};
use std::fs;

fn pipeline_with(ticker: &str, bar_count: usize) -> ForecastPipeline<MockBarSource> {
    let source = MockBarSource::new().with_bars(ticker, linear_bars(bar_count));
    ForecastPipeline::new(source, IndicatorConfig::default())
}

#[test]
fn test_linear_history_yields_model_ready_window() {
    let pipeline = pipeline_with("THYAO.IS", 80);
    let window = pipeline.prepare_window("thyao", as_of()).unwrap();

    assert_eq!(window.shape(), (TIME_STEPS, N_FEATURES));
    assert!(window.values().iter().all(|v| v.is_finite()));

    let sma = window.column(Feature::Sma);
    assert!(sma.windows(2).into_iter().all(|pair| pair[1] >= pair[0]));

    // strictly rising closes never record a loss
    assert!(window.column(Feature::Rsi).iter().all(|&rsi| rsi == 100.0));

    let volume = window.column(Feature::Volume);
    assert!(volume.iter().all(|&v| v == 250_000.0));
    assert_eq!(pipeline.source().calls(), 1);
}

#[test]
fn test_unknown_symbol_fails_before_any_fetch() {
    let pipeline = pipeline_with("THYAO.IS", 80);
    let result = pipeline.run(&constant_bundle(1.0), "FAKESYM", as_of());

    let response = PredictionResponse::from(result);
    assert_eq!(
        serde_json::to_string(&response).unwrap(),
        r#"{"error":"Symbol 'FAKESYM' is not in the defined BIST30 list."}"#
    );
    assert_eq!(pipeline.source().calls(), 0);
}

#[test]
fn test_scaler_mismatch_skips_forward_pass() {
    let encoder = CountingEncoder::default();
    let bundle = ArtifactBundle::new(counting_model(encoder.clone()), unit_scaler(5));

    let pipeline = pipeline_with("AKBNK.IS", 80);
    let result = pipeline.run(&bundle, "AKBNK", as_of());

    assert_eq!(
        result,
        Err(ForecastError::ScalerMismatch {
            scaler_features: 5,
            model_features: N_FEATURES
        })
    );
    assert_eq!(encoder.calls(), 0);

    let matching = ArtifactBundle::new(counting_model(encoder.clone()), unit_scaler(N_FEATURES));
    pipeline.run(&matching, "AKBNK", as_of()).unwrap();
    assert_eq!(encoder.calls(), 1);
}

#[test]
fn test_history_boundary_at_window_length() {
    // RSI(14) is the longest warm-up: 13 rows are dropped
    let short = pipeline_with("GARAN.IS", 32);
    assert_eq!(
        short.prepare_window("GARAN", as_of()),
        Err(ForecastError::InsufficientHistory {
            available: 19,
            required: TIME_STEPS
        })
    );

    let exact = pipeline_with("GARAN.IS", 33);
    let window = exact.prepare_window("GARAN", as_of()).unwrap();
    assert_eq!(window.shape(), (TIME_STEPS, N_FEATURES));
}

#[test]
fn test_macd_warmup_trim_needs_longer_history() {
    let config = IndicatorConfig {
        macd_warmup_trim: true,
        ..IndicatorConfig::default()
    };
    let source = MockBarSource::new().with_bars("SISE.IS", linear_bars(50));
    let pipeline = ForecastPipeline::new(source, config);

    assert!(matches!(
        pipeline.prepare_window("SISE", as_of()),
        Err(ForecastError::InsufficientHistory { .. })
    ));
}

#[test]
fn test_assembly_is_idempotent() {
    let bars = linear_bars(60);
    let assembler = FeatureAssembler::new(IndicatorConfig::default());
    assert_eq!(assembler.assemble(&bars), assembler.assemble(&bars));
}

#[test]
fn test_empty_history_is_data_source_error() {
    let pipeline = ForecastPipeline::new(MockBarSource::new(), IndicatorConfig::default());
    match pipeline.prepare_window("ASELS", as_of()) {
        Err(ForecastError::DataSource { ticker, .. }) => assert_eq!(ticker, "ASELS.IS"),
        other => panic!("expected DataSource error, got {:?}", other),
    }
}

#[test]
fn test_end_to_end_signal() {
    let pipeline = pipeline_with("BIMAS.IS", 80);

    let down = pipeline.run(&constant_bundle(-0.8), "BIMAS", as_of()).unwrap();
    assert_eq!(down.signal, Signal::Sell);
    assert_eq!(down.predicted_pct_change, -0.8);

    let flat = pipeline.run(&constant_bundle(0.0), "BIMAS", as_of()).unwrap();
    assert_eq!(flat.signal, Signal::Buy);
}

#[test]
fn test_prepared_window_round_trips_through_wire_format() {
    let pipeline = pipeline_with("KCHOL.IS", 80);
    let window = pipeline.prepare_window("KCHOL", as_of()).unwrap();

    let json = serde_json::to_string(&WindowResponse::from(Ok(window.clone()))).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    let rows: Vec<Vec<f64>> = serde_json::from_value(parsed["features"].clone()).unwrap();

    let rebuilt = FeatureWindow::from_rows(&rows).unwrap();
    let bundle = constant_bundle(0.3);
    assert_eq!(
        forecast(&bundle, &rebuilt).unwrap(),
        forecast(&bundle, &window).unwrap()
    );
}

#[test]
fn test_csv_source_feeds_pipeline() {
    let dir = std::env::temp_dir().join(format!("rustcast-bars-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();

    let mut csv = String::from("Date,Open,High,Low,Close,Adj Close,Volume\n");
    for bar in linear_bars(70) {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            bar.date,
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.adjusted_close.unwrap(),
            bar.volume.unwrap()
        ));
    }
    fs::write(dir.join("TUPRS.IS.csv"), csv).unwrap();

    let pipeline = ForecastPipeline::new(CsvBarSource::new(&dir), IndicatorConfig::default());
    let result = pipeline.run(&constant_bundle(0.6), "TUPRS", as_of());
    fs::remove_dir_all(&dir).ok();

    assert_eq!(result.unwrap().signal, Signal::Buy);
}
