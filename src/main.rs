use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use rustcast::application::forecaster::{ArtifactBundle, ForecastPipeline, ForecastService};
use rustcast::config::ForecastConfig;
use rustcast::domain::errors::ForecastError;
use rustcast::domain::ml::{N_FEATURES, PredictionResponse, TIME_STEPS, WindowResponse};
use rustcast::domain::ports::BarSource;
use rustcast::infrastructure::CsvBarSource;
use serde::Serialize;
use serde_json::{Value, json};
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level, error, info, warn};
use tracing_subscriber::prelude::*;

const INVALID_JSON: &str = "Invalid JSON input from stdin.";
const READ_FAILED: &str = "Failed to read input from stdin.";
const MISSING_FEATURES: &str =
    "Input JSON must contain a 'features' field with a list of lists/numbers.";
const MISSING_SYMBOL: &str = "Input JSON must contain a 'symbol' field with a string value.";
const ARTIFACTS_UNAVAILABLE: &str = "Failed to load LSTM model or scaler. Check logs.";

#[derive(Parser, Debug)]
#[command(author, version, about = "Attention-LSTM daily price forecaster", long_about = None)]
struct Cli {
    /// Model weights JSON (overrides MODEL_PATH)
    #[arg(long, global = true)]
    model_path: Option<PathBuf>,

    /// Scaler JSON (overrides SCALER_PATH)
    #[arg(long, global = true)]
    scaler_path: Option<PathBuf>,

    /// Directory of `<TICKER>.IS.csv` daily bar files (overrides BARS_DIR)
    #[arg(long, global = true)]
    bars_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read `{"symbol": ..}` from stdin and print the latest feature window
    Prepare {
        /// Last date to include (defaults to today)
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Read `{"features": [[..]]}` from stdin and print a prediction
    Predict,
    /// Build the window for a symbol and score it
    Forecast {
        #[arg(long)]
        symbol: String,

        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // stdout carries the JSON response; logs go to stderr
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stderr_layer)
        .init();

    let cli = Cli::parse();
    let reply = run(cli).unwrap_or_else(|e| {
        error!("{:#}", e);
        Reply::failure(format!("{:#}", e))
    });
    reply.emit()
}

/// One JSON document for stdout and whether the process exits non-zero.
#[derive(Debug, Clone, PartialEq)]
struct Reply {
    body: Value,
    failed: bool,
}

impl Reply {
    fn new<T: Serialize>(response: &T, failed: bool) -> Self {
        match serde_json::to_value(response) {
            Ok(body) => Self { body, failed },
            Err(e) => Self::failure(format!("Failed to serialize response: {}", e)),
        }
    }

    fn success<T: Serialize>(response: &T) -> Self {
        Self::new(response, false)
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            body: json!({ "error": message.into() }),
            failed: true,
        }
    }

    fn emit(&self) -> ExitCode {
        println!("{}", self.body);
        if self.failed {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        }
    }
}

fn run(cli: Cli) -> Result<Reply> {
    let mut config = ForecastConfig::from_env().context("Failed to load configuration")?;
    if let Some(path) = cli.model_path {
        config.model_path = path;
    }
    if let Some(path) = cli.scaler_path {
        config.scaler_path = path;
    }
    if let Some(dir) = cli.bars_dir {
        config.bars_dir = dir;
    }

    let pipeline = ForecastPipeline::new(CsvBarSource::new(&config.bars_dir), config.indicators);
    let today = || Local::now().date_naive();
    let paths = config.artifact_paths();
    let load = || ArtifactBundle::load(&paths);

    let reply = match cli.command {
        Command::Prepare { as_of } => {
            prepare_command(&pipeline, std::io::stdin(), as_of.unwrap_or_else(today))
        }
        Command::Predict => predict_command(load, std::io::stdin()),
        Command::Forecast { symbol, as_of } => {
            forecast_command(&pipeline, load, &symbol, as_of.unwrap_or_else(today))
        }
    };
    Ok(reply)
}

/// `{"symbol": ..}` in, the latest feature window out. Every failure exits 1.
fn prepare_command<S: BarSource, R: Read>(
    pipeline: &ForecastPipeline<S>,
    stdin: R,
    as_of: NaiveDate,
) -> Reply {
    let input = match read_json(stdin) {
        Ok(value) => value,
        Err(reply) => return reply,
    };
    let Some(symbol) = input.get("symbol").and_then(Value::as_str) else {
        error!("Invalid input data: {}", MISSING_SYMBOL);
        return Reply::failure(MISSING_SYMBOL);
    };

    match pipeline.prepare_window(symbol, as_of) {
        Ok(window) => Reply::success(&WindowResponse::Features {
            features: window.to_rows(),
        }),
        Err(e) => {
            error!("Failed to fetch/process data for {}: {}", symbol, e);
            match e {
                ForecastError::UnknownSymbol { .. } => Reply::failure(e.to_string()),
                other => Reply::failure(format!("Error processing data for {}: {}", symbol, other)),
            }
        }
    }
}

/// `{"features": [[..]]}` in, a prediction out.
///
/// Artifacts are loaded before stdin is touched. Input that never reaches the
/// model (unreadable, not JSON, no feature list) exits 1; a request the model
/// rejects is answered with an error object and exits 0.
fn predict_command<F, R>(load: F, stdin: R) -> Reply
where
    F: FnOnce() -> Result<ArtifactBundle, ForecastError>,
    R: Read,
{
    let service = ForecastService::new();
    if let Err(e) = service.initialize_with(load) {
        error!("{}", e);
        return Reply::failure(ARTIFACTS_UNAVAILABLE);
    }

    let input = match read_json(stdin) {
        Ok(value) => value,
        Err(reply) => return reply,
    };
    match parse_features(&input) {
        None => {
            error!("Invalid input data: {}", MISSING_FEATURES);
            Reply::failure(MISSING_FEATURES)
        }
        Some(Ok(rows)) => Reply::success(&service.respond(&rows)),
        Some(Err(e)) => {
            warn!("Prediction failed: {}", e);
            Reply::success(&PredictionResponse::Error {
                error: e.to_string(),
            })
        }
    }
}

/// Builds the window for `symbol` and scores it. Only artifact failures exit 1.
fn forecast_command<S, F>(
    pipeline: &ForecastPipeline<S>,
    load: F,
    symbol: &str,
    as_of: NaiveDate,
) -> Reply
where
    S: BarSource,
    F: FnOnce() -> Result<ArtifactBundle, ForecastError>,
{
    let service = ForecastService::new();
    let bundle = match service.initialize_with(load) {
        Ok(bundle) => bundle,
        Err(e) => {
            error!("{}", e);
            return Reply::failure(ARTIFACTS_UNAVAILABLE);
        }
    };

    let result = pipeline.run(&bundle, symbol, as_of);
    match &result {
        Ok(prediction) => info!(
            "{}: predicted change {:.4}%, signal {}",
            symbol, prediction.predicted_pct_change, prediction.signal
        ),
        Err(e) => warn!("Forecast for {} failed: {}", symbol, e),
    }
    Reply::success(&PredictionResponse::from(result))
}

/// Reads all of `stdin` as JSON. Failures come back as the reply to send.
fn read_json<R: Read>(mut stdin: R) -> std::result::Result<Value, Reply> {
    let mut raw = String::new();
    if let Err(e) = stdin.read_to_string(&mut raw) {
        error!("Failed to read input from stdin: {}", e);
        return Err(Reply::failure(READ_FAILED));
    }

    serde_json::from_str::<Value>(&raw).map_err(|e| {
        error!("Failed to decode JSON from stdin: {}", e);
        Reply::failure(INVALID_JSON)
    })
}

/// Extracts the `features` list.
///
/// `None` when the field is absent, empty or not a list. A list that is not a
/// matrix of numbers is a shape error, reported with its outer length.
fn parse_features(input: &Value) -> Option<std::result::Result<Vec<Vec<f64>>, ForecastError>> {
    let rows = input.get("features")?.as_array()?;
    if rows.is_empty() {
        return None;
    }

    let numeric_rows = rows
        .iter()
        .map(|row| {
            row.as_array()?
                .iter()
                .map(Value::as_f64)
                .collect::<Option<Vec<f64>>>()
        })
        .collect::<Option<Vec<_>>>();
    Some(numeric_rows.ok_or_else(|| {
        ForecastError::shape(&[TIME_STEPS, N_FEATURES], &[rows.len()])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;
    use ndarray::{Array1, Array2};
    use rustcast::application::market_data::IndicatorConfig;
    use rustcast::application::ml::{
        Activation, AttentionWeights, Dense, OutputHead, RecurrentEncoder, ScalerState,
        SequenceModel,
    };
    use rustcast::domain::market::RawBar;
    use rustcast::infrastructure::MockBarSource;
    use std::io;

    /// Fails the test if the command reads stdin at all.
    struct UntouchedStdin;

    impl Read for UntouchedStdin {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            panic!("stdin must not be read");
        }
    }

    struct BrokenStdin;

    impl Read for BrokenStdin {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"))
        }
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 28).unwrap()
    }

    fn constant_bundle(prediction: f64) -> ArtifactBundle {
        let head = OutputHead::new(
            N_FEATURES,
            vec![
                Dense::new(
                    Array2::zeros((N_FEATURES, 1)),
                    Array1::from_elem(1, prediction),
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

    fn missing_artifacts() -> std::result::Result<ArtifactBundle, ForecastError> {
        Err(ForecastError::ArtifactLoad {
            path: PathBuf::from("models/attention_lstm.json"),
            reason: "file not found".to_string(),
        })
    }

    fn pipeline() -> ForecastPipeline<MockBarSource> {
        let first = as_of() - Days::new(79);
        let bars = (0..80u64)
            .map(|i| {
                let close = 100.0 + 0.5 * i as f64;
                RawBar {
                    date: first + Days::new(i),
                    open: close - 0.25,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    adjusted_close: Some(close),
                    volume: Some(250_000.0),
                }
            })
            .collect();
        let source = MockBarSource::new().with_bars("THYAO.IS", bars);
        ForecastPipeline::new(source, IndicatorConfig::default())
    }

    fn window_json(rows: usize) -> String {
        json!({ "features": vec![vec![1.0; N_FEATURES]; rows] }).to_string()
    }

    fn predict(stdin: &str) -> Reply {
        predict_command(|| Ok(constant_bundle(0.75)), stdin.as_bytes())
    }

    #[test]
    fn test_predict_scores_valid_window() {
        let reply = predict(&window_json(TIME_STEPS));
        assert!(!reply.failed);
        assert_eq!(
            reply.body,
            json!({"prediction_pct_change": 0.75, "signal": 1})
        );
    }

    #[test]
    fn test_predict_artifact_failure_exits_before_reading_stdin() {
        let reply = predict_command(missing_artifacts, UntouchedStdin);
        assert!(reply.failed);
        assert_eq!(reply.body, json!({ "error": ARTIFACTS_UNAVAILABLE }));
    }

    #[test]
    fn test_predict_invalid_json_exits_1() {
        let reply = predict("{\"features\": [[1.0, ");
        assert!(reply.failed);
        assert_eq!(reply.body, json!({"error": "Invalid JSON input from stdin."}));
    }

    #[test]
    fn test_predict_unreadable_stdin_exits_1() {
        let reply = predict_command(|| Ok(constant_bundle(0.0)), BrokenStdin);
        assert!(reply.failed);
        assert_eq!(reply.body, json!({ "error": READ_FAILED }));
    }

    #[test]
    fn test_predict_without_feature_list_exits_1() {
        for stdin in [r#"{}"#, r#"{"features": []}"#, r#"{"features": "rows"}"#] {
            let reply = predict(stdin);
            assert!(reply.failed, "{}", stdin);
            assert_eq!(reply.body, json!({ "error": MISSING_FEATURES }), "{}", stdin);
        }
    }

    #[test]
    fn test_predict_flat_list_is_shape_error() {
        let reply = predict(r#"{"features": [1, 2, 3]}"#);
        assert!(!reply.failed);
        assert_eq!(
            reply.body,
            json!({"error": "Invalid input shape. Expected [20, 9], got [3]"})
        );
    }

    #[test]
    fn test_predict_ragged_and_short_windows_are_shape_errors() {
        let reply = predict(&window_json(TIME_STEPS - 1));
        assert!(!reply.failed);
        assert_eq!(
            reply.body,
            json!({"error": "Invalid input shape. Expected [20, 9], got [19, 9]"})
        );

        let mut rows = vec![vec![1.0; N_FEATURES]; TIME_STEPS];
        rows[4].pop();
        let reply = predict(&json!({ "features": rows }).to_string());
        assert!(!reply.failed);
        assert_eq!(
            reply.body,
            json!({"error": "Invalid input shape. Expected [20, 9], got [20, 8]"})
        );
    }

    #[test]
    fn test_prepare_emits_latest_window() {
        let reply = prepare_command(&pipeline(), r#"{"symbol": "thyao"}"#.as_bytes(), as_of());
        assert!(!reply.failed);
        let rows = reply.body["features"].as_array().unwrap();
        assert_eq!(rows.len(), TIME_STEPS);
        assert!(rows.iter().all(|row| row.as_array().unwrap().len() == N_FEATURES));
    }

    #[test]
    fn test_prepare_unknown_symbol_is_reported_unwrapped() {
        let pipeline = pipeline();
        let reply = prepare_command(&pipeline, r#"{"symbol": "AAPL"}"#.as_bytes(), as_of());
        assert!(reply.failed);
        let error = reply.body["error"].as_str().unwrap();
        assert!(error.starts_with("Symbol 'AAPL' is not in the defined"), "{}", error);
        assert_eq!(pipeline.source().calls(), 0);
    }

    #[test]
    fn test_prepare_without_symbol_exits_1() {
        let reply = prepare_command(&pipeline(), r#"{"ticker": "THYAO"}"#.as_bytes(), as_of());
        assert!(reply.failed);
        assert_eq!(reply.body, json!({ "error": MISSING_SYMBOL }));
    }

    #[test]
    fn test_prepare_data_failure_names_the_symbol() {
        let pipeline = ForecastPipeline::new(MockBarSource::new(), IndicatorConfig::default());
        let reply = prepare_command(&pipeline, r#"{"symbol": "GARAN"}"#.as_bytes(), as_of());
        assert!(reply.failed);
        let error = reply.body["error"].as_str().unwrap();
        assert!(error.starts_with("Error processing data for GARAN: "), "{}", error);
    }

    #[test]
    fn test_forecast_scores_symbol() {
        let reply = forecast_command(&pipeline(), || Ok(constant_bundle(-1.5)), "THYAO", as_of());
        assert!(!reply.failed);
        assert_eq!(
            reply.body,
            json!({"prediction_pct_change": -1.5, "signal": -1})
        );
    }

    #[test]
    fn test_forecast_request_failure_exits_0() {
        let reply = forecast_command(&pipeline(), || Ok(constant_bundle(0.0)), "AAPL", as_of());
        assert!(!reply.failed);
        assert!(reply.body["error"].is_string());
    }

    #[test]
    fn test_forecast_artifact_failure_exits_1() {
        let pipeline = pipeline();
        let reply = forecast_command(&pipeline, missing_artifacts, "THYAO", as_of());
        assert!(reply.failed);
        assert_eq!(reply.body, json!({ "error": ARTIFACTS_UNAVAILABLE }));
        assert_eq!(pipeline.source().calls(), 0);
    }
}
