pub mod artifacts;
pub mod csv_bars;
pub mod mock_bars;

pub use artifacts::{ArtifactPaths, load_bundle, load_model, load_scaler};
pub use csv_bars::CsvBarSource;
pub use mock_bars::MockBarSource;
