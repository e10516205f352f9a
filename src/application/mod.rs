// Feature construction from daily bars
pub mod market_data;

// Scaling, windowing and the sequence model
pub mod ml;

pub mod forecaster;
