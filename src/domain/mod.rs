// Domain-specific error types
pub mod errors;

// Daily bars and the symbol universe
pub mod market;

// Feature schema, windows and prediction types
pub mod ml;

// Port interfaces
pub mod ports;
