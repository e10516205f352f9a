pub mod bar;
pub mod universe;

pub use bar::{PriceColumn, RawBar};
pub use universe::{BIST30_SYMBOLS, Ticker, resolve_symbol};
