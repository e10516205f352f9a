use crate::domain::errors::ForecastError;

pub const BIST30_UNIVERSE: &str = "BIST30";

/// Yahoo suffix for Borsa Istanbul listings.
pub const EXCHANGE_SUFFIX: &str = ".IS";

/// Symbols the model was trained on, without the exchange suffix.
pub const BIST30_SYMBOLS: &[&str] = &[
    "AKBNK", "ARCLK", "ASELS", "BIMAS", "DOHOL", "EREGL", "FROTO", "GARAN", "HALKB", "ISCTR",
    "KCHOL", "KOZAL", "PETKM", "SAHOL", "SISE", "TAVHL", "THYAO", "TKFEN", "TCELL", "TOASO",
    "TTKOM", "TUPRS", "ULKER", "VAKBN", "YKBNK", "KRDMD", "NETAS",
];

/// A symbol that passed the allow-list check.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ticker {
    symbol: String,
}

impl Ticker {
    /// Bare symbol, e.g. `THYAO`.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Exchange ticker used by bar sources, e.g. `THYAO.IS`.
    pub fn exchange_ticker(&self) -> String {
        format!("{}{}", self.symbol, EXCHANGE_SUFFIX)
    }
}

/// Normalizes user input (case, `.IS` suffix) and checks it against the allow-list.
pub fn resolve_symbol(input: &str) -> Result<Ticker, ForecastError> {
    let symbol = input.to_uppercase().replace(EXCHANGE_SUFFIX, "");
    if BIST30_SYMBOLS.contains(&symbol.as_str()) {
        Ok(Ticker { symbol })
    } else {
        Err(ForecastError::UnknownSymbol {
            symbol: input.to_string(),
            universe: BIST30_UNIVERSE,
        })
    }
}
