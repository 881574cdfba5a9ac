//! Coin symbol → provider ticker mapping.
//!
//! Accepts bare symbols (`BTC`) or display strings (`Bitcoin (BTC)`).
//! Known coins resolve through a fixed table; anything else gets a
//! synthesized `EXCHANGE:SYMBOLQUOTE` ticker, so mapping never fails.

use std::collections::HashMap;

/// Default exchange prefix for synthesized tickers.
pub const DEFAULT_EXCHANGE: &str = "BINANCE";

/// Default quote currency for synthesized tickers.
pub const DEFAULT_QUOTE: &str = "USDT";

const KNOWN_SYMBOLS: [(&str, &str); 10] = [
    ("BTC", "BINANCE:BTCUSDT"),
    ("ETH", "BINANCE:ETHUSDT"),
    ("SOL", "BINANCE:SOLUSDT"),
    ("XRP", "BINANCE:XRPUSDT"),
    ("ADA", "BINANCE:ADAUSDT"),
    ("DOGE", "BINANCE:DOGEUSDT"),
    ("DOT", "BINANCE:DOTUSDT"),
    ("AVAX", "BINANCE:AVAXUSDT"),
    ("MATIC", "BINANCE:MATICUSDT"),
    ("LINK", "BINANCE:LINKUSDT"),
];

/// Extract the coin symbol from a canonical input and uppercase it.
///
/// `"Bitcoin (BTC)"` → `"BTC"`, `" eth "` → `"ETH"`. A parenthesized
/// group only counts when it holds a single word token.
pub fn canonical_symbol(input: &str) -> String {
    parenthesized_token(input)
        .unwrap_or_else(|| input.trim())
        .to_uppercase()
}

fn parenthesized_token(input: &str) -> Option<&str> {
    let open = input.find('(')?;
    let rest = &input[open + 1..];
    let close = rest.find(')')?;
    let token = &rest[..close];

    let is_word = !token.is_empty()
        && token.chars().all(|c| c.is_alphanumeric() || c == '_');
    is_word.then_some(token)
}

/// Resolves canonical coin symbols to provider tickers.
#[derive(Debug, Clone)]
pub struct SymbolMapper {
    table: HashMap<String, String>,
    exchange: String,
    quote: String,
}

impl SymbolMapper {
    /// Mapper with a custom exchange/quote for synthesized tickers.
    ///
    /// The fixed table is always present; `overrides` are layered on top
    /// (keys are uppercased).
    pub fn new(
        exchange: &str,
        quote: &str,
        overrides: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let mut table: HashMap<String, String> = KNOWN_SYMBOLS
            .iter()
            .map(|(sym, ticker)| ((*sym).to_string(), (*ticker).to_string()))
            .collect();
        table.extend(
            overrides
                .into_iter()
                .map(|(sym, ticker)| (sym.trim().to_uppercase(), ticker)),
        );

        Self {
            table,
            exchange: exchange.to_uppercase(),
            quote: quote.to_uppercase(),
        }
    }

    /// Map a canonical symbol to the provider ticker.
    pub fn map_symbol(&self, canonical: &str) -> String {
        let symbol = canonical_symbol(canonical);
        self.table
            .get(&symbol)
            .cloned()
            .unwrap_or_else(|| format!("{}:{}{}", self.exchange, symbol, self.quote))
    }

    /// Whether the symbol resolves through the table rather than fallback.
    pub fn is_known(&self, canonical: &str) -> bool {
        self.table.contains_key(&canonical_symbol(canonical))
    }
}

impl Default for SymbolMapper {
    fn default() -> Self {
        Self::new(DEFAULT_EXCHANGE, DEFAULT_QUOTE, std::iter::empty())
    }
}
