use crate::types::normalize_symbol;

/// Sweep and money-market funds treated as cash.
pub const DEFAULT_MONEY_MARKET_TICKERS: &[&str] = &[
    "VMFXX", // Vanguard Federal Money Market
    "SPRXX", // Fidelity Money Market
    "SPAXX",
    "SWVXX",
    "FDLXX",
    "SNVXX",
    "VMMXX",
    "FZFXX",
];

pub fn is_money_market_symbol(symbol: &str, overrides: &[String]) -> bool {
    let symbol = normalize_symbol(symbol);
    if symbol.is_empty() {
        return false;
    }
    DEFAULT_MONEY_MARKET_TICKERS.contains(&symbol.as_str())
        || overrides.iter().any(|o| normalize_symbol(o) == symbol)
}
