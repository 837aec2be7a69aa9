//! Replacement baskets for harvested positions.
//!
//! A sold name is replaced by sector ETFs when its sector is known, otherwise
//! by broad-market ETFs. Weights are equal.

use std::collections::HashMap;

use portfolio_core::normalize_symbol;
use serde::{Deserialize, Serialize};

pub const SECTOR_PROXIES: &[(&str, &[&str])] = &[
    ("Technology", &["XLK", "VGT", "QQQ"]),
    ("Financials", &["XLF", "VFH", "KBE"]),
    ("Healthcare", &["XLV", "VHT", "IHE"]),
    ("Consumer_Discretionary", &["XLY", "VCR", "FDIS"]),
    ("Industrials", &["XLI", "VIS", "IYJ"]),
];

pub const GENERIC_PROXIES: &[&str] = &["SPY", "VTI", "SCHB", "IVV"];

/// One substitute ticker with its share of the replacement dollars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplacementBasket {
    pub symbol: String,
    pub weight: f64,
    /// Dollars to buy, `weight` x the value being replaced
    pub market_value: f64,
}

fn proxies_for(sector: Option<&str>) -> &'static [&'static str] {
    let Some(sector) = sector else {
        return GENERIC_PROXIES;
    };
    let key = sector.trim().replace(' ', "_");
    SECTOR_PROXIES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, tickers)| *tickers)
        .unwrap_or(GENERIC_PROXIES)
}

/// Equal-weight proxy basket standing in for `symbol`.
pub fn build_replacement_basket(
    symbol: &str,
    sector: Option<&str>,
    target_value: f64,
) -> Vec<ReplacementBasket> {
    let sold = normalize_symbol(symbol);
    let tickers: Vec<&str> = proxies_for(sector)
        .iter()
        .copied()
        .filter(|t| *t != sold)
        .collect();
    if tickers.is_empty() {
        return Vec::new();
    }

    let weight = 1.0 / tickers.len() as f64;
    tickers
        .into_iter()
        .map(|t| ReplacementBasket {
            symbol: t.to_string(),
            weight,
            market_value: target_value * weight,
        })
        .collect()
}

pub fn infer_sector<'a>(symbol: &str, sector_map: &'a HashMap<String, String>) -> Option<&'a str> {
    sector_map.get(&normalize_symbol(symbol)).map(String::as_str)
}
