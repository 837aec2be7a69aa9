//! Cash and weight helpers shared by the planners.

use std::collections::HashMap;

use portfolio_core::Holding;

/// Manual cash plus, optionally, the value of sweep / money-market holdings.
pub fn estimate_available_cash(
    holdings: &[Holding],
    manual_cash: f64,
    include_cash_equivalents: bool,
) -> f64 {
    if !include_cash_equivalents {
        return manual_cash;
    }
    manual_cash
        + holdings
            .iter()
            .filter(|h| h.is_cash_equivalent)
            .map(Holding::market_value)
            .sum::<f64>()
}

pub fn total_market_value(holdings: &[Holding]) -> f64 {
    holdings.iter().map(Holding::market_value).sum()
}

/// Each symbol's share of total holding value. Empty when the total is zero.
pub fn compute_symbol_weights(holdings: &[Holding]) -> HashMap<String, f64> {
    let total = total_market_value(holdings);
    if total == 0.0 {
        return HashMap::new();
    }
    let mut weights: HashMap<String, f64> = HashMap::new();
    for holding in holdings {
        *weights.entry(holding.symbol.clone()).or_insert(0.0) += holding.market_value() / total;
    }
    weights
}
