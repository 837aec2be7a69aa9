//! How a set of sells compares with the portfolio's existing weights.

use portfolio_core::money::format_pct;
use portfolio_core::Holding;
use serde::{Deserialize, Serialize};
use tax_optimizer::SellLotRecommendation;

use crate::analytics::{compute_symbol_weights, total_market_value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellDrift {
    pub symbol: String,
    /// Share of total proceeds
    pub sell_share: f64,
    /// Share of total portfolio value
    pub portfolio_share: f64,
    pub drift: f64,
}

impl SellDrift {
    pub fn note(&self) -> String {
        let sign = if self.drift >= 0.0 { "+" } else { "" };
        format!(
            "{}: sold {} of proceeds vs {} weight (drift {}{})",
            self.symbol,
            format_pct(self.sell_share),
            format_pct(self.portfolio_share),
            sign,
            format_pct(self.drift)
        )
    }
}

/// Per-symbol drift, in order of first appearance among the sells.
pub fn compute_sell_drift(
    holdings: &[Holding],
    sells: &[SellLotRecommendation],
    target_amount: f64,
) -> Vec<SellDrift> {
    if sells.is_empty() || target_amount <= 0.0 || total_market_value(holdings) == 0.0 {
        return Vec::new();
    }
    let total_sold: f64 = sells.iter().map(|s| s.proceeds).sum();
    if total_sold == 0.0 {
        return Vec::new();
    }

    let mut sold: Vec<(String, f64)> = Vec::new();
    for sell in sells {
        match sold.iter_mut().find(|(symbol, _)| *symbol == sell.symbol) {
            Some((_, proceeds)) => *proceeds += sell.proceeds,
            None => sold.push((sell.symbol.clone(), sell.proceeds)),
        }
    }

    let weights = compute_symbol_weights(holdings);
    sold.into_iter()
        .map(|(symbol, proceeds)| {
            let sell_share = proceeds / total_sold;
            let portfolio_share = weights.get(&symbol).copied().unwrap_or(0.0);
            SellDrift {
                symbol,
                sell_share,
                portfolio_share,
                drift: sell_share - portfolio_share,
            }
        })
        .collect()
}

pub fn compute_drift_notes(
    holdings: &[Holding],
    sells: &[SellLotRecommendation],
    target_amount: f64,
) -> Vec<String> {
    compute_sell_drift(holdings, sells, target_amount)
        .iter()
        .map(SellDrift::note)
        .collect()
}
