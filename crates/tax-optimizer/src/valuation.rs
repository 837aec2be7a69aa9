//! Tax-lot valuation against the latest holding prices.

use std::collections::HashMap;

use portfolio_core::{Holding, Lot};
use serde::Serialize;

/// Last known price per symbol, skipping cash equivalents. A holding without
/// a usable price falls back to market value per share.
pub fn price_lookup(holdings: &[Holding]) -> HashMap<String, f64> {
    let mut lookup = HashMap::new();
    for holding in holdings {
        if holding.is_cash_equivalent {
            continue;
        }
        match (holding.price, holding.market_value) {
            (Some(price), _) if price > 0.0 => {
                lookup.insert(holding.symbol.clone(), price);
            }
            (_, Some(value)) if holding.qty > 0.0 => {
                lookup.insert(holding.symbol.clone(), value / holding.qty);
            }
            _ => {}
        }
    }
    lookup
}

/// A lot marked to market.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuedLot<'a> {
    pub lot: &'a Lot,
    pub price: f64,
    pub current_value: f64,
    /// Signed; negative is a loss
    pub unrealized_pl: f64,
    /// Fraction of basis
    pub pl_pct: f64,
}

/// Value one lot. Lots without a positive price or basis cannot be valued
/// and yield `None`.
pub fn value_lot<'a>(lot: &'a Lot, prices: &HashMap<String, f64>) -> Option<ValuedLot<'a>> {
    let price = prices.get(&lot.symbol).copied().filter(|p| *p > 0.0)?;
    if lot.basis_total <= 0.0 {
        return None;
    }
    let current_value = price * lot.qty;
    let unrealized_pl = current_value - lot.basis_total;
    Some(ValuedLot {
        lot,
        price,
        current_value,
        unrealized_pl,
        pl_pct: unrealized_pl / lot.basis_total,
    })
}

pub fn value_lots<'a>(lots: &'a [Lot], prices: &HashMap<String, f64>) -> Vec<ValuedLot<'a>> {
    lots.iter().filter_map(|lot| value_lot(lot, prices)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use portfolio_core::HoldingRecord;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
    }

    #[test]
    fn test_price_lookup_skips_cash_and_uses_market_value() {
        let holdings = vec![
            Holding::priced("AAA", 10.0, 12.0).unwrap(),
            Holding::cash_equivalent("VMFXX", 500.0, 1.0).unwrap(),
            Holding::try_from(HoldingRecord {
                symbol: "BBB".to_string(),
                qty: 4.0,
                market_value: Some(100.0),
                ..Default::default()
            })
            .unwrap(),
        ];
        let prices = price_lookup(&holdings);
        assert_eq!(prices.get("AAA"), Some(&12.0));
        assert_eq!(prices.get("BBB"), Some(&25.0));
        assert!(!prices.contains_key("VMFXX"));
    }

    #[test]
    fn test_value_lot() {
        let lot = Lot::new("L1", "AAA", None, 10.0, 200.0, as_of()).unwrap();
        let prices = HashMap::from([("AAA".to_string(), 15.0)]);
        let valued = value_lot(&lot, &prices).unwrap();
        assert!((valued.current_value - 150.0).abs() < 1e-9);
        assert!((valued.unrealized_pl + 50.0).abs() < 1e-9);
        assert!((valued.pl_pct + 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_unvaluable_lots_are_dropped() {
        let lots = vec![
            Lot::new("ZERO", "AAA", None, 10.0, 0.0, as_of()).unwrap(),
            Lot::new("NOPRICE", "CCC", None, 10.0, 50.0, as_of()).unwrap(),
            Lot::new("OK", "AAA", None, 1.0, 5.0, as_of()).unwrap(),
        ];
        let prices = HashMap::from([("AAA".to_string(), 15.0)]);
        let valued = value_lots(&lots, &prices);
        assert_eq!(valued.len(), 1);
        assert_eq!(valued[0].lot.lot_id, "OK");
    }
}
