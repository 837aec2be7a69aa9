//! Wash Sale Proximity
//!
//! Flags symbols bought recently enough in this account that selling at a
//! loss risks a wash sale. Only trades visible in the account are considered.

use chrono::{Duration, NaiveDate};
use portfolio_core::dates::within_days;
use portfolio_core::{normalize_symbol, Trade};

/// Days on either side of a sale in which a purchase is treated as risky.
pub const WASH_WINDOW_DAYS: i64 = 31;

/// Read-only view over the account's recent trades.
pub struct WashSaleMonitor<'a> {
    trades: &'a [Trade],
    window_days: i64,
}

impl<'a> WashSaleMonitor<'a> {
    pub fn new(trades: &'a [Trade]) -> Self {
        Self {
            trades,
            window_days: WASH_WINDOW_DAYS,
        }
    }

    /// Whether any BUY of `symbol` lies within the window around `as_of`.
    pub fn recent_buy(&self, symbol: &str, as_of: NaiveDate) -> bool {
        let symbol = normalize_symbol(symbol);
        self.trades.iter().any(|trade| {
            trade.is_buy()
                && trade.symbol == symbol
                && within_days(trade.trade_date, as_of, self.window_days)
        })
    }

    /// Buys of `symbol` inside the window, oldest first.
    pub fn recent_buys(&self, symbol: &str, as_of: NaiveDate) -> Vec<&'a Trade> {
        let symbol = normalize_symbol(symbol);
        let mut buys: Vec<&Trade> = self
            .trades
            .iter()
            .filter(|t| t.is_buy() && t.symbol == symbol)
            .filter(|t| within_days(t.trade_date, as_of, self.window_days))
            .collect();
        buys.sort_by_key(|t| t.trade_date);
        buys
    }

    /// First day a replacement purchase no longer falls inside the window of
    /// a sale made on `sale_date`.
    pub fn safe_repurchase_date(&self, sale_date: NaiveDate) -> NaiveDate {
        sale_date + Duration::days(self.window_days + 1)
    }
}
