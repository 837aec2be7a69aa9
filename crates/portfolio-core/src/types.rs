use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{PortfolioError, Result};

/// Days a lot must be held before it is treated as long-term.
pub const LONG_TERM_DAYS: i64 = 365;

/// Uppercase and trim a ticker.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

fn require_symbol(symbol: &str) -> Result<String> {
    let normalized = normalize_symbol(symbol);
    if normalized.is_empty() {
        return Err(PortfolioError::InvalidData("symbol is required".to_string()));
    }
    Ok(normalized)
}

fn require_positive(field: &str, value: f64) -> Result<f64> {
    if !value.is_finite() || value <= 0.0 {
        return Err(PortfolioError::InvalidData(format!(
            "{field} must be greater than zero, got {value}"
        )));
    }
    Ok(value)
}

fn require_non_negative(field: &str, value: f64) -> Result<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(PortfolioError::InvalidData(format!(
            "{field} must not be negative, got {value}"
        )));
    }
    Ok(value)
}

/// Holding period classification of a lot or realized row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    #[serde(rename = "ST")]
    Short,
    #[serde(rename = "LT")]
    Long,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl Default for Term {
    fn default() -> Self {
        Self::Unknown
    }
}

impl Term {
    /// Derive the term of a lot acquired on `acquired` as seen on `as_of`.
    pub fn from_dates(acquired: Option<NaiveDate>, as_of: NaiveDate) -> Self {
        match acquired {
            Some(date) if (as_of - date).num_days() >= LONG_TERM_DAYS => Term::Long,
            Some(_) => Term::Short,
            None => Term::Unknown,
        }
    }

    pub fn is_short(&self) -> bool {
        matches!(self, Term::Short)
    }

    pub fn is_long(&self) -> bool {
        matches!(self, Term::Long)
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Short => write!(f, "ST"),
            Term::Long => write!(f, "LT"),
            Term::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// A position as reported by the brokerage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "HoldingRecord")]
pub struct Holding {
    pub symbol: String,
    pub qty: f64,
    pub price: Option<f64>,
    pub market_value: Option<f64>,
    pub cost_basis_total: Option<f64>,
    pub is_cash_equivalent: bool,
}

/// Unvalidated holding fields as handed over by a loader.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HoldingRecord {
    pub symbol: String,
    pub qty: f64,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub market_value: Option<f64>,
    #[serde(default)]
    pub cost_basis_total: Option<f64>,
    #[serde(default)]
    pub is_cash_equivalent: bool,
}

impl TryFrom<HoldingRecord> for Holding {
    type Error = PortfolioError;

    fn try_from(record: HoldingRecord) -> Result<Self> {
        let symbol = require_symbol(&record.symbol)?;
        let qty = require_positive("qty", record.qty)?;
        let price = record
            .price
            .map(|p| require_positive("price", p))
            .transpose()?;
        let market_value = record
            .market_value
            .map(|v| require_non_negative("market_value", v))
            .transpose()?;
        let cost_basis_total = record
            .cost_basis_total
            .map(|v| require_non_negative("cost_basis_total", v))
            .transpose()?;

        if price.is_none() && market_value.is_none() {
            return Err(PortfolioError::InvalidData(format!(
                "holding {symbol} needs a price or a market value"
            )));
        }

        Ok(Self {
            symbol,
            qty,
            price,
            market_value,
            cost_basis_total,
            is_cash_equivalent: record.is_cash_equivalent,
        })
    }
}

impl Holding {
    pub fn new(
        symbol: &str,
        qty: f64,
        price: Option<f64>,
        market_value: Option<f64>,
    ) -> Result<Self> {
        Self::try_from(HoldingRecord {
            symbol: symbol.to_string(),
            qty,
            price,
            market_value,
            ..Default::default()
        })
    }

    /// A priced, non-cash position.
    pub fn priced(symbol: &str, qty: f64, price: f64) -> Result<Self> {
        Self::new(symbol, qty, Some(price), None)
    }

    /// A sweep or money-market position counted as cash.
    pub fn cash_equivalent(symbol: &str, qty: f64, price: f64) -> Result<Self> {
        Self::try_from(HoldingRecord {
            symbol: symbol.to_string(),
            qty,
            price: Some(price),
            is_cash_equivalent: true,
            ..Default::default()
        })
    }

    /// Reported market value, falling back to price x quantity.
    pub fn market_value(&self) -> f64 {
        self.market_value
            .unwrap_or_else(|| self.price.unwrap_or(0.0) * self.qty)
    }
}

/// A tax lot: one purchase of a symbol with its own date and basis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lot {
    /// Unique within the dataset
    pub lot_id: String,
    pub symbol: String,
    /// Missing dates leave the term unknown
    pub acquired_date: Option<NaiveDate>,
    pub qty: f64,
    /// Total cost basis of the whole lot
    pub basis_total: f64,
    pub covered: Option<bool>,
    /// Derived from `acquired_date` at construction
    pub term: Term,
}

impl Lot {
    pub fn new(
        lot_id: &str,
        symbol: &str,
        acquired_date: Option<NaiveDate>,
        qty: f64,
        basis_total: f64,
        as_of: NaiveDate,
    ) -> Result<Self> {
        let lot_id = lot_id.trim();
        if lot_id.is_empty() {
            return Err(PortfolioError::InvalidData("lot_id is required".to_string()));
        }
        Ok(Self {
            lot_id: lot_id.to_string(),
            symbol: require_symbol(symbol)?,
            acquired_date,
            qty: require_positive("qty", qty)?,
            basis_total: require_non_negative("basis_total", basis_total)?,
            covered: None,
            term: Term::from_dates(acquired_date, as_of),
        })
    }

    pub fn basis_per_share(&self) -> f64 {
        if self.qty > 0.0 {
            self.basis_total / self.qty
        } else {
            0.0
        }
    }

    /// Days between acquisition and `as_of`, if the acquisition date is known.
    pub fn days_held(&self, as_of: NaiveDate) -> Option<i64> {
        self.acquired_date.map(|d| (as_of - d).num_days())
    }
}

/// Lot fields before the term is derived.
#[derive(Debug, Clone, Deserialize)]
pub struct LotRecord {
    pub lot_id: String,
    pub symbol: String,
    #[serde(default)]
    pub acquired_date: Option<NaiveDate>,
    pub qty: f64,
    pub basis_total: f64,
    #[serde(default)]
    pub covered: Option<bool>,
}

impl LotRecord {
    pub fn into_lot(self, as_of: NaiveDate) -> Result<Lot> {
        let mut lot = Lot::new(
            &self.lot_id,
            &self.symbol,
            self.acquired_date,
            self.qty,
            self.basis_total,
            as_of,
        )?;
        lot.covered = self.covered;
        Ok(lot)
    }
}

/// Build lots from records, rejecting any repeated `lot_id`.
pub fn collect_lots(records: Vec<LotRecord>, as_of: NaiveDate) -> Result<Vec<Lot>> {
    let mut seen = HashSet::with_capacity(records.len());
    let mut lots = Vec::with_capacity(records.len());
    for record in records {
        let lot = record.into_lot(as_of)?;
        if !seen.insert(lot.lot_id.clone()) {
            return Err(PortfolioError::DuplicateLot(lot.lot_id));
        }
        lots.push(lot);
    }
    Ok(lots)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// Brokerage exports spell sides many ways ("B", "Buy", "BOUGHT", "Sell Short").
    pub fn parse(text: &str) -> Result<Self> {
        let upper = text.trim().to_uppercase();
        if upper.starts_with('B') {
            Ok(TradeSide::Buy)
        } else if upper.starts_with('S') {
            Ok(TradeSide::Sell)
        } else {
            Err(PortfolioError::InvalidData(format!("unknown trade side '{text}'")))
        }
    }
}

/// A recent execution in this account, used for wash-sale proximity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TradeRecord")]
pub struct Trade {
    pub symbol: String,
    pub side: TradeSide,
    pub trade_date: NaiveDate,
    pub qty: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub side: String,
    pub trade_date: NaiveDate,
    pub qty: f64,
}

impl TryFrom<TradeRecord> for Trade {
    type Error = PortfolioError;

    fn try_from(record: TradeRecord) -> Result<Self> {
        Trade::new(
            &record.symbol,
            TradeSide::parse(&record.side)?,
            record.trade_date,
            record.qty,
        )
    }
}

impl Trade {
    pub fn new(symbol: &str, side: TradeSide, trade_date: NaiveDate, qty: f64) -> Result<Self> {
        Ok(Self {
            symbol: require_symbol(symbol)?,
            side,
            trade_date,
            qty: require_positive("qty", qty)?,
        })
    }

    pub fn is_buy(&self) -> bool {
        self.side == TradeSide::Buy
    }
}

/// One closed-lot tax event from a gains & losses report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RealizedRecord")]
pub struct RealizedGainLossRow {
    pub symbol: String,
    pub quantity: f64,
    pub date_acquired: Option<NaiveDate>,
    pub date_sold: NaiveDate,
    pub proceeds: Option<f64>,
    pub cost_basis: Option<f64>,
    /// Signed; negative is a realized loss
    pub realized_gain_loss: f64,
    pub term: Term,
    pub wash_sale_disallowed: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealizedRecord {
    pub symbol: String,
    pub quantity: f64,
    #[serde(default)]
    pub date_acquired: Option<NaiveDate>,
    pub date_sold: NaiveDate,
    #[serde(default)]
    pub proceeds: Option<f64>,
    #[serde(default)]
    pub cost_basis: Option<f64>,
    pub realized_gain_loss: f64,
    #[serde(default)]
    pub term: Term,
    #[serde(default)]
    pub wash_sale_disallowed: Option<f64>,
}

impl TryFrom<RealizedRecord> for RealizedGainLossRow {
    type Error = PortfolioError;

    fn try_from(record: RealizedRecord) -> Result<Self> {
        let mut row = RealizedGainLossRow::new(
            &record.symbol,
            record.quantity,
            record.date_sold,
            record.realized_gain_loss,
            record.term,
        )?;
        row.date_acquired = record.date_acquired;
        row.proceeds = record.proceeds;
        row.cost_basis = record.cost_basis;
        row.wash_sale_disallowed = record.wash_sale_disallowed;
        Ok(row)
    }
}

impl RealizedGainLossRow {
    pub fn new(
        symbol: &str,
        quantity: f64,
        date_sold: NaiveDate,
        realized_gain_loss: f64,
        term: Term,
    ) -> Result<Self> {
        if !realized_gain_loss.is_finite() {
            return Err(PortfolioError::InvalidData(format!(
                "realized gain/loss for {symbol} is not a number"
            )));
        }
        Ok(Self {
            symbol: require_symbol(symbol)?,
            quantity: require_positive("quantity", quantity)?,
            date_acquired: None,
            date_sold,
            proceeds: None,
            cost_basis: None,
            realized_gain_loss,
            term,
            wash_sale_disallowed: None,
        })
    }

    pub fn with_wash_sale_disallowed(mut self, amount: f64) -> Self {
        self.wash_sale_disallowed = Some(amount);
        self
    }
}
