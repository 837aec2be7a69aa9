//! Sell-Lot Selection
//!
//! Raises a dollar target from a pool of lots while keeping the tax bill
//! low. Lots are split into four fixed buckets by gain sign and term and the
//! buckets are drained in a fixed order: short-term losses, long-term losses,
//! long-term gains, then short-term gains. Within a bucket the liquidation
//! goal decides the order. The last lot taken may be sold partially.
//!
//! Losses draw down an [`OffsetPool`] seeded from year-to-date realized
//! gains; the pool lives for one [`LiquidationEngine::select_sells`] call.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use portfolio_core::{normalize_symbol, Lot, Term};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::tax_calculator::{OffsetPool, TaxPolicy, TaxRates};
use crate::tax_context::RealizedSummary;

pub const TARGET_NOT_MET_WARNING: &str = "Reached end of candidates before hitting target.";

/// Gain/loss x term classification of a sell candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotBucket {
    LossShort,
    LossLong,
    GainLong,
    GainShort,
}

impl LotBucket {
    /// Drain order, independent of the liquidation goal.
    pub const TRAVERSAL: [LotBucket; 4] = [
        LotBucket::LossShort,
        LotBucket::LossLong,
        LotBucket::GainLong,
        LotBucket::GainShort,
    ];

    /// Unknown-term losses bucket with long losses, unknown-term gains with
    /// short gains.
    pub fn classify(gain: f64, term: Term) -> Self {
        if gain < 0.0 {
            match term {
                Term::Short => LotBucket::LossShort,
                Term::Long | Term::Unknown => LotBucket::LossLong,
            }
        } else {
            match term {
                Term::Long => LotBucket::GainLong,
                Term::Short | Term::Unknown => LotBucket::GainShort,
            }
        }
    }

    pub fn is_loss(&self) -> bool {
        match self {
            LotBucket::LossShort | LotBucket::LossLong => true,
            LotBucket::GainLong | LotBucket::GainShort => false,
        }
    }

    pub fn rationale(&self) -> &'static str {
        match self {
            LotBucket::LossShort | LotBucket::LossLong => "Loss lot offsets realized gains",
            LotBucket::GainLong => "Long-term gain lot (lower rate)",
            LotBucket::GainShort => "Short-term gain lot (last resort)",
        }
    }
}

impl std::fmt::Display for LotBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LotBucket::LossShort => write!(f, "loss_short"),
            LotBucket::LossLong => write!(f, "loss_long"),
            LotBucket::GainLong => write!(f, "gain_long"),
            LotBucket::GainShort => write!(f, "gain_short"),
        }
    }
}

/// How lots are ordered inside each bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidationGoal {
    /// Biggest losses first, then smallest gain per dollar raised
    #[default]
    MinTax,
    /// Even blend of gain ratio and drift penalty
    Balanced,
    /// Sale share closest to the symbol's portfolio weight
    MinDrift,
}

impl std::fmt::Display for LiquidationGoal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LiquidationGoal::MinTax => write!(f, "min_tax"),
            LiquidationGoal::Balanced => write!(f, "balanced"),
            LiquidationGoal::MinDrift => write!(f, "min_drift"),
        }
    }
}

/// A lot priced for sale in full.
#[derive(Debug, Clone, PartialEq)]
pub struct SellCandidate<'a> {
    pub lot: &'a Lot,
    pub price: f64,
    /// Proceeds of selling the whole lot
    pub proceeds: f64,
    /// Gain of selling the whole lot; negative is a loss
    pub gain: f64,
}

impl<'a> SellCandidate<'a> {
    pub fn new(lot: &'a Lot, price: f64) -> Self {
        let proceeds = price * lot.qty;
        Self {
            lot,
            price,
            proceeds,
            gain: proceeds - lot.basis_total,
        }
    }

    pub fn bucket(&self) -> LotBucket {
        LotBucket::classify(self.gain, self.lot.term)
    }

    fn gain_ratio(&self) -> f64 {
        let proceeds = if self.proceeds == 0.0 { 1e-8 } else { self.proceeds };
        self.gain / proceeds
    }

    fn baseline_gain_key(&self) -> (f64, f64) {
        let proceeds = if self.proceeds == 0.0 { 1.0 } else { self.proceeds };
        (self.gain / proceeds, self.gain)
    }

    fn drift_penalty(&self, weights: &HashMap<String, f64>, target: f64) -> f64 {
        let weight = weights.get(&self.lot.symbol).copied().unwrap_or(0.0);
        if target <= 0.0 {
            return weight.abs();
        }
        (self.proceeds / target - weight).abs()
    }
}

/// Price every sellable lot. Excluded symbols are skipped silently; lots
/// with no date (when excluded) or no price are skipped with a warning.
pub fn build_sell_candidates<'a>(
    lots: &'a [Lot],
    prices: &HashMap<String, f64>,
    exclude_symbols: &[String],
    exclude_missing_dates: bool,
) -> (Vec<SellCandidate<'a>>, Vec<String>) {
    let excluded: HashSet<String> = exclude_symbols.iter().map(|s| normalize_symbol(s)).collect();
    let mut candidates = Vec::new();
    let mut warnings = Vec::new();

    for lot in lots {
        if excluded.contains(&lot.symbol) {
            continue;
        }
        if exclude_missing_dates && lot.acquired_date.is_none() {
            warnings.push(format!("Excluded lot {}: missing acquired date", lot.lot_id));
            continue;
        }
        match prices.get(&lot.symbol).copied() {
            Some(price) if price > 0.0 => candidates.push(SellCandidate::new(lot, price)),
            _ => warnings.push(format!(
                "Skipping lot {} for {}: missing current price",
                lot.lot_id, lot.symbol
            )),
        }
    }

    (candidates, warnings)
}

/// Partition candidates into the four buckets, in traversal order.
pub fn bucket_candidates<'c, 'a>(
    candidates: &'c [SellCandidate<'a>],
) -> Vec<(LotBucket, Vec<&'c SellCandidate<'a>>)> {
    LotBucket::TRAVERSAL
        .iter()
        .map(|bucket| {
            let members = candidates.iter().filter(|c| c.bucket() == *bucket).collect();
            (*bucket, members)
        })
        .collect()
}

/// One planned sale, possibly of part of a lot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellLotRecommendation {
    pub symbol: String,
    pub lot_id: String,
    pub acquired_date: Option<NaiveDate>,
    /// Never more than the lot's quantity
    pub qty: f64,
    pub price: f64,
    pub proceeds: f64,
    /// Lot basis prorated by quantity sold
    pub basis: f64,
    pub gain_loss: f64,
    pub term: Term,
    /// Negative is a tax benefit
    pub estimated_tax: f64,
    pub rationale: Vec<String>,
}

/// Realized gain and tax of a set of sells, split by term.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SellTotals {
    pub proceeds: f64,
    pub st_realized: f64,
    pub lt_realized: f64,
    pub unknown_realized: f64,
    pub st_tax: f64,
    pub lt_tax: f64,
    pub unknown_tax: f64,
}

impl SellTotals {
    pub fn from_sells(sells: &[SellLotRecommendation]) -> Self {
        sells.iter().fold(Self::default(), |mut totals, sell| {
            totals.proceeds += sell.proceeds;
            match sell.term {
                Term::Short => {
                    totals.st_realized += sell.gain_loss;
                    totals.st_tax += sell.estimated_tax;
                }
                Term::Long => {
                    totals.lt_realized += sell.gain_loss;
                    totals.lt_tax += sell.estimated_tax;
                }
                Term::Unknown => {
                    totals.unknown_realized += sell.gain_loss;
                    totals.unknown_tax += sell.estimated_tax;
                }
            }
            totals
        })
    }

    pub fn total_tax(&self) -> f64 {
        self.st_tax + self.lt_tax + self.unknown_tax
    }
}

/// Result of one selection pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SellSelection {
    pub sells: Vec<SellLotRecommendation>,
    pub warnings: Vec<String>,
    /// Offsets left after every loss was applied
    pub remaining_offsets: OffsetPool,
    /// Dollars still unraised when the pool ran dry; zero once the target is met
    pub shortfall: f64,
}

impl SellSelection {
    pub fn totals(&self) -> SellTotals {
        SellTotals::from_sells(&self.sells)
    }

    pub fn target_met(&self) -> bool {
        self.shortfall <= 0.0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LiquidationConfig {
    pub goal: LiquidationGoal,
    pub rates: TaxRates,
    pub policy: TaxPolicy,
}

/// Greedy tax-aware lot picker.
#[derive(Debug, Clone, Default)]
pub struct LiquidationEngine {
    config: LiquidationConfig,
}

impl LiquidationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: LiquidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LiquidationConfig {
        &self.config
    }

    fn order_bucket(
        &self,
        bucket: LotBucket,
        entries: &mut [&SellCandidate<'_>],
        weights: &HashMap<String, f64>,
        target: f64,
    ) {
        if bucket.is_loss() {
            entries.sort_by(|a, b| a.gain.total_cmp(&b.gain));
        } else {
            entries.sort_by(|a, b| {
                let (a_ratio, a_gain) = a.baseline_gain_key();
                let (b_ratio, b_gain) = b.baseline_gain_key();
                a_ratio.total_cmp(&b_ratio).then_with(|| a_gain.total_cmp(&b_gain))
            });
        }

        match self.config.goal {
            LiquidationGoal::MinTax => {}
            LiquidationGoal::MinDrift => entries.sort_by(|a, b| {
                a.drift_penalty(weights, target)
                    .total_cmp(&b.drift_penalty(weights, target))
            }),
            LiquidationGoal::Balanced => {
                let score = |c: &SellCandidate<'_>| {
                    0.5 * c.gain_ratio() + 0.5 * c.drift_penalty(weights, target)
                };
                entries.sort_by(|a, b| score(*a).total_cmp(&score(*b)));
            }
        }
    }

    /// Pick lots until `target` dollars are raised or the pool runs dry.
    /// A non-positive target selects nothing and warns about nothing.
    pub fn select_sells(
        &self,
        candidates: &[SellCandidate<'_>],
        target: f64,
        summary: &RealizedSummary,
        weights: &HashMap<String, f64>,
    ) -> SellSelection {
        let mut offsets = OffsetPool::new(summary.ytd_realized_st, summary.ytd_realized_lt);
        if target <= 0.0 {
            return SellSelection {
                remaining_offsets: offsets,
                ..Default::default()
            };
        }

        debug!(
            target,
            candidates = candidates.len(),
            goal = %self.config.goal,
            "Selecting lots to sell"
        );

        let rates = &self.config.rates;
        let policy = &self.config.policy;
        let mut sells = Vec::new();
        let mut remaining = target;

        'traversal: for (bucket, mut entries) in bucket_candidates(candidates) {
            self.order_bucket(bucket, &mut entries, weights, target);

            for candidate in entries {
                if remaining <= 0.0 {
                    break 'traversal;
                }
                let lot = candidate.lot;
                let partial = candidate.proceeds >= remaining && candidate.price > 0.0;
                let (qty, proceeds) = if partial {
                    let qty = (remaining / candidate.price).min(lot.qty);
                    (qty, qty * candidate.price)
                } else {
                    (lot.qty, candidate.proceeds)
                };
                let basis = lot.basis_total * (qty / lot.qty);
                let gain_loss = proceeds - basis;
                let estimated_tax = offsets.estimate_sale(gain_loss, lot.term, rates, policy);

                let mut rationale = vec![bucket.rationale().to_string()];
                if partial && qty < lot.qty {
                    rationale.push(format!("Partial lot: {:.4} of {:.4} shares", qty, lot.qty));
                }

                sells.push(SellLotRecommendation {
                    symbol: lot.symbol.clone(),
                    lot_id: lot.lot_id.clone(),
                    acquired_date: lot.acquired_date,
                    qty,
                    price: candidate.price,
                    proceeds,
                    basis,
                    gain_loss,
                    term: lot.term,
                    estimated_tax,
                    rationale,
                });

                // A partial sale covers the remainder exactly.
                remaining = if partial { 0.0 } else { remaining - proceeds };
            }
        }

        let mut warnings = Vec::new();
        if remaining > 0.0 {
            warn!(target, shortfall = remaining, "Sell candidates exhausted before target");
            warnings.push(TARGET_NOT_MET_WARNING.to_string());
        }

        SellSelection {
            sells,
            warnings,
            remaining_offsets: offsets,
            shortfall: remaining.max(0.0),
        }
    }
}
