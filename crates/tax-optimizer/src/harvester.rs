//! Tax-Loss Harvesting Engine
//!
//! Picks losing lots worth realizing, notes the ones with wash-sale or
//! near-long-term caveats, and ranks them so losses land in the term where
//! gains were realized this year.

use std::cmp::Ordering;

use chrono::NaiveDate;
use portfolio_core::{Term, LONG_TERM_DAYS};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tax_calculator::TaxPolicy;
use crate::tax_context::{determine_priority_term, HarvestGoal, RealizedSummary};
use crate::valuation::ValuedLot;
use crate::wash_sale::WashSaleMonitor;

pub const DEFAULT_LOSS_THRESHOLD: f64 = 500.0;
pub const DEFAULT_LOSS_PCT_THRESHOLD: f64 = 0.05;
pub const DEFAULT_MAX_CANDIDATES: usize = 10;

/// Short-term lots this close to the long-term boundary get a hold note.
pub const NEAR_LONG_TERM_DAYS: i64 = 14;

pub const NEAR_LONG_TERM_NOTE: &str = "Lot is within 14 days of long-term status; consider holding";
pub const WASH_SALE_NOTE: &str = "Recent buy detected; wash-sale risk";

/// A lot flagged as harvestable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TlhCandidate {
    pub symbol: String,
    pub lot_id: String,
    pub qty: f64,
    pub basis_total: f64,
    pub current_value: f64,
    /// Signed; negative is a loss
    pub unrealized_pl: f64,
    pub pl_pct: f64,
    pub term: Term,
    pub acquired_date: Option<NaiveDate>,
    /// Whether a recent buy puts the loss at risk
    pub wash_sale_risk: bool,
    pub notes: Vec<String>,
}

impl TlhCandidate {
    pub fn price(&self) -> f64 {
        if self.qty > 0.0 {
            self.current_value / self.qty
        } else {
            0.0
        }
    }

    pub fn loss(&self) -> f64 {
        -self.unrealized_pl.min(0.0)
    }
}

/// Harvesting engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestingConfig {
    /// Minimum dollar loss, compared as a magnitude
    pub loss_threshold: f64,
    /// Minimum loss as a fraction of basis, compared as a magnitude
    pub loss_pct_threshold: f64,
    /// Maximum number of candidates to return
    pub max_candidates: usize,
    pub goal: HarvestGoal,
    pub policy: TaxPolicy,
}

impl Default for HarvestingConfig {
    fn default() -> Self {
        Self {
            loss_threshold: DEFAULT_LOSS_THRESHOLD,
            loss_pct_threshold: DEFAULT_LOSS_PCT_THRESHOLD,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            goal: HarvestGoal::OffsetGains,
            policy: TaxPolicy::default(),
        }
    }
}

/// Engine for finding tax-loss harvesting candidates
#[derive(Debug, Clone, Default)]
pub struct HarvestingEngine {
    config: HarvestingConfig,
}

impl HarvestingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom configuration
    pub fn with_config(config: HarvestingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HarvestingConfig {
        &self.config
    }

    fn clears_thresholds(&self, valued: &ValuedLot<'_>) -> bool {
        valued.unrealized_pl < -self.config.loss_threshold.abs()
            && valued.pl_pct < -self.config.loss_pct_threshold.abs()
    }

    /// Rank harvestable lots. With an offset-gains goal and a positive
    /// `loss_target`, the list ends at the candidate whose cumulative loss
    /// first reaches the tolerated share of the target.
    pub fn identify_candidates(
        &self,
        valued_lots: &[ValuedLot<'_>],
        monitor: &WashSaleMonitor<'_>,
        summary: &RealizedSummary,
        loss_target: f64,
        as_of: NaiveDate,
    ) -> Vec<TlhCandidate> {
        let mut candidates: Vec<TlhCandidate> = valued_lots
            .iter()
            .filter(|v| self.clears_thresholds(v))
            .map(|v| self.annotate(v, monitor, as_of))
            .collect();

        let priority = determine_priority_term(summary).unwrap_or(Term::Short);
        candidates.sort_by(|a, b| {
            let a_key = (u8::from(a.term != priority), u8::from(!a.term.is_short()));
            let b_key = (u8::from(b.term != priority), u8::from(!b.term.is_short()));
            a_key
                .cmp(&b_key)
                .then_with(|| a.unrealized_pl.total_cmp(&b.unrealized_pl))
        });

        let stop_at = match self.config.goal {
            HarvestGoal::OffsetGains if loss_target > 0.0 => {
                Some(loss_target * self.config.policy.loss_target_tolerance)
            }
            _ => None,
        };

        let mut selected = Vec::new();
        let mut cumulative_loss = 0.0;
        for candidate in candidates {
            if selected.len() >= self.config.max_candidates {
                break;
            }
            cumulative_loss += -candidate.unrealized_pl;
            selected.push(candidate);
            if stop_at.is_some_and(|stop| cumulative_loss >= stop) {
                break;
            }
        }

        debug!(
            valued = valued_lots.len(),
            selected = selected.len(),
            loss_target,
            "Identified harvest candidates"
        );
        selected
    }

    fn annotate(
        &self,
        valued: &ValuedLot<'_>,
        monitor: &WashSaleMonitor<'_>,
        as_of: NaiveDate,
    ) -> TlhCandidate {
        let lot = valued.lot;
        let mut notes = Vec::new();

        let near_long_term = lot.term.is_short()
            && lot
                .days_held(as_of)
                .is_some_and(|days| days >= LONG_TERM_DAYS - NEAR_LONG_TERM_DAYS);
        if near_long_term {
            notes.push(NEAR_LONG_TERM_NOTE.to_string());
        }

        let wash_sale_risk = monitor.recent_buy(&lot.symbol, as_of);
        if wash_sale_risk {
            notes.push(WASH_SALE_NOTE.to_string());
        }

        TlhCandidate {
            symbol: lot.symbol.clone(),
            lot_id: lot.lot_id.clone(),
            qty: lot.qty,
            basis_total: lot.basis_total,
            current_value: valued.current_value,
            unrealized_pl: valued.unrealized_pl,
            pl_pct: valued.pl_pct,
            term: lot.term,
            acquired_date: lot.acquired_date,
            wash_sale_risk,
            notes,
        }
    }

    /// Get summary statistics
    pub fn get_summary(&self, candidates: &[TlhCandidate]) -> HarvestSummary {
        let short_term = candidates.iter().filter(|c| c.term.is_short()).count();
        let long_term = candidates.iter().filter(|c| c.term.is_long()).count();

        HarvestSummary {
            total_candidates: candidates.len(),
            total_harvestable_loss: candidates.iter().map(TlhCandidate::loss).sum(),
            short_term_candidates: short_term,
            long_term_candidates: long_term,
            wash_sale_flagged: candidates.iter().filter(|c| c.wash_sale_risk).count(),
            largest_loss: candidates
                .iter()
                .map(TlhCandidate::loss)
                .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
                .unwrap_or(0.0),
        }
    }
}

/// Summary of harvesting candidates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarvestSummary {
    pub total_candidates: usize,
    pub total_harvestable_loss: f64,
    pub short_term_candidates: usize,
    pub long_term_candidates: usize,
    pub wash_sale_flagged: usize,
    pub largest_loss: f64,
}
