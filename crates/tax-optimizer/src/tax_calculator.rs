//! Tax Calculator
//!
//! Flat-rate tax estimates for a single sale, plus the year-to-date offset
//! pool that realized losses draw down during one selection pass.

use portfolio_core::Term;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SHORT_TERM_RATE: f64 = 0.32;
pub const DEFAULT_LONG_TERM_RATE: f64 = 0.15;
pub const DEFAULT_STATE_RATE: f64 = 0.05;

/// Marginal rates applied to realized gains. State tax is additive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxRates {
    /// Ordinary-income rate for short-term gains
    pub short_term: f64,
    /// Preferential rate for long-term gains
    pub long_term: f64,
    /// State rate, added to either federal rate
    pub state: f64,
}

impl Default for TaxRates {
    fn default() -> Self {
        Self {
            short_term: DEFAULT_SHORT_TERM_RATE,
            long_term: DEFAULT_LONG_TERM_RATE,
            state: DEFAULT_STATE_RATE,
        }
    }
}

impl TaxRates {
    /// Combined rate for a gain of the given term. Unknown terms pay the
    /// short-term rate.
    pub fn gain_rate(&self, term: Term) -> f64 {
        match term {
            Term::Long => self.long_term + self.state,
            Term::Short | Term::Unknown => self.short_term + self.state,
        }
    }

    /// Combined rate at which a loss of the given term offsets gains. Unknown
    /// terms are netted against long-term gains.
    pub fn loss_rate(&self, term: Term) -> f64 {
        match term {
            Term::Short => self.short_term + self.state,
            Term::Long | Term::Unknown => self.long_term + self.state,
        }
    }

    /// Tax on a gain, or the undiscounted benefit of a loss (negative).
    pub fn flat_estimate(&self, gain_loss: f64, term: Term) -> f64 {
        if gain_loss >= 0.0 {
            gain_loss * self.gain_rate(term)
        } else {
            gain_loss * self.loss_rate(term)
        }
    }
}

/// Policy knobs with no basis in tax law; kept configurable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxPolicy {
    /// Present-value haircut on losses that must be carried forward
    pub loss_carry_discount: f64,
    /// Fraction of the loss target that ends harvesting early
    pub loss_target_tolerance: f64,
}

impl Default for TaxPolicy {
    fn default() -> Self {
        Self {
            loss_carry_discount: 0.5,
            loss_target_tolerance: 0.95,
        }
    }
}

/// Realized gains still available to absorb losses. Lives for exactly one
/// selection pass; never shared between calls.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OffsetPool {
    pub short_term: f64,
    pub long_term: f64,
}

impl OffsetPool {
    /// Seed from year-to-date realized totals. Net losses seed nothing.
    pub fn new(ytd_short_term: f64, ytd_long_term: f64) -> Self {
        Self {
            short_term: ytd_short_term.max(0.0),
            long_term: ytd_long_term.max(0.0),
        }
    }

    /// Draw down the pool matching `term` by up to `loss` and return the
    /// amount actually offset. Only short-term losses touch the short pool.
    pub fn consume(&mut self, term: Term, loss: f64) -> f64 {
        let pool = match term {
            Term::Short => &mut self.short_term,
            Term::Long | Term::Unknown => &mut self.long_term,
        };
        let offset = loss.max(0.0).min(*pool);
        *pool -= offset;
        offset
    }

    /// Estimated tax for a sale realizing `gain_loss`, consuming offsets for
    /// losses. Losses return a negative number (a benefit).
    pub fn estimate_sale(
        &mut self,
        gain_loss: f64,
        term: Term,
        rates: &TaxRates,
        policy: &TaxPolicy,
    ) -> f64 {
        if gain_loss >= 0.0 {
            return gain_loss * rates.gain_rate(term);
        }

        let loss = -gain_loss;
        let rate = rates.loss_rate(term);
        let offset = self.consume(term, loss);
        let carry = loss - offset;
        let benefit = offset * rate + carry * rate * policy.loss_carry_discount;
        -benefit
    }
}
