//! Year-to-date realized gains context.

use portfolio_core::{RealizedGainLossRow, Term};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const NO_REALIZED_WARNING: &str = "No realized transactions detected; assuming $0 realized gains.";

/// What tax-loss harvesting is trying to accomplish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HarvestGoal {
    /// Harvest until year-to-date gains are offset
    #[default]
    OffsetGains,
    /// Harvest whatever clears the thresholds
    Opportunistic,
}

impl std::fmt::Display for HarvestGoal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HarvestGoal::OffsetGains => write!(f, "offset_gains"),
            HarvestGoal::Opportunistic => write!(f, "opportunistic"),
        }
    }
}

/// Realized gain/loss totals for the period. A default instance means no
/// data was supplied, not that nothing was realized.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RealizedSummary {
    pub ytd_realized_st: f64,
    pub ytd_realized_lt: f64,
    pub ytd_realized_unknown: f64,
    pub ytd_realized_total: f64,
    pub ytd_wash_sale_disallowed_total: f64,
    pub rows_count: usize,
    pub warnings: Vec<String>,
}

impl RealizedSummary {
    /// Placeholder used when the caller has no realized report.
    pub fn empty() -> Self {
        summarize_realized(&[])
    }
}

pub fn summarize_realized(rows: &[RealizedGainLossRow]) -> RealizedSummary {
    let mut summary = RealizedSummary {
        rows_count: rows.len(),
        ..Default::default()
    };

    for row in rows {
        match row.term {
            Term::Short => summary.ytd_realized_st += row.realized_gain_loss,
            Term::Long => summary.ytd_realized_lt += row.realized_gain_loss,
            Term::Unknown => summary.ytd_realized_unknown += row.realized_gain_loss,
        }
        summary.ytd_wash_sale_disallowed_total += row.wash_sale_disallowed.unwrap_or(0.0);
    }
    summary.ytd_realized_total =
        summary.ytd_realized_st + summary.ytd_realized_lt + summary.ytd_realized_unknown;

    if rows.is_empty() {
        summary.warnings.push(NO_REALIZED_WARNING.to_string());
    }

    debug!(
        rows = summary.rows_count,
        st = summary.ytd_realized_st,
        lt = summary.ytd_realized_lt,
        "Summarized realized gains"
    );
    summary
}

/// Term whose realized gains losses should offset first.
pub fn determine_priority_term(summary: &RealizedSummary) -> Option<Term> {
    if summary.ytd_realized_st > 0.0 {
        Some(Term::Short)
    } else if summary.ytd_realized_lt > 0.0 {
        Some(Term::Long)
    } else {
        None
    }
}

/// Loss dollars needed to fully offset positive year-to-date gains. Zero
/// unless the goal is to offset gains.
pub fn compute_loss_target(summary: &RealizedSummary, goal: HarvestGoal) -> f64 {
    match goal {
        HarvestGoal::OffsetGains => {
            summary.ytd_realized_st.max(0.0)
                + summary.ytd_realized_lt.max(0.0)
                + summary.ytd_realized_unknown.max(0.0)
        }
        HarvestGoal::Opportunistic => 0.0,
    }
}
