//! Raising cash for a withdrawal.

use portfolio_core::money::format_currency;
use portfolio_core::{Holding, Lot};
use tax_optimizer::{
    build_sell_candidates, price_lookup, LiquidationConfig, LiquidationEngine, RealizedSummary,
};
use tracing::{debug, info};

use crate::analytics::{compute_symbol_weights, estimate_available_cash};
use crate::drift::compute_drift_notes;
use crate::models::{WithdrawalProposal, WithdrawalRequest};

pub const COVERED_BY_CASH_WARNING: &str =
    "Requested withdrawal covered by existing cash / sweep balances.";
pub const TARGET_UNREACHABLE_WARNING: &str =
    "Unable to reach requested cash target given current exclusions and data.";

/// Plan lot sales covering a withdrawal plus its cushion, net of cash on
/// hand. Sweep and money-market balances always count as cash.
pub fn build_withdrawal_proposal(
    holdings: &[Holding],
    lots: &[Lot],
    realized: Option<&RealizedSummary>,
    request: &WithdrawalRequest,
) -> WithdrawalProposal {
    let summary = realized.cloned().unwrap_or_default();
    let cash_available = estimate_available_cash(holdings, request.manual_cash, true);
    let buffer_amount = (request.withdrawal_amount * request.cushion_pct).max(0.0);
    let target = (request.withdrawal_amount + buffer_amount - cash_available).max(0.0);

    debug!(
        requested = request.withdrawal_amount,
        buffer = buffer_amount,
        cash = cash_available,
        target,
        "Planning withdrawal"
    );

    let prices = price_lookup(holdings);
    let (candidates, mut warnings) = build_sell_candidates(
        lots,
        &prices,
        &request.exclude_symbols,
        request.exclude_missing_dates,
    );

    let engine = LiquidationEngine::with_config(LiquidationConfig {
        goal: request.goal,
        rates: request.rates,
        policy: request.policy,
    });
    let selection = engine.select_sells(
        &candidates,
        target,
        &summary,
        &compute_symbol_weights(holdings),
    );
    warnings.extend(selection.warnings.iter().cloned());
    let totals = selection.totals();

    let drift_metrics = compute_drift_notes(holdings, &selection.sells, target);

    if target <= 0.0 {
        warnings.push(COVERED_BY_CASH_WARNING.to_string());
    }
    if !selection.target_met() {
        warnings.push(TARGET_UNREACHABLE_WARNING.to_string());
    }

    let notes = vec![format!(
        "Liquidation goal: {}; selling {} lots to raise {}.",
        request.goal,
        selection.sells.len(),
        format_currency(totals.proceeds)
    )];

    info!(
        sells = selection.sells.len(),
        proceeds = totals.proceeds,
        tax = totals.total_tax(),
        "Withdrawal proposal built"
    );

    WithdrawalProposal {
        requested_amount: request.withdrawal_amount,
        buffer_amount,
        cash_available,
        amount_needed_from_sales: target,
        total_expected_proceeds: totals.proceeds,
        estimated_realized_st: totals.st_realized,
        estimated_realized_lt: totals.lt_realized,
        estimated_tax_cost: totals.total_tax(),
        sells: selection.sells,
        warnings,
        notes,
        drift_metrics,
    }
}
