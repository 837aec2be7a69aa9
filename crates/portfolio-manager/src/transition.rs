//! Funding a strategy allocation: spend cash first, sell lots for the rest,
//! then buy the target basket.

use std::collections::HashMap;

use portfolio_core::money::format_currency;
use portfolio_core::{normalize_symbol, Holding, Lot};
use tax_optimizer::{
    build_sell_candidates, price_lookup, LiquidationConfig, LiquidationEngine, RealizedSummary,
    SellLotRecommendation,
};
use tracing::{debug, info, warn};

use crate::analytics::{compute_symbol_weights, estimate_available_cash};
use crate::drift::compute_drift_notes;
use crate::models::{BuyTargetRow, StrategyAllocationRequest, TransitionPlan};
use crate::strategy::{StrategySpec, TargetBasketRow};

pub const UNDERFUNDED_WARNING: &str = "Unable to fully fund strategy allocation with available lots.";

impl StrategyAllocationRequest {
    /// Explicit buffer amount, else the buffer percentage of the allocation,
    /// else nothing.
    pub fn buffer_amount(&self) -> f64 {
        match (self.cash_buffer_amount, self.cash_buffer_pct) {
            (Some(amount), _) => amount,
            (None, Some(pct)) => self.allocation_amount * pct,
            (None, None) => 0.0,
        }
    }
}

pub fn build_transition_plan(
    holdings: &[Holding],
    lots: &[Lot],
    basket: &[TargetBasketRow],
    spec: &StrategySpec,
    request: &StrategyAllocationRequest,
    realized: Option<&RealizedSummary>,
) -> TransitionPlan {
    let summary = realized.cloned().unwrap_or_default();
    let rates = request.tax_rates.unwrap_or_default();

    let buffer_amount = request.buffer_amount();
    let cash_available = estimate_available_cash(
        holdings,
        request.manual_cash_available,
        request.use_cash_equivalents_first,
    );
    let total_need = request.allocation_amount + buffer_amount;
    let cash_used = cash_available.min(total_need);
    let cash_needed = (total_need - cash_available).max(0.0);

    let mut exclude: Vec<String> = request.excluded_from_selling.clone();
    if request.use_cash_equivalents_first {
        exclude.extend(
            holdings
                .iter()
                .filter(|h| h.is_cash_equivalent)
                .map(|h| h.symbol.clone()),
        );
    }

    debug!(
        allocation = request.allocation_amount,
        buffer = buffer_amount,
        cash = cash_available,
        needed = cash_needed,
        "Planning transition"
    );

    let prices = price_lookup(holdings);
    let (candidates, mut warnings) =
        build_sell_candidates(lots, &prices, &exclude, request.exclude_missing_dates);

    let engine = LiquidationEngine::with_config(LiquidationConfig {
        goal: request.liquidation_goal,
        rates,
        policy: request.policy,
    });
    let selection = engine.select_sells(
        &candidates,
        cash_needed,
        &summary,
        &compute_symbol_weights(holdings),
    );
    warnings.extend(selection.warnings.iter().cloned());
    let totals = selection.totals();

    if !selection.target_met() {
        warn!(needed = cash_needed, raised = totals.proceeds, "Allocation underfunded");
        warnings.push(UNDERFUNDED_WARNING.to_string());
    }

    let (buys, buy_warnings) = build_buy_targets(basket, request.allocation_amount, &prices);
    warnings.extend(buy_warnings);

    let rationale_summary = build_rationale(
        spec,
        realized,
        request,
        &selection.sells,
        cash_used,
        totals.proceeds,
    );
    let drift_metrics = compute_drift_notes(holdings, &selection.sells, cash_needed);

    info!(
        sells = selection.sells.len(),
        buys = buys.len(),
        proceeds = totals.proceeds,
        "Transition plan built"
    );

    TransitionPlan {
        allocation_amount: request.allocation_amount,
        buffer_amount,
        cash_available,
        cash_used,
        cash_needed_from_sales: cash_needed,
        sells: selection.sells,
        estimated_tax: totals.into(),
        buys,
        warnings,
        drift_metrics,
        rationale_summary,
    }
}

/// Dollars per basket symbol, `allocation x normalized weight`, with a share
/// estimate wherever a price is known.
pub fn build_buy_targets(
    basket: &[TargetBasketRow],
    allocation_amount: f64,
    prices: &HashMap<String, f64>,
) -> (Vec<BuyTargetRow>, Vec<String>) {
    let mut warnings = Vec::new();
    if basket.is_empty() {
        warnings.push("Target basket is empty; no buys generated.".to_string());
        return (Vec::new(), warnings);
    }
    let total_weight: f64 = basket.iter().map(|r| r.weight).sum();
    if total_weight <= 0.0 {
        warnings.push("Target basket weights sum to zero.".to_string());
        return (Vec::new(), warnings);
    }

    let buys = basket
        .iter()
        .map(|row| {
            let symbol = normalize_symbol(&row.symbol);
            let weight = row.weight / total_weight;
            let target_dollars = allocation_amount * weight;
            let price = prices.get(&symbol).copied().filter(|p| *p > 0.0);
            if price.is_none() {
                warnings.push(format!("Missing price for {symbol}; share estimate skipped."));
            }
            BuyTargetRow {
                symbol,
                target_weight: weight,
                target_dollars,
                price,
                est_shares: price.map(|p| target_dollars / p),
            }
        })
        .collect();
    (buys, warnings)
}

fn build_rationale(
    spec: &StrategySpec,
    realized: Option<&RealizedSummary>,
    request: &StrategyAllocationRequest,
    sells: &[SellLotRecommendation],
    cash_used: f64,
    proceeds: f64,
) -> Vec<String> {
    let mut notes = Vec::new();
    if request.tax_rates.is_some() {
        notes.push("Applied custom tax rates for estimating sale impact.".to_string());
    } else {
        notes.push("Used default tax rate assumptions for MinTax ordering.".to_string());
    }

    let has_realized =
        realized.is_some_and(|s| s.ytd_realized_st != 0.0 || s.ytd_realized_lt != 0.0);
    if has_realized {
        notes.push(
            "Realized gains context provided; losses prioritized to offset ST gains first."
                .to_string(),
        );
    } else {
        notes.push("No realized gains file uploaded; assuming $0 realized gains.".to_string());
    }

    notes.push(format!(
        "Used {} cash equivalents before selling {} lots to raise {}.",
        format_currency(cash_used),
        sells.len(),
        format_currency(proceeds)
    ));
    notes.push(format!(
        "Liquidation goal: {} for {} basket.",
        request.liquidation_goal, spec.index_name
    ));
    notes
}
