//! Tax-loss harvesting run from a portfolio snapshot to an order checklist.

use std::collections::HashMap;

use chrono::NaiveDate;
use portfolio_core::{Holding, Lot, RealizedGainLossRow, Trade};
use serde::{Deserialize, Serialize};
use tax_optimizer::{
    build_replacement_basket, compute_loss_target, infer_sector, price_lookup, summarize_realized,
    value_lots, HarvestSummary, HarvestingConfig, HarvestingEngine, RealizedSummary, TlhCandidate,
    WashSaleMonitor,
};
use tracing::info;

use crate::models::Proposal;
use crate::proposals::build_proposal;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestPlan {
    pub realized_summary: RealizedSummary,
    /// Loss dollars needed to offset positive realized gains; zero when
    /// harvesting opportunistically
    pub loss_target: f64,
    pub candidates: Vec<TlhCandidate>,
    pub summary: HarvestSummary,
    pub proposal: Proposal,
}

/// Select harvest candidates and propose replacement buys for all of them.
/// `realized` of `None` means no realized report was supplied.
pub fn plan_harvest(
    holdings: &[Holding],
    lots: &[Lot],
    trades: &[Trade],
    realized: Option<&[RealizedGainLossRow]>,
    sector_map: &HashMap<String, String>,
    config: HarvestingConfig,
    as_of: NaiveDate,
) -> HarvestPlan {
    let realized_summary = summarize_realized(realized.unwrap_or_default());
    let goal = config.goal;
    let loss_target = compute_loss_target(&realized_summary, goal);

    let prices = price_lookup(holdings);
    let valued = value_lots(lots, &prices);
    let monitor = WashSaleMonitor::new(trades);
    let engine = HarvestingEngine::with_config(config);
    let candidates =
        engine.identify_candidates(&valued, &monitor, &realized_summary, loss_target, as_of);

    let mut replacements = HashMap::new();
    for candidate in &candidates {
        let sector = infer_sector(&candidate.symbol, sector_map);
        replacements.insert(
            candidate.symbol.clone(),
            build_replacement_basket(&candidate.symbol, sector, candidate.current_value),
        );
    }

    let proposal = build_proposal(&candidates, &replacements);
    let summary = engine.get_summary(&candidates);
    info!(
        goal = %goal,
        loss_target,
        candidates = summary.total_candidates,
        harvestable = summary.total_harvestable_loss,
        "Harvest plan built"
    );

    HarvestPlan {
        realized_summary,
        loss_target,
        candidates,
        summary,
        proposal,
    }
}
