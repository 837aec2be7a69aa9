//! Ongoing management of a strategy sleeve: drift against the target basket,
//! tax-loss harvesting inside the sleeve, and turnover-capped rebalancing.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use portfolio_core::money::{format_currency, format_pct};
use portfolio_core::{normalize_symbol, Holding, Lot, Trade};
use tax_optimizer::{
    build_replacement_basket, build_sell_candidates, price_lookup, value_lots, HarvestingConfig,
    HarvestingEngine, LiquidationConfig, LiquidationEngine, RealizedSummary,
    SellLotRecommendation, WashSaleMonitor,
};
use tracing::{debug, info, warn};

use crate::analytics::compute_symbol_weights;
use crate::models::{
    BuyTargetRow, DriftEntry, DriftSummary, ManageActionSettings, StrategyManagePlan,
};
use crate::strategy::TargetBasketRow;

/// Loss thresholds for harvesting inside a managed sleeve.
pub const SLEEVE_TLH_LOSS_THRESHOLD: f64 = 100.0;
pub const SLEEVE_TLH_LOSS_PCT_THRESHOLD: f64 = 0.02;

const DRIFT_REPORT_LIMIT: usize = 10;
const PROCEEDS_EPSILON: f64 = 1e-6;

pub const TURNOVER_CAP_WARNING: &str = "Turnover cap prevents rebalancing trades.";
pub const EXCESS_PROCEEDS_WARNING: &str =
    "Rebalance proceeds exceed underweight needs; remaining cash implied.";

/// Holdings inside the sleeve, valued per basket symbol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SleeveSnapshot {
    pub sleeve_value: f64,
    pub values: HashMap<String, f64>,
    pub weights: HashMap<String, f64>,
}

/// Dollar gaps, in report order.
pub type DollarGaps = Vec<(String, f64)>;

pub struct SleeveManager;

impl SleeveManager {
    /// Value basket symbols held, ignoring cash equivalents and anything
    /// outside the basket.
    pub fn snapshot(holdings: &[Holding], basket: &[TargetBasketRow]) -> SleeveSnapshot {
        if basket.is_empty() {
            return SleeveSnapshot::default();
        }
        let members: HashSet<String> = basket.iter().map(|r| normalize_symbol(&r.symbol)).collect();

        let mut values: HashMap<String, f64> = HashMap::new();
        for holding in holdings {
            if holding.is_cash_equivalent || !members.contains(&holding.symbol) {
                continue;
            }
            *values.entry(holding.symbol.clone()).or_insert(0.0) += holding.market_value();
        }

        let sleeve_value: f64 = values.values().sum();
        let weights = if sleeve_value > 0.0 {
            values
                .iter()
                .map(|(symbol, value)| (symbol.clone(), value / sleeve_value))
                .collect()
        } else {
            HashMap::new()
        };

        SleeveSnapshot {
            sleeve_value,
            values,
            weights,
        }
    }

    pub fn drift_summary(basket: &[TargetBasketRow], snapshot: &SleeveSnapshot) -> DriftSummary {
        let entries: Vec<DriftEntry> = basket
            .iter()
            .map(|row| {
                let symbol = normalize_symbol(&row.symbol);
                let actual = snapshot.weights.get(&symbol).copied().unwrap_or(0.0);
                DriftEntry {
                    drift: actual - row.weight,
                    symbol,
                    target_weight: row.weight,
                    actual_weight: actual,
                    sector: row.sector.clone(),
                }
            })
            .collect();

        let mut overweights: Vec<DriftEntry> =
            entries.iter().filter(|e| e.drift > 0.0).cloned().collect();
        overweights.sort_by(|a, b| b.drift.total_cmp(&a.drift));
        overweights.truncate(DRIFT_REPORT_LIMIT);

        let mut underweights: Vec<DriftEntry> =
            entries.iter().filter(|e| e.drift < 0.0).cloned().collect();
        underweights.sort_by(|a, b| a.drift.total_cmp(&b.drift));
        underweights.truncate(DRIFT_REPORT_LIMIT);

        DriftSummary {
            sleeve_value: snapshot.sleeve_value,
            max_abs_drift: entries.iter().map(|e| e.drift.abs()).fold(0.0, f64::max),
            total_abs_drift: entries.iter().map(|e| e.drift.abs()).sum(),
            overweights,
            underweights,
            sector_drift: sector_drift(&entries),
        }
    }

    /// Dollars needed per underweight symbol, most underweight first.
    pub fn underweight_dollars(summary: &DriftSummary) -> DollarGaps {
        summary
            .underweights
            .iter()
            .filter(|e| e.drift < 0.0)
            .map(|e| (e.symbol.clone(), -e.drift * summary.sleeve_value))
            .collect()
    }

    /// Dollars above target per symbol drifting past `tolerance`.
    pub fn overweight_dollars(summary: &DriftSummary, tolerance: f64) -> DollarGaps {
        summary
            .overweights
            .iter()
            .filter(|e| e.drift > tolerance)
            .map(|e| (e.symbol.clone(), e.drift * summary.sleeve_value))
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn build_plan(
        holdings: &[Holding],
        lots: &[Lot],
        trades: &[Trade],
        basket: &[TargetBasketRow],
        settings: &ManageActionSettings,
        realized: Option<&RealizedSummary>,
        as_of: NaiveDate,
    ) -> StrategyManagePlan {
        let summary = realized.cloned().unwrap_or_default();
        let snapshot = Self::snapshot(holdings, basket);
        let drift_summary = Self::drift_summary(basket, &snapshot);
        let underweights = Self::underweight_dollars(&drift_summary);
        let overweights = Self::overweight_dollars(&drift_summary, settings.drift_tolerance_pct);

        debug!(
            mode = ?settings.mode,
            sleeve = snapshot.sleeve_value,
            overweights = overweights.len(),
            underweights = underweights.len(),
            "Planning sleeve management"
        );

        let mut plan = StrategyManagePlan {
            notes: vec![format!(
                "Sleeve value {}; max drift {}, total drift {}.",
                format_currency(drift_summary.sleeve_value),
                format_pct(drift_summary.max_abs_drift),
                format_pct(drift_summary.total_abs_drift)
            )],
            ..Default::default()
        };

        if settings.mode.includes_tlh() {
            let leg = Self::tlh_leg(
                holdings,
                lots,
                trades,
                basket,
                &summary,
                settings,
                underweights.clone(),
                as_of,
            );
            plan.tlh_sells = leg.sells;
            plan.warnings.extend(leg.warnings);
            merge_buys(&mut plan.buy_targets, leg.buys);
        }

        if settings.mode.includes_rebalance() {
            // Harvested lots are sold whole; the rebalance leg must not sell them again.
            let harvested: HashSet<&str> =
                plan.tlh_sells.iter().map(|s| s.lot_id.as_str()).collect();
            let remaining_lots: Vec<Lot> = lots
                .iter()
                .filter(|lot| !harvested.contains(lot.lot_id.as_str()))
                .cloned()
                .collect();
            let leg = Self::rebalance_leg(
                holdings,
                &remaining_lots,
                &summary,
                settings,
                &overweights,
                &underweights,
                snapshot.sleeve_value,
            );
            plan.rebalance_sells = leg.sells;
            plan.warnings.extend(leg.warnings);
            merge_buys(&mut plan.buy_targets, leg.buys);
        }

        plan.drift_summary = drift_summary;
        info!(
            tlh_sells = plan.tlh_sells.len(),
            rebalance_sells = plan.rebalance_sells.len(),
            buys = plan.buy_targets.len(),
            "Sleeve management plan built"
        );
        plan
    }

    #[allow(clippy::too_many_arguments)]
    fn tlh_leg(
        holdings: &[Holding],
        lots: &[Lot],
        trades: &[Trade],
        basket: &[TargetBasketRow],
        summary: &RealizedSummary,
        settings: &ManageActionSettings,
        mut underweights: DollarGaps,
        as_of: NaiveDate,
    ) -> Leg {
        let mut leg = Leg::default();
        let members: HashSet<String> = basket.iter().map(|r| normalize_symbol(&r.symbol)).collect();
        let sleeve_lots: Vec<Lot> = lots
            .iter()
            .filter(|lot| members.contains(&lot.symbol))
            .cloned()
            .collect();

        let prices = price_lookup(holdings);
        let valued = value_lots(&sleeve_lots, &prices);
        let engine = HarvestingEngine::with_config(HarvestingConfig {
            loss_threshold: SLEEVE_TLH_LOSS_THRESHOLD,
            loss_pct_threshold: SLEEVE_TLH_LOSS_PCT_THRESHOLD,
            max_candidates: settings.tlh_candidate_limit,
            goal: settings.harvest_goal,
            policy: settings.policy,
        });
        let candidates =
            engine.identify_candidates(&valued, &WashSaleMonitor::new(trades), summary, 0.0, as_of);
        if candidates.is_empty() {
            return leg;
        }

        let target_weights: HashMap<String, f64> = basket
            .iter()
            .map(|r| (normalize_symbol(&r.symbol), r.weight))
            .collect();

        for candidate in &candidates {
            let rationale = if candidate.notes.is_empty() {
                vec!["TLH candidate".to_string()]
            } else {
                candidate.notes.clone()
            };
            leg.sells.push(SellLotRecommendation {
                symbol: candidate.symbol.clone(),
                lot_id: candidate.lot_id.clone(),
                acquired_date: candidate.acquired_date,
                qty: candidate.qty,
                price: candidate.price(),
                proceeds: candidate.current_value,
                basis: candidate.basis_total,
                gain_loss: candidate.unrealized_pl,
                term: candidate.term,
                estimated_tax: settings
                    .rates
                    .flat_estimate(candidate.unrealized_pl, candidate.term),
                rationale,
            });

            let allocation = allocate_to_underweights(
                &candidate.symbol,
                candidate.current_value,
                &mut underweights,
            );
            if allocation.is_empty() {
                leg.warnings.push(format!(
                    "No underweight replacements available for {}; using ETF basket.",
                    candidate.symbol
                ));
                let fallback =
                    build_replacement_basket(&candidate.symbol, None, candidate.current_value);
                merge_buys(
                    &mut leg.buys,
                    fallback.into_iter().map(|proxy| BuyTargetRow {
                        symbol: proxy.symbol,
                        target_weight: 0.0,
                        target_dollars: proxy.market_value,
                        price: None,
                        est_shares: None,
                    }),
                );
                continue;
            }

            merge_buys(
                &mut leg.buys,
                allocation.into_iter().map(|(symbol, dollars)| {
                    let price = prices.get(&symbol).copied().filter(|p| *p > 0.0);
                    BuyTargetRow {
                        target_weight: target_weights.get(&symbol).copied().unwrap_or(0.0),
                        target_dollars: dollars,
                        price,
                        est_shares: price.map(|p| dollars / p),
                        symbol,
                    }
                }),
            );
        }
        leg
    }

    fn rebalance_leg(
        holdings: &[Holding],
        lots: &[Lot],
        summary: &RealizedSummary,
        settings: &ManageActionSettings,
        overweights: &[(String, f64)],
        underweights: &[(String, f64)],
        sleeve_value: f64,
    ) -> Leg {
        let mut leg = Leg::default();
        if overweights.is_empty() {
            return leg;
        }

        let turnover_cap = sleeve_value * settings.turnover_cap_pct;
        let sell_amount = overweights.iter().map(|(_, d)| d).sum::<f64>().min(turnover_cap);
        if sell_amount <= 0.0 {
            warn!(turnover_cap, "Turnover cap leaves nothing to rebalance");
            leg.warnings.push(TURNOVER_CAP_WARNING.to_string());
            return leg;
        }

        let over: HashSet<&str> = overweights.iter().map(|(s, _)| s.as_str()).collect();
        let over_lots: Vec<Lot> = lots
            .iter()
            .filter(|lot| over.contains(lot.symbol.as_str()))
            .cloned()
            .collect();
        let prices = price_lookup(holdings);
        let (candidates, candidate_warnings) = build_sell_candidates(&over_lots, &prices, &[], true);
        leg.warnings.extend(candidate_warnings);

        let engine = LiquidationEngine::with_config(LiquidationConfig {
            goal: settings.liquidation_goal,
            rates: settings.rates,
            policy: settings.policy,
        });
        let selection = engine.select_sells(
            &candidates,
            sell_amount,
            summary,
            &compute_symbol_weights(holdings),
        );
        leg.warnings.extend(selection.warnings.iter().cloned());
        let mut proceeds = selection.totals().proceeds;
        leg.sells = selection.sells;
        if proceeds <= 0.0 {
            return leg;
        }

        for (symbol, gap) in underweights {
            if *gap <= 0.0 {
                continue;
            }
            let dollars = gap.min(proceeds);
            if dollars <= 0.0 {
                continue;
            }
            proceeds -= dollars;
            let price = prices.get(symbol).copied().filter(|p| *p > 0.0);
            leg.buys.push(BuyTargetRow {
                symbol: symbol.clone(),
                target_weight: 0.0,
                target_dollars: dollars,
                price,
                est_shares: price.map(|p| dollars / p),
            });
            if proceeds <= 0.0 {
                break;
            }
        }
        if proceeds > PROCEEDS_EPSILON {
            leg.warnings.push(EXCESS_PROCEEDS_WARNING.to_string());
        }
        leg
    }
}

#[derive(Debug, Default)]
struct Leg {
    sells: Vec<SellLotRecommendation>,
    buys: Vec<BuyTargetRow>,
    warnings: Vec<String>,
}

/// Per-sector totals of the symbol entries, largest absolute drift first.
fn sector_drift(entries: &[DriftEntry]) -> Vec<DriftEntry> {
    let mut sectors: Vec<DriftEntry> = Vec::new();
    for entry in entries {
        let sector = entry.sector.clone().unwrap_or_else(|| "Unknown".to_string());
        match sectors.iter_mut().find(|s| s.symbol == sector) {
            Some(total) => {
                total.target_weight += entry.target_weight;
                total.actual_weight += entry.actual_weight;
            }
            None => sectors.push(DriftEntry {
                symbol: sector.clone(),
                target_weight: entry.target_weight,
                actual_weight: entry.actual_weight,
                drift: 0.0,
                sector: Some(sector),
            }),
        }
    }
    for sector in sectors.iter_mut() {
        sector.drift = sector.actual_weight - sector.target_weight;
    }
    sectors.sort_by(|a, b| b.drift.abs().total_cmp(&a.drift.abs()));
    sectors.truncate(DRIFT_REPORT_LIMIT);
    sectors
}

/// Hand `proceeds` to the largest remaining needs, skipping the sold
/// symbol. Needs are reduced in place.
fn allocate_to_underweights(
    sold_symbol: &str,
    mut proceeds: f64,
    underweights: &mut DollarGaps,
) -> Vec<(String, f64)> {
    let mut order: Vec<usize> = (0..underweights.len()).collect();
    order.sort_by(|a, b| underweights[*b].1.total_cmp(&underweights[*a].1));

    let mut allocation: Vec<(String, f64)> = Vec::new();
    for index in order {
        let (symbol, need) = &mut underweights[index];
        if symbol.as_str() == sold_symbol || *need <= 0.0 {
            continue;
        }
        let amount = proceeds.min(*need);
        if amount <= 0.0 {
            continue;
        }
        allocation.push((symbol.clone(), amount));
        *need -= amount;
        proceeds -= amount;
        if proceeds <= PROCEEDS_EPSILON {
            break;
        }
    }
    allocation
}

/// Fold buy rows into `targets`, one row per symbol.
fn merge_buys(targets: &mut Vec<BuyTargetRow>, rows: impl IntoIterator<Item = BuyTargetRow>) {
    for row in rows {
        match targets.iter_mut().find(|t| t.symbol == row.symbol) {
            Some(existing) => existing.merge(&row),
            None => targets.push(row),
        }
    }
}
