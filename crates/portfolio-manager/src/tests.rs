//! End-to-end planner scenarios.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use portfolio_core::{Holding, Lot, Term};
use tax_optimizer::{HarvestingConfig, RealizedSummary};

use crate::harvest::plan_harvest;
use crate::models::{
    ManageActionSettings, ManageMode, StrategyAllocationRequest, WithdrawalRequest,
};
use crate::rebalancing::{SleeveManager, TURNOVER_CAP_WARNING};
use crate::strategy::{build_target_basket, IndexName, StrategySpec, TargetBasketRow};
use crate::transition::{build_transition_plan, UNDERFUNDED_WARNING};
use crate::withdrawals::{
    build_withdrawal_proposal, COVERED_BY_CASH_WARNING, TARGET_UNREACHABLE_WARNING,
};

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
}

fn lot(id: &str, symbol: &str, days_ago: i64, qty: f64, basis: f64) -> Lot {
    Lot::new(id, symbol, Some(as_of() - Duration::days(days_ago)), qty, basis, as_of()).unwrap()
}

fn realized_st(amount: f64) -> RealizedSummary {
    RealizedSummary {
        ytd_realized_st: amount,
        ytd_realized_total: amount,
        rows_count: 1,
        ..Default::default()
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn sp500(count: usize) -> StrategySpec {
    StrategySpec::new(IndexName::Sp500, count, 1.0).unwrap()
}

// Withdrawals

#[test]
fn test_withdrawal_sells_short_term_loss_first() {
    let holdings = vec![Holding::priced("AAA", 100.0, 10.0).unwrap()];
    let lots = vec![
        lot("AAA_ST_LOSS", "AAA", 30, 10.0, 150.0),
        lot("BBB_LT_GAIN", "BBB", 800, 5.0, 40.0),
    ];
    let request = WithdrawalRequest {
        withdrawal_amount: 500.0,
        cushion_pct: 0.0,
        ..Default::default()
    };

    let proposal =
        build_withdrawal_proposal(&holdings, &lots, Some(&realized_st(500.0)), &request);

    assert_eq!(proposal.sells[0].lot_id, "AAA_ST_LOSS");
    assert_eq!(proposal.sells[0].term, Term::Short);
    assert!(proposal.estimated_realized_st <= 0.0);
    assert!(close(proposal.estimated_realized_st, -50.0));
    // Fully offset against short-term gains at 32% + 5%
    assert!(close(proposal.estimated_tax_cost, -50.0 * 0.37));
    assert!(close(proposal.amount_needed_from_sales, 500.0));
    assert!(proposal
        .warnings
        .contains(&"Skipping lot BBB_LT_GAIN for BBB: missing current price".to_string()));
    assert!(proposal.warnings.contains(&TARGET_UNREACHABLE_WARNING.to_string()));
}

#[test]
fn test_withdrawal_fractional_price_reaches_target() {
    let holdings = vec![Holding::priced("AAA", 100.0, 4.4).unwrap()];
    let lots = vec![lot("AAA_LOSS", "AAA", 30, 100.0, 1000.0)];
    let request = WithdrawalRequest {
        withdrawal_amount: 10.1,
        cushion_pct: 0.0,
        ..Default::default()
    };

    let proposal = build_withdrawal_proposal(&holdings, &lots, None, &request);

    assert_eq!(proposal.sells.len(), 1);
    assert!(close(proposal.total_expected_proceeds, 10.1));
    assert!(proposal.warnings.is_empty());
}

#[test]
fn test_withdrawal_partial_lot_then_stop() {
    let holdings = vec![
        Holding::priced("AAA", 100.0, 10.0).unwrap(),
        Holding::priced("BBB", 50.0, 20.0).unwrap(),
    ];
    let lots = vec![
        lot("AAA_ST_LOSS", "AAA", 30, 10.0, 150.0),
        lot("BBB_LT_GAIN", "BBB", 800, 50.0, 400.0),
        lot("AAA_ST_GAIN", "AAA", 60, 90.0, 450.0),
    ];
    let request = WithdrawalRequest {
        withdrawal_amount: 300.0,
        cushion_pct: 0.0,
        ..Default::default()
    };

    let proposal = build_withdrawal_proposal(&holdings, &lots, None, &request);

    let ids: Vec<&str> = proposal.sells.iter().map(|s| s.lot_id.as_str()).collect();
    assert_eq!(ids, vec!["AAA_ST_LOSS", "BBB_LT_GAIN"]);
    let partial = &proposal.sells[1];
    assert!(close(partial.qty, 10.0));
    assert!(close(partial.basis, 80.0));
    assert!(close(proposal.total_expected_proceeds, 300.0));
    assert!(close(proposal.estimated_realized_lt, 120.0));
    assert!(proposal.warnings.is_empty());
    assert_eq!(proposal.drift_metrics.len(), 2);
}

#[test]
fn test_withdrawal_excluded_symbol_yields_nothing() {
    let holdings = vec![Holding::priced("AAA", 100.0, 10.0).unwrap()];
    let lots = vec![lot("AAA_ST_LOSS", "AAA", 30, 10.0, 150.0)];
    let request = WithdrawalRequest {
        withdrawal_amount: 500.0,
        cushion_pct: 0.0,
        exclude_symbols: vec!["aaa".to_string()],
        ..Default::default()
    };

    let proposal = build_withdrawal_proposal(&holdings, &lots, None, &request);

    assert!(proposal.sells.is_empty());
    assert_eq!(proposal.total_expected_proceeds, 0.0);
    assert!(proposal.warnings.contains(&TARGET_UNREACHABLE_WARNING.to_string()));
}

#[test]
fn test_withdrawal_covered_by_sweep_cash() {
    let holdings = vec![
        Holding::priced("AAA", 100.0, 10.0).unwrap(),
        Holding::cash_equivalent("VMFXX", 1000.0, 1.0).unwrap(),
    ];
    let lots = vec![lot("AAA_ST_LOSS", "AAA", 30, 10.0, 150.0)];
    let request = WithdrawalRequest {
        withdrawal_amount: 500.0,
        ..Default::default()
    };

    let proposal = build_withdrawal_proposal(&holdings, &lots, None, &request);

    assert!(close(proposal.buffer_amount, 5.0));
    assert!(close(proposal.cash_available, 1000.0));
    assert_eq!(proposal.amount_needed_from_sales, 0.0);
    assert!(proposal.sells.is_empty());
    assert_eq!(proposal.warnings, vec![COVERED_BY_CASH_WARNING.to_string()]);
}

// Transitions

fn transition_holdings() -> Vec<Holding> {
    vec![
        Holding::priced("AAA", 100.0, 10.0).unwrap(),
        Holding::cash_equivalent("VMFXX", 1000.0, 1.0).unwrap(),
    ]
}

fn two_name_basket() -> Vec<TargetBasketRow> {
    vec![
        TargetBasketRow::new("AAA", 0.6, None),
        TargetBasketRow::new("BBB", 0.4, None),
    ]
}

#[test]
fn test_transition_spends_cash_first() {
    let lots = vec![lot("AAA_ST_LOSS", "AAA", 30, 10.0, 150.0)];
    let request = StrategyAllocationRequest {
        allocation_amount: 500.0,
        ..Default::default()
    };

    let plan = build_transition_plan(
        &transition_holdings(),
        &lots,
        &two_name_basket(),
        &sp500(2),
        &request,
        None,
    );

    assert_eq!(plan.cash_needed_from_sales, 0.0);
    assert!(plan.sells.is_empty());
    assert!(close(plan.cash_used, 500.0));
    let bought: f64 = plan.buys.iter().map(|b| b.target_dollars).sum();
    assert!(close(bought, 500.0));
    assert_eq!(plan.buys[0].est_shares, Some(30.0));
    assert_eq!(
        plan.warnings,
        vec!["Missing price for BBB; share estimate skipped.".to_string()]
    );
    assert_eq!(
        plan.rationale_summary,
        vec![
            "Used default tax rate assumptions for MinTax ordering.".to_string(),
            "No realized gains file uploaded; assuming $0 realized gains.".to_string(),
            "Used $500.00 cash equivalents before selling 0 lots to raise $0.00.".to_string(),
            "Liquidation goal: min_tax for sp500 basket.".to_string(),
        ]
    );
}

#[test]
fn test_transition_fractional_price_is_funded() {
    let holdings = vec![Holding::priced("AAA", 100.0, 4.4).unwrap()];
    let lots = vec![lot("AAA_LOSS", "AAA", 30, 100.0, 1000.0)];
    let basket = vec![TargetBasketRow::new("AAA", 1.0, None)];
    let request = StrategyAllocationRequest {
        allocation_amount: 10.1,
        ..Default::default()
    };

    let plan = build_transition_plan(&holdings, &lots, &basket, &sp500(1), &request, None);

    assert!(close(plan.cash_needed_from_sales, 10.1));
    assert_eq!(plan.sells.len(), 1);
    assert!(plan.warnings.is_empty());
    assert!(!plan.warnings.contains(&UNDERFUNDED_WARNING.to_string()));
}

#[test]
fn test_transition_sells_for_shortfall() {
    let lots = vec![
        lot("AAA_LT_GAIN", "AAA", 800, 20.0, 100.0),
        lot("AAA_ST_LOSS", "AAA", 30, 10.0, 150.0),
        lot("SWEEP", "VMFXX", 400, 1000.0, 1000.0),
    ];
    let request = StrategyAllocationRequest {
        allocation_amount: 1200.0,
        ..Default::default()
    };

    let plan = build_transition_plan(
        &transition_holdings(),
        &lots,
        &two_name_basket(),
        &sp500(2),
        &request,
        Some(&realized_st(500.0)),
    );

    assert!(close(plan.cash_needed_from_sales, 200.0));
    let ids: Vec<&str> = plan.sells.iter().map(|s| s.lot_id.as_str()).collect();
    assert_eq!(ids, vec!["AAA_ST_LOSS", "AAA_LT_GAIN"]);
    assert!(close(plan.sells[1].qty, 10.0));
    assert!(close(plan.estimated_tax.st_realized, -50.0));
    assert!(close(plan.estimated_tax.lt_realized, 50.0));
    assert!(close(plan.estimated_tax.total_tax, -50.0 * 0.37 + 50.0 * 0.20));

    let bought: f64 = plan.buys.iter().map(|b| b.target_dollars).sum();
    assert!(close(bought, 1200.0));
    assert!(!plan.warnings.contains(&UNDERFUNDED_WARNING.to_string()));
    assert_eq!(
        plan.rationale_summary[1],
        "Realized gains context provided; losses prioritized to offset ST gains first."
    );
}

#[test]
fn test_transition_underfunded_when_everything_excluded() {
    let holdings = vec![Holding::priced("AAA", 100.0, 10.0).unwrap()];
    let lots = vec![lot("AAA_ST_LOSS", "AAA", 30, 10.0, 150.0)];
    let request = StrategyAllocationRequest {
        allocation_amount: 500.0,
        excluded_from_selling: vec!["AAA".to_string()],
        ..Default::default()
    };

    let plan =
        build_transition_plan(&holdings, &lots, &two_name_basket(), &sp500(2), &request, None);

    assert!(plan.sells.is_empty());
    assert!(close(plan.cash_needed_from_sales, 500.0));
    assert!(plan.warnings.iter().any(|w| w.contains("Unable")));
    assert!(plan.warnings.contains(&UNDERFUNDED_WARNING.to_string()));
}

#[test]
fn test_basket_feeds_transition_buys() {
    let universe = vec![
        TargetBasketRow::new("AAA", 0.5, None),
        TargetBasketRow::new("BBB", 0.3, None),
        TargetBasketRow::new("CCC", 0.2, None),
    ];
    let spec = StrategySpec::new(IndexName::Sp500, 3, 0.4).unwrap();
    let (basket, warnings) =
        build_target_basket(&universe, &spec, &HashMap::new(), &HashMap::new(), &[]);
    assert!(warnings.is_empty());
    assert!(basket.iter().all(|r| r.weight <= 0.4 + 1e-9));

    let request = StrategyAllocationRequest {
        allocation_amount: 1000.0,
        ..Default::default()
    };
    let plan =
        build_transition_plan(&transition_holdings(), &[], &basket, &spec, &request, None);

    assert!(close(plan.buys[0].target_dollars, 400.0));
    let bought: f64 = plan.buys.iter().map(|b| b.target_dollars).sum();
    assert!(close(bought, 1000.0));
}

// Sleeve management

fn sleeve_basket() -> Vec<TargetBasketRow> {
    vec![
        TargetBasketRow::new("AAA", 0.5, Some("Technology")),
        TargetBasketRow::new("BBB", 0.3, Some("Financials")),
        TargetBasketRow::new("CCC", 0.2, Some("Energy")),
    ]
}

fn sleeve_holdings() -> Vec<Holding> {
    vec![
        Holding::priced("AAA", 70.0, 10.0).unwrap(),
        Holding::priced("BBB", 20.0, 10.0).unwrap(),
        Holding::priced("CCC", 10.0, 10.0).unwrap(),
    ]
}

fn sleeve_lots() -> Vec<Lot> {
    vec![
        lot("AAA_LT", "AAA", 800, 70.0, 350.0),
        lot("BBB_LOSS", "BBB", 100, 20.0, 400.0),
        lot("CCC_FLAT", "CCC", 200, 10.0, 100.0),
    ]
}

#[test]
fn test_manage_combined_plan() {
    let settings = ManageActionSettings {
        turnover_cap_pct: 0.05,
        ..Default::default()
    };

    let plan = SleeveManager::build_plan(
        &sleeve_holdings(),
        &sleeve_lots(),
        &[],
        &sleeve_basket(),
        &settings,
        None,
        as_of(),
    );

    assert!(close(plan.drift_summary.sleeve_value, 1000.0));
    assert_eq!(plan.drift_summary.overweights[0].symbol, "AAA");

    assert_eq!(plan.tlh_sells.len(), 1);
    let harvest = &plan.tlh_sells[0];
    assert_eq!(harvest.lot_id, "BBB_LOSS");
    assert!(close(harvest.estimated_tax, -200.0 * 0.37));
    assert_eq!(harvest.rationale, vec!["TLH candidate".to_string()]);

    assert_eq!(plan.rebalance_sells.len(), 1);
    assert_eq!(plan.rebalance_sells[0].lot_id, "AAA_LT");
    assert!((plan.rebalance_sells[0].qty - 5.0).abs() < 1e-6);

    // Harvest proceeds skip BBB itself; both legs land in CCC
    assert_eq!(plan.buy_targets.len(), 1);
    let ccc = &plan.buy_targets[0];
    assert_eq!(ccc.symbol, "CCC");
    assert!((ccc.target_dollars - 150.0).abs() < 1e-6);
    assert!((ccc.est_shares.unwrap_or_default() - 15.0).abs() < 1e-6);
    assert!(close(ccc.target_weight, 0.2));
    assert!(plan.warnings.is_empty());
}

#[test]
fn test_manage_combined_never_resells_harvested_lot() {
    let lots = vec![
        lot("AAA_LOSS", "AAA", 100, 40.0, 800.0),
        lot("AAA_GAIN", "AAA", 800, 30.0, 150.0),
        lot("BBB_FLAT", "BBB", 200, 20.0, 200.0),
        lot("CCC_FLAT", "CCC", 200, 10.0, 100.0),
    ];

    let plan = SleeveManager::build_plan(
        &sleeve_holdings(),
        &lots,
        &[],
        &sleeve_basket(),
        &ManageActionSettings::default(),
        None,
        as_of(),
    );

    let harvested: Vec<&str> = plan.tlh_sells.iter().map(|s| s.lot_id.as_str()).collect();
    assert_eq!(harvested, vec!["AAA_LOSS"]);
    let rebalanced: Vec<&str> = plan.rebalance_sells.iter().map(|s| s.lot_id.as_str()).collect();
    assert_eq!(rebalanced, vec!["AAA_GAIN"]);
    assert!((plan.rebalance_sells[0].qty - 10.0).abs() < 1e-6);

    let sold: f64 = plan
        .tlh_sells
        .iter()
        .chain(&plan.rebalance_sells)
        .filter(|s| s.symbol == "AAA")
        .map(|s| s.qty)
        .sum();
    assert!(sold <= 70.0 + 1e-9);
}

#[test]
fn test_manage_combined_skips_rebalance_when_only_lot_was_harvested() {
    let lots = vec![
        lot("AAA_LOSS", "AAA", 100, 70.0, 1400.0),
        lot("BBB_FLAT", "BBB", 200, 20.0, 200.0),
        lot("CCC_FLAT", "CCC", 200, 10.0, 100.0),
    ];

    let plan = SleeveManager::build_plan(
        &sleeve_holdings(),
        &lots,
        &[],
        &sleeve_basket(),
        &ManageActionSettings::default(),
        None,
        as_of(),
    );

    assert_eq!(plan.tlh_sells.len(), 1);
    assert!(close(plan.tlh_sells[0].qty, 70.0));
    assert!(plan.rebalance_sells.is_empty());
    assert!(plan
        .warnings
        .contains(&"Reached end of candidates before hitting target.".to_string()));
}

#[test]
fn test_manage_turnover_cap_blocks_rebalance() {
    let settings = ManageActionSettings {
        mode: ManageMode::Rebalance,
        turnover_cap_pct: 0.0,
        ..Default::default()
    };

    let plan = SleeveManager::build_plan(
        &sleeve_holdings(),
        &sleeve_lots(),
        &[],
        &sleeve_basket(),
        &settings,
        None,
        as_of(),
    );

    assert!(plan.tlh_sells.is_empty());
    assert!(plan.rebalance_sells.is_empty());
    assert!(plan.buy_targets.is_empty());
    assert_eq!(plan.warnings, vec![TURNOVER_CAP_WARNING.to_string()]);
}

#[test]
fn test_manage_tlh_falls_back_to_etf_basket() {
    let basket = vec![
        TargetBasketRow::new("AAA", 0.5, None),
        TargetBasketRow::new("BBB", 0.5, None),
    ];
    let holdings = vec![
        Holding::priced("AAA", 50.0, 10.0).unwrap(),
        Holding::priced("BBB", 20.0, 10.0).unwrap(),
    ];
    let settings = ManageActionSettings {
        mode: ManageMode::Tlh,
        ..Default::default()
    };

    let plan = SleeveManager::build_plan(
        &holdings,
        &sleeve_lots(),
        &[],
        &basket,
        &settings,
        None,
        as_of(),
    );

    assert_eq!(plan.tlh_sells.len(), 1);
    assert_eq!(
        plan.warnings,
        vec!["No underweight replacements available for BBB; using ETF basket.".to_string()]
    );
    let symbols: Vec<&str> = plan.buy_targets.iter().map(|b| b.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["SPY", "VTI", "SCHB", "IVV"]);
    assert!(plan
        .buy_targets
        .iter()
        .all(|b| close(b.target_dollars, 50.0) && b.price.is_none() && b.est_shares.is_none()));
}

// Harvesting

#[test]
fn test_harvest_plan_end_to_end() {
    let holdings = vec![Holding::priced("AAA", 100.0, 10.0).unwrap()];
    let lots = vec![
        lot("L1", "AAA", 90, 100.0, 2000.0),
        lot("L2", "AAA", 90, 10.0, 90.0),
    ];
    let sectors = HashMap::from([("AAA".to_string(), "Technology".to_string())]);

    let plan = plan_harvest(
        &holdings,
        &lots,
        &[],
        None,
        &sectors,
        HarvestingConfig::default(),
        as_of(),
    );

    assert_eq!(plan.loss_target, 0.0);
    assert_eq!(plan.realized_summary.warnings.len(), 1);
    assert_eq!(plan.candidates.len(), 1);
    assert_eq!(plan.candidates[0].lot_id, "L1");
    assert_eq!(plan.summary.total_candidates, 1);
    assert!(close(plan.summary.total_harvestable_loss, 1000.0));

    let proposal = &plan.proposal;
    assert!(close(proposal.expected_realized_loss, 1000.0));
    let buys: Vec<&str> = proposal.buys.iter().map(|b| b.symbol.as_str()).collect();
    assert_eq!(buys, vec!["XLK", "VGT", "QQQ"]);
    assert!(proposal.warnings.is_empty());
}
