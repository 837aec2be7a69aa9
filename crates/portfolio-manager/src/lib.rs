//! Portfolio planners built on the tax optimizer: withdrawals, strategy
//! transitions, sleeve management, harvesting proposals and target baskets.

pub mod analytics;
pub mod drift;
pub mod harvest;
pub mod models;
pub mod proposals;
pub mod rebalancing;
pub mod strategy;
pub mod transition;
pub mod withdrawals;

#[cfg(test)]
mod tests;

pub use analytics::{compute_symbol_weights, estimate_available_cash, total_market_value};
pub use drift::{compute_drift_notes, compute_sell_drift, SellDrift};
pub use harvest::{plan_harvest, HarvestPlan};
pub use models::*;
pub use proposals::build_proposal;
pub use rebalancing::{SleeveManager, SleeveSnapshot};
pub use strategy::{
    apply_screens, build_target_basket, cap_and_renormalize, limit_to_top_n, IndexName,
    StrategySpec, TargetBasketRow,
};
pub use transition::{build_buy_targets, build_transition_plan};
pub use withdrawals::build_withdrawal_proposal;
