//! Request envelope read by the binary and its dispatch to the planners.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use portfolio_core::{collect_lots, normalize_symbol, Holding, LotRecord, RealizedGainLossRow, Trade};
use portfolio_manager::{
    build_target_basket, build_transition_plan, build_withdrawal_proposal, plan_harvest,
    ManageActionSettings, SleeveManager, StrategyAllocationRequest, StrategySpec,
    TargetBasketRow, WithdrawalRequest,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tax_optimizer::{summarize_realized, HarvestGoal, RealizedSummary, TaxPolicy, TaxRates};
use tracing::info;

use crate::config::PlannerConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct PlanRequest {
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
    pub holdings: Vec<Holding>,
    #[serde(default)]
    pub lots: Vec<LotRecord>,
    /// Absent means no realized report was supplied
    #[serde(default)]
    pub realized: Option<Vec<RealizedGainLossRow>>,
    #[serde(default)]
    pub trades: Vec<Trade>,
    #[serde(default)]
    pub sector_map: HashMap<String, String>,
    /// Overrides the configured rates for every plan
    #[serde(default)]
    pub tax_rates: Option<TaxRates>,
    #[serde(default)]
    pub policy: Option<TaxPolicy>,
    pub plan: PlanSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanSpec {
    Harvest(HarvestParams),
    Withdrawal(WithdrawalRequest),
    Transition(TransitionParams),
    Manage(ManageParams),
    Basket(BasketParams),
}

impl PlanSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            PlanSpec::Harvest(_) => "harvest",
            PlanSpec::Withdrawal(_) => "withdrawal",
            PlanSpec::Transition(_) => "transition",
            PlanSpec::Manage(_) => "manage",
            PlanSpec::Basket(_) => "basket",
        }
    }
}

/// Harvest filters; unset fields come from configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestParams {
    pub goal: HarvestGoal,
    pub loss_threshold: Option<f64>,
    pub loss_pct_threshold: Option<f64>,
    pub max_candidates: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionParams {
    pub spec: StrategySpec,
    pub basket: Vec<TargetBasketRow>,
    #[serde(default)]
    pub request: StrategyAllocationRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManageParams {
    pub basket: Vec<TargetBasketRow>,
    #[serde(default)]
    pub settings: ManageActionSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasketParams {
    pub spec: StrategySpec,
    pub universe: Vec<TargetBasketRow>,
    /// Screen name -> symbols it removes
    #[serde(default)]
    pub screen_lists: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub extra_exclusions: Vec<String>,
}

impl PlanRequest {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse plan request")
    }

    /// Run the requested plan and render its result as JSON.
    pub fn run(self, config: &PlannerConfig) -> Result<Value> {
        let as_of = self.as_of.unwrap_or(config.as_of);
        let lots = collect_lots(self.lots, as_of).context("Invalid lot in request")?;
        let sector_map: HashMap<String, String> = self
            .sector_map
            .into_iter()
            .map(|(symbol, sector)| (normalize_symbol(&symbol), sector))
            .collect();
        let realized: Option<RealizedSummary> = self.realized.as_deref().map(summarize_realized);
        let custom_rates = self.tax_rates;
        let rates = custom_rates.unwrap_or(config.rates);
        let policy = self.policy.unwrap_or(config.policy);
        let kind = self.plan.kind();

        info!(
            kind,
            %as_of,
            holdings = self.holdings.len(),
            lots = lots.len(),
            "Running plan"
        );

        let output = match self.plan {
            PlanSpec::Harvest(params) => {
                let mut harvesting = config.harvesting();
                harvesting.goal = params.goal;
                harvesting.policy = policy;
                if let Some(threshold) = params.loss_threshold {
                    harvesting.loss_threshold = threshold;
                }
                if let Some(pct) = params.loss_pct_threshold {
                    harvesting.loss_pct_threshold = pct;
                }
                if let Some(max) = params.max_candidates {
                    harvesting.max_candidates = max;
                }
                let plan = plan_harvest(
                    &self.holdings,
                    &lots,
                    &self.trades,
                    self.realized.as_deref(),
                    &sector_map,
                    harvesting,
                    as_of,
                );
                serde_json::to_value(plan)?
            }
            PlanSpec::Withdrawal(mut request) => {
                request.rates = rates;
                request.policy = policy;
                let proposal =
                    build_withdrawal_proposal(&self.holdings, &lots, realized.as_ref(), &request);
                serde_json::to_value(proposal)?
            }
            PlanSpec::Transition(mut params) => {
                // Plans priced at configured rates still report default assumptions
                // unless the request carried its own.
                params.request.tax_rates = custom_rates
                    .or(params.request.tax_rates)
                    .or((config.rates != TaxRates::default()).then_some(config.rates));
                params.request.policy = policy;
                let plan = build_transition_plan(
                    &self.holdings,
                    &lots,
                    &params.basket,
                    &params.spec,
                    &params.request,
                    realized.as_ref(),
                );
                serde_json::to_value(plan)?
            }
            PlanSpec::Manage(mut params) => {
                params.settings.rates = rates;
                params.settings.policy = policy;
                let plan = SleeveManager::build_plan(
                    &self.holdings,
                    &lots,
                    &self.trades,
                    &params.basket,
                    &params.settings,
                    realized.as_ref(),
                    as_of,
                );
                serde_json::to_value(plan)?
            }
            PlanSpec::Basket(params) => {
                let (basket, warnings) = build_target_basket(
                    &params.universe,
                    &params.spec,
                    &params.screen_lists,
                    &sector_map,
                    &params.extra_exclusions,
                );
                json!({ "basket": basket, "warnings": warnings })
            }
        };

        Ok(json!({ "kind": kind, "as_of": as_of, "result": output }))
    }
}
