use serde::{Deserialize, Serialize};
use tax_optimizer::{
    HarvestGoal, LiquidationGoal, SellLotRecommendation, SellTotals, TaxPolicy, TaxRates,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// One line of a manual order ticket. Sells are sized in shares, buys in
/// dollars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderChecklistRow {
    pub symbol: String,
    pub side: OrderSide,
    pub qty: Option<f64>,
    pub dollars: Option<f64>,
    pub limit_price: Option<f64>,
    pub rationale: String,
}

/// Tax-loss harvesting order ticket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub sells: Vec<OrderChecklistRow>,
    pub buys: Vec<OrderChecklistRow>,
    pub expected_realized_loss: f64,
    pub notes: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WithdrawalRequest {
    pub withdrawal_amount: f64,
    /// Extra cash raised on top of the withdrawal, as a fraction of it
    pub cushion_pct: f64,
    /// Cash held outside the listed holdings
    pub manual_cash: f64,
    pub goal: LiquidationGoal,
    pub exclude_symbols: Vec<String>,
    pub exclude_missing_dates: bool,
    pub rates: TaxRates,
    pub policy: TaxPolicy,
}

impl Default for WithdrawalRequest {
    fn default() -> Self {
        Self {
            withdrawal_amount: 0.0,
            cushion_pct: 0.01,
            manual_cash: 0.0,
            goal: LiquidationGoal::MinTax,
            exclude_symbols: Vec::new(),
            exclude_missing_dates: true,
            rates: TaxRates::default(),
            policy: TaxPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalProposal {
    pub requested_amount: f64,
    pub buffer_amount: f64,
    pub cash_available: f64,
    pub amount_needed_from_sales: f64,
    pub total_expected_proceeds: f64,
    pub estimated_realized_st: f64,
    pub estimated_realized_lt: f64,
    pub estimated_tax_cost: f64,
    pub sells: Vec<SellLotRecommendation>,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
    pub drift_metrics: Vec<String>,
}

/// Funding request for moving cash into a target strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyAllocationRequest {
    pub allocation_amount: f64,
    /// Takes precedence over `cash_buffer_pct`
    pub cash_buffer_amount: Option<f64>,
    pub cash_buffer_pct: Option<f64>,
    pub manual_cash_available: f64,
    /// Spend sweep balances before selling, and never sell them
    pub use_cash_equivalents_first: bool,
    pub excluded_from_selling: Vec<String>,
    pub exclude_missing_dates: bool,
    pub liquidation_goal: LiquidationGoal,
    /// `None` means the default rate assumptions
    pub tax_rates: Option<TaxRates>,
    pub policy: TaxPolicy,
}

impl Default for StrategyAllocationRequest {
    fn default() -> Self {
        Self {
            allocation_amount: 0.0,
            cash_buffer_amount: None,
            cash_buffer_pct: None,
            manual_cash_available: 0.0,
            use_cash_equivalents_first: true,
            excluded_from_selling: Vec::new(),
            exclude_missing_dates: true,
            liquidation_goal: LiquidationGoal::MinTax,
            tax_rates: None,
            policy: TaxPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimatedTaxImpact {
    pub st_realized: f64,
    pub lt_realized: f64,
    pub st_tax: f64,
    pub lt_tax: f64,
    pub total_tax: f64,
}

impl From<SellTotals> for EstimatedTaxImpact {
    fn from(totals: SellTotals) -> Self {
        Self {
            st_realized: totals.st_realized,
            lt_realized: totals.lt_realized,
            st_tax: totals.st_tax,
            lt_tax: totals.lt_tax,
            total_tax: totals.total_tax(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyTargetRow {
    pub symbol: String,
    pub target_weight: f64,
    pub target_dollars: f64,
    pub price: Option<f64>,
    pub est_shares: Option<f64>,
}

impl BuyTargetRow {
    /// Fold another buy of the same symbol into this one. Share estimates
    /// survive only when both sides have one.
    pub fn merge(&mut self, other: &BuyTargetRow) {
        self.target_dollars += other.target_dollars;
        self.est_shares = match (self.est_shares, other.est_shares) {
            (Some(a), Some(b)) => Some(a + b),
            _ => None,
        };
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionPlan {
    pub allocation_amount: f64,
    pub buffer_amount: f64,
    pub cash_available: f64,
    pub cash_used: f64,
    pub cash_needed_from_sales: f64,
    pub sells: Vec<SellLotRecommendation>,
    pub estimated_tax: EstimatedTaxImpact,
    pub buys: Vec<BuyTargetRow>,
    pub warnings: Vec<String>,
    pub drift_metrics: Vec<String>,
    pub rationale_summary: Vec<String>,
}

/// Actual vs target weight of one symbol (or one sector) in the sleeve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftEntry {
    pub symbol: String,
    pub target_weight: f64,
    pub actual_weight: f64,
    /// actual - target; positive is overweight
    pub drift: f64,
    pub sector: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriftSummary {
    pub sleeve_value: f64,
    pub max_abs_drift: f64,
    pub total_abs_drift: f64,
    /// Largest first, at most ten
    pub overweights: Vec<DriftEntry>,
    /// Most underweight first, at most ten
    pub underweights: Vec<DriftEntry>,
    pub sector_drift: Vec<DriftEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManageMode {
    Tlh,
    Rebalance,
    #[default]
    Combined,
}

impl ManageMode {
    pub fn includes_tlh(&self) -> bool {
        matches!(self, ManageMode::Tlh | ManageMode::Combined)
    }

    pub fn includes_rebalance(&self) -> bool {
        matches!(self, ManageMode::Rebalance | ManageMode::Combined)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManageActionSettings {
    pub mode: ManageMode,
    /// Overweights at or below this drift are left alone
    pub drift_tolerance_pct: f64,
    /// Rebalance sells are capped at this share of the sleeve
    pub turnover_cap_pct: f64,
    pub tlh_candidate_limit: usize,
    pub harvest_goal: HarvestGoal,
    pub liquidation_goal: LiquidationGoal,
    pub rates: TaxRates,
    pub policy: TaxPolicy,
}

impl Default for ManageActionSettings {
    fn default() -> Self {
        Self {
            mode: ManageMode::Combined,
            drift_tolerance_pct: 0.005,
            turnover_cap_pct: 0.10,
            tlh_candidate_limit: 10,
            harvest_goal: HarvestGoal::OffsetGains,
            liquidation_goal: LiquidationGoal::MinTax,
            rates: TaxRates::default(),
            policy: TaxPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyManagePlan {
    pub drift_summary: DriftSummary,
    pub tlh_sells: Vec<SellLotRecommendation>,
    pub rebalance_sells: Vec<SellLotRecommendation>,
    pub buy_targets: Vec<BuyTargetRow>,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
}
