//! Tax Optimizer
//!
//! Lot valuation, year-to-date realized gains context, tax-loss harvesting
//! candidates with wash-sale proximity checks, replacement baskets, and the
//! tax-aware sell-lot selection engine shared by every planner.

pub mod harvester;
pub mod lot_selection;
pub mod substitutes;
pub mod tax_calculator;
pub mod tax_context;
pub mod valuation;
pub mod wash_sale;

pub use harvester::{HarvestSummary, HarvestingConfig, HarvestingEngine, TlhCandidate};
pub use lot_selection::{
    build_sell_candidates, bucket_candidates, LiquidationConfig, LiquidationEngine,
    LiquidationGoal, LotBucket, SellCandidate, SellLotRecommendation, SellSelection, SellTotals,
};
pub use substitutes::{build_replacement_basket, infer_sector, ReplacementBasket};
pub use tax_calculator::{OffsetPool, TaxPolicy, TaxRates};
pub use tax_context::{
    compute_loss_target, determine_priority_term, summarize_realized, HarvestGoal,
    RealizedSummary,
};
pub use valuation::{price_lookup, value_lot, value_lots, ValuedLot};
pub use wash_sale::{WashSaleMonitor, WASH_WINDOW_DAYS};
