use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::env;
use tax_optimizer::harvester::{
    DEFAULT_LOSS_PCT_THRESHOLD, DEFAULT_LOSS_THRESHOLD, DEFAULT_MAX_CANDIDATES,
};
use tax_optimizer::{HarvestingConfig, TaxPolicy, TaxRates};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    // Tax assumptions
    pub rates: TaxRates,
    pub policy: TaxPolicy,

    // Harvest filters
    pub loss_threshold: f64,     // $500
    pub loss_pct_threshold: f64, // 0.05 (5% of basis)
    pub max_candidates: usize,   // 10

    /// Valuation date for terms and wash-sale windows
    pub as_of: NaiveDate,
}

impl PlannerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; missing keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |key: &str, default: String| lookup(key).unwrap_or(default);
        let parse_f64 = |key: &str, default: f64| -> Result<f64> {
            read(key, default.to_string())
                .trim()
                .parse()
                .with_context(|| format!("{key} must be a number"))
        };

        let defaults = TaxRates::default();
        let policy_defaults = TaxPolicy::default();
        let as_of = match lookup("PLANNER_AS_OF") {
            Some(text) => portfolio_core::dates::parse_date(&text)
                .with_context(|| format!("PLANNER_AS_OF '{text}' is not a date"))?,
            None => chrono::Local::now().date_naive(),
        };

        let config = Self {
            rates: TaxRates {
                short_term: parse_f64("PLANNER_SHORT_TERM_RATE", defaults.short_term)?,
                long_term: parse_f64("PLANNER_LONG_TERM_RATE", defaults.long_term)?,
                state: parse_f64("PLANNER_STATE_RATE", defaults.state)?,
            },
            policy: TaxPolicy {
                loss_carry_discount: parse_f64(
                    "PLANNER_LOSS_CARRY_DISCOUNT",
                    policy_defaults.loss_carry_discount,
                )?,
                loss_target_tolerance: parse_f64(
                    "PLANNER_LOSS_TARGET_TOLERANCE",
                    policy_defaults.loss_target_tolerance,
                )?,
            },
            loss_threshold: parse_f64("PLANNER_LOSS_THRESHOLD", DEFAULT_LOSS_THRESHOLD)?,
            loss_pct_threshold: parse_f64("PLANNER_LOSS_PCT_THRESHOLD", DEFAULT_LOSS_PCT_THRESHOLD)?,
            max_candidates: read("PLANNER_MAX_CANDIDATES", DEFAULT_MAX_CANDIDATES.to_string())
                .trim()
                .parse()
                .context("PLANNER_MAX_CANDIDATES must be a whole number")?,
            as_of,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let fractions = [
            ("PLANNER_SHORT_TERM_RATE", self.rates.short_term),
            ("PLANNER_LONG_TERM_RATE", self.rates.long_term),
            ("PLANNER_STATE_RATE", self.rates.state),
            ("PLANNER_LOSS_CARRY_DISCOUNT", self.policy.loss_carry_discount),
            ("PLANNER_LOSS_TARGET_TOLERANCE", self.policy.loss_target_tolerance),
        ];
        for (key, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                bail!("{key} must be between 0 and 1, got {value}");
            }
        }
        if self.max_candidates == 0 {
            bail!("PLANNER_MAX_CANDIDATES must be at least 1");
        }
        Ok(())
    }

    pub fn harvesting(&self) -> HarvestingConfig {
        HarvestingConfig {
            loss_threshold: self.loss_threshold,
            loss_pct_threshold: self.loss_pct_threshold,
            max_candidates: self.max_candidates,
            policy: self.policy,
            ..Default::default()
        }
    }
}
