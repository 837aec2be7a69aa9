//! Target basket construction.
//!
//! A strategy starts from an index universe (supplied by the caller as
//! symbol / weight / sector rows), drops screened and excluded names, caps
//! single-name weight, keeps the largest `holdings_count` names and caps
//! again.

use std::collections::{BTreeMap, HashMap, HashSet};

use portfolio_core::securities::is_money_market_symbol;
use portfolio_core::{normalize_symbol, PortfolioError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Iteration bound for [`cap_and_renormalize`]. Each pass pins at least one
/// more name at the cap, so baskets needing more passes than this end up
/// normalized but possibly a little above the cap.
pub const RENORMALIZE_MAX_ITERATIONS: usize = 10;

const CAP_SLACK: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexName {
    Sp500,
    TotalUs,
    Nasdaq100,
}

impl std::fmt::Display for IndexName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexName::Sp500 => write!(f, "sp500"),
            IndexName::TotalUs => write!(f, "total_us"),
            IndexName::Nasdaq100 => write!(f, "nasdaq100"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StrategySpecRecord")]
pub struct StrategySpec {
    pub index_name: IndexName,
    pub holdings_count: usize,
    /// In (0, 1]
    pub max_single_name_weight: f64,
    /// Screen name -> enabled
    pub screens: BTreeMap<String, bool>,
    pub excluded_symbols: Vec<String>,
    pub include_cash_equivalents: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategySpecRecord {
    pub index_name: IndexName,
    pub holdings_count: usize,
    pub max_single_name_weight: f64,
    #[serde(default)]
    pub screens: BTreeMap<String, bool>,
    #[serde(default)]
    pub excluded_symbols: Vec<String>,
    #[serde(default)]
    pub include_cash_equivalents: bool,
}

impl TryFrom<StrategySpecRecord> for StrategySpec {
    type Error = PortfolioError;

    fn try_from(record: StrategySpecRecord) -> Result<Self> {
        let mut spec = StrategySpec::new(
            record.index_name,
            record.holdings_count,
            record.max_single_name_weight,
        )?;
        spec.screens = record.screens;
        spec.include_cash_equivalents = record.include_cash_equivalents;
        Ok(spec.with_exclusions(&record.excluded_symbols))
    }
}

impl StrategySpec {
    pub fn new(index_name: IndexName, holdings_count: usize, max_single_name_weight: f64) -> Result<Self> {
        if holdings_count == 0 {
            return Err(PortfolioError::InvalidStrategy(
                "holdings_count must be at least 1".to_string(),
            ));
        }
        if !(max_single_name_weight > 0.0 && max_single_name_weight <= 1.0) {
            return Err(PortfolioError::InvalidStrategy(format!(
                "max_single_name_weight must be in (0, 1], got {max_single_name_weight}"
            )));
        }
        Ok(Self {
            index_name,
            holdings_count,
            max_single_name_weight,
            screens: BTreeMap::new(),
            excluded_symbols: Vec::new(),
            include_cash_equivalents: false,
        })
    }

    /// Add exclusions, normalized and without blanks.
    pub fn with_exclusions(mut self, symbols: &[String]) -> Self {
        self.excluded_symbols.extend(
            symbols
                .iter()
                .map(|s| normalize_symbol(s))
                .filter(|s| !s.is_empty()),
        );
        self
    }

    pub fn with_screen(mut self, name: &str, enabled: bool) -> Self {
        self.screens.insert(name.to_string(), enabled);
        self
    }
}

/// One basket (or universe) member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetBasketRow {
    pub symbol: String,
    pub weight: f64,
    #[serde(default)]
    pub sector: Option<String>,
}

impl TargetBasketRow {
    pub fn new(symbol: &str, weight: f64, sector: Option<&str>) -> Self {
        Self {
            symbol: normalize_symbol(symbol),
            weight,
            sector: sector.map(str::to_string),
        }
    }
}

fn total_weight(rows: &[TargetBasketRow]) -> f64 {
    rows.iter().map(|r| r.weight).sum()
}

fn normalize(rows: &mut [TargetBasketRow]) {
    let total = total_weight(rows);
    if total > 0.0 {
        for row in rows.iter_mut() {
            row.weight /= total;
        }
    }
}

/// Remove excluded and screened symbols. `screen_lists` maps a screen name
/// to the symbols it removes.
pub fn apply_screens(
    rows: Vec<TargetBasketRow>,
    spec: &StrategySpec,
    screen_lists: &HashMap<String, Vec<String>>,
    extra_exclusions: &[String],
) -> (Vec<TargetBasketRow>, Vec<String>) {
    let mut warnings = Vec::new();
    let mut exclude: HashSet<String> = spec.excluded_symbols.iter().cloned().collect();
    exclude.extend(
        extra_exclusions
            .iter()
            .map(|s| normalize_symbol(s))
            .filter(|s| !s.is_empty()),
    );

    for (name, _) in spec.screens.iter().filter(|(_, enabled)| **enabled) {
        match screen_lists.get(name) {
            Some(symbols) if !symbols.is_empty() => {
                exclude.extend(symbols.iter().map(|s| normalize_symbol(s)));
            }
            _ => warnings.push(format!("Screen list '{name}' is empty or missing")),
        }
    }

    let kept = rows
        .into_iter()
        .filter(|row| !exclude.contains(&normalize_symbol(&row.symbol)))
        .collect();
    (kept, warnings)
}

/// Normalize weights to 1.0 and cap each name at `max_weight`, handing the
/// excess to uncapped names pro rata. A cap of 0 or >= 1 only normalizes.
pub fn cap_and_renormalize(mut rows: Vec<TargetBasketRow>, max_weight: f64) -> Vec<TargetBasketRow> {
    if total_weight(&rows) <= 0.0 {
        return rows;
    }
    normalize(&mut rows);
    if max_weight <= 0.0 || max_weight >= 1.0 {
        return rows;
    }

    let mut capped = vec![false; rows.len()];
    for _ in 0..RENORMALIZE_MAX_ITERATIONS {
        let mut excess = 0.0;
        let mut newly_capped = false;
        for (row, is_capped) in rows.iter_mut().zip(capped.iter_mut()) {
            if !*is_capped && row.weight > max_weight + CAP_SLACK {
                excess += row.weight - max_weight;
                row.weight = max_weight;
                *is_capped = true;
                newly_capped = true;
            }
        }
        if !newly_capped {
            break;
        }

        let uncapped_total: f64 = rows
            .iter()
            .zip(&capped)
            .filter(|(_, c)| !**c)
            .map(|(r, _)| r.weight)
            .sum();
        if uncapped_total <= 0.0 {
            break;
        }
        for (row, _) in rows.iter_mut().zip(&capped).filter(|(_, c)| !**c) {
            row.weight += row.weight / uncapped_total * excess;
        }
    }

    normalize(&mut rows);
    rows
}

/// Keep the `n` heaviest names (all of them when `n` is 0) and renormalize.
pub fn limit_to_top_n(mut rows: Vec<TargetBasketRow>, n: usize) -> Vec<TargetBasketRow> {
    rows.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    if n > 0 {
        rows.truncate(n);
    }
    normalize(&mut rows);
    rows
}

pub fn build_target_basket(
    universe: &[TargetBasketRow],
    spec: &StrategySpec,
    screen_lists: &HashMap<String, Vec<String>>,
    sector_map: &HashMap<String, String>,
    extra_exclusions: &[String],
) -> (Vec<TargetBasketRow>, Vec<String>) {
    let (mut working, mut warnings) =
        apply_screens(universe.to_vec(), spec, screen_lists, extra_exclusions);

    if !spec.include_cash_equivalents {
        let before = working.len();
        working.retain(|row| !is_money_market_symbol(&row.symbol, &[]));
        if working.len() < before {
            warnings.push("Cash/money-market symbols removed from target basket".to_string());
        }
    }

    if working.is_empty() {
        warnings.push("All symbols removed after applying screens/exclusions.".to_string());
        return (working, warnings);
    }

    let working = cap_and_renormalize(working, spec.max_single_name_weight);
    let working = limit_to_top_n(working, spec.holdings_count);
    let mut working = cap_and_renormalize(working, spec.max_single_name_weight);

    if working.is_empty() {
        warnings.push("No holdings remain after limiting to requested count.".to_string());
        return (working, warnings);
    }

    for row in working.iter_mut().filter(|r| r.sector.is_none()) {
        row.sector = sector_map.get(&normalize_symbol(&row.symbol)).cloned();
    }

    let total = total_weight(&working);
    if total > 0.0 && !(0.99..=1.01).contains(&total) {
        normalize(&mut working);
        warnings.push("Weights renormalized after filtering.".to_string());
    }

    if working.len() < spec.holdings_count {
        warnings.push(
            "Fewer holdings available than requested count after screens/exclusions.".to_string(),
        );
    }

    debug!(
        index = %spec.index_name,
        holdings = working.len(),
        "Built target basket"
    );
    (working, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn universe() -> Vec<TargetBasketRow> {
        vec![
            TargetBasketRow::new("AAA", 0.40, Some("Technology")),
            TargetBasketRow::new("BBB", 0.25, None),
            TargetBasketRow::new("CCC", 0.15, Some("Energy")),
            TargetBasketRow::new("DDD", 0.10, Some("Energy")),
            TargetBasketRow::new("EEE", 0.05, None),
            TargetBasketRow::new("SPAXX", 0.05, None),
        ]
    }

    fn weights(rows: &[TargetBasketRow]) -> Vec<f64> {
        rows.iter().map(|r| r.weight).collect()
    }

    #[test]
    fn test_spec_validation() {
        assert!(StrategySpec::new(IndexName::Sp500, 0, 0.1).is_err());
        assert!(StrategySpec::new(IndexName::Sp500, 5, 0.0).is_err());
        assert!(StrategySpec::new(IndexName::Sp500, 5, 1.5).is_err());

        let spec: StrategySpec = serde_json::from_str(
            r#"{"index_name":"total_us","holdings_count":3,"max_single_name_weight":0.5,"excluded_symbols":[" aaa",""]}"#,
        )
        .unwrap();
        assert_eq!(spec.index_name, IndexName::TotalUs);
        assert_eq!(spec.excluded_symbols, vec!["AAA".to_string()]);
        assert!(serde_json::from_str::<StrategySpec>(
            r#"{"index_name":"sp500","holdings_count":0,"max_single_name_weight":0.5}"#
        )
        .is_err());
    }

    #[test]
    fn test_cap_and_renormalize_respects_cap() {
        let capped = cap_and_renormalize(universe(), 0.3);
        assert!((total_weight(&capped) - 1.0).abs() < 1e-9);
        assert!(capped.iter().all(|r| r.weight <= 0.3 + 1e-9));
        // Excess flows to the uncapped names in proportion
        assert!((capped[2].weight / capped[3].weight - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_cap_and_renormalize_is_idempotent() {
        let once = cap_and_renormalize(universe(), 0.3);
        let twice = cap_and_renormalize(once.clone(), 0.3);
        for (a, b) in weights(&once).iter().zip(weights(&twice).iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_cap_outside_unit_interval_only_normalizes() {
        let rows = vec![TargetBasketRow::new("A", 2.0, None), TargetBasketRow::new("B", 6.0, None)];
        assert_eq!(weights(&cap_and_renormalize(rows.clone(), 1.0)), vec![0.25, 0.75]);
        assert_eq!(weights(&cap_and_renormalize(rows, 0.0)), vec![0.25, 0.75]);
    }

    #[test]
    fn test_top_n() {
        let top = limit_to_top_n(universe(), 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].symbol, "AAA");
        assert!((top[0].weight - 0.40 / 0.65).abs() < 1e-9);
    }

    #[test]
    fn test_build_basket_with_screens() {
        let spec = StrategySpec::new(IndexName::Sp500, 10, 0.5)
            .unwrap()
            .with_screen("oil_gas", true)
            .with_screen("tobacco", true)
            .with_screen("weapons", false)
            .with_exclusions(&["eee".to_string()]);
        let screens = HashMap::from([
            ("oil_gas".to_string(), vec!["CCC".to_string(), "DDD".to_string()]),
            ("weapons".to_string(), vec!["AAA".to_string()]),
        ]);
        let sectors = HashMap::from([("BBB".to_string(), "Financials".to_string())]);

        let (basket, warnings) = build_target_basket(&universe(), &spec, &screens, &sectors, &[]);

        let symbols: Vec<&str> = basket.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAA", "BBB"]);
        assert!((total_weight(&basket) - 1.0).abs() < 1e-9);
        assert_eq!(basket[1].sector.as_deref(), Some("Financials"));
        assert_eq!(
            warnings,
            vec![
                "Screen list 'tobacco' is empty or missing".to_string(),
                "Cash/money-market symbols removed from target basket".to_string(),
                "Fewer holdings available than requested count after screens/exclusions."
                    .to_string(),
            ]
        );
    }

    #[test]
    fn test_build_basket_everything_excluded() {
        let spec = StrategySpec::new(IndexName::Nasdaq100, 3, 0.5).unwrap();
        let universe = vec![TargetBasketRow::new("VMFXX", 1.0, None)];
        let (basket, warnings) =
            build_target_basket(&universe, &spec, &HashMap::new(), &HashMap::new(), &[]);
        assert!(basket.is_empty());
        assert_eq!(
            warnings.last().map(String::as_str),
            Some("All symbols removed after applying screens/exclusions.")
        );
    }
}
