//! Order checklists for harvest candidates and their replacement buys.

use std::collections::HashMap;

use portfolio_core::money::{format_currency, round_cents};
use tax_optimizer::{ReplacementBasket, TlhCandidate};

use crate::models::{OrderChecklistRow, OrderSide, Proposal};

/// Turn selected harvest candidates into an order checklist. Each sold lot
/// is replaced by its symbol's basket for the lot's current value.
pub fn build_proposal(
    candidates: &[TlhCandidate],
    replacements: &HashMap<String, Vec<ReplacementBasket>>,
) -> Proposal {
    let mut proposal = Proposal::default();

    for candidate in candidates {
        proposal.sells.push(OrderChecklistRow {
            symbol: candidate.symbol.clone(),
            side: OrderSide::Sell,
            qty: Some(candidate.qty),
            dollars: None,
            limit_price: None,
            rationale: format!("Harvest loss from lot {}", candidate.lot_id),
        });
        proposal.notes.extend(candidate.notes.iter().cloned());

        let basket = match replacements.get(&candidate.symbol) {
            Some(basket) if !basket.is_empty() => basket,
            _ => {
                proposal
                    .warnings
                    .push(format!("No replacement basket for {}", candidate.symbol));
                continue;
            }
        };

        let target_value = candidate.current_value.abs();
        for proxy in basket {
            let dollars = round_cents(target_value * proxy.weight);
            proposal.buys.push(OrderChecklistRow {
                symbol: proxy.symbol.clone(),
                side: OrderSide::Buy,
                qty: None,
                dollars: Some(dollars),
                limit_price: None,
                rationale: format!(
                    "Proxy for {}; allocate {}",
                    candidate.symbol,
                    format_currency(dollars)
                ),
            });
        }
    }

    proposal.expected_realized_loss = candidates.iter().map(TlhCandidate::loss).sum();
    proposal
}
