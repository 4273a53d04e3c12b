//! Per-product profitability summary derived from an allocation breakdown.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::allocation::CostBreakdown;

const KG_PER_TON: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

/// Selling-side assumptions for one item (or the worksheet default).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitAssumptions {
    pub selling_price_per_kg: Decimal,
    pub profit_tax_percent: Decimal,
}

/// Landed cost and estimated margin for one shipment item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductProfitSummary {
    pub item_index: usize,
    pub quantity_tons: Decimal,
    pub price_per_ton_import: Decimal,
    pub price_per_ton_local: Decimal,
    pub foreign_cost_per_ton: Decimal,
    pub local_cost_per_ton: Decimal,
    pub tax_cost_per_ton: Decimal,
    pub landing_cost_per_ton: Decimal,
    pub landing_cost_per_kg: Decimal,
    pub selling_price_per_kg: Decimal,
    pub gross_profit_per_kg: Decimal,
    pub profit_tax_percent: Decimal,
    pub net_profit_per_kg: Decimal,
    pub total_net_profit: Decimal,
}

/// Build per-item profitability rows.
///
/// `assumptions_for` supplies the per-item override; items without one fall
/// back to `default_assumptions`.
pub fn build_product_summaries(
    breakdown: &CostBreakdown,
    default_assumptions: ProfitAssumptions,
    assumptions_for: impl Fn(usize) -> Option<ProfitAssumptions>,
) -> Vec<ProductProfitSummary> {
    breakdown
        .items
        .iter()
        .map(|item| {
            let qty = item.quantity;
            let per_ton = |amount: Decimal| {
                if qty.is_zero() { Decimal::ZERO } else { amount / qty }
            };

            let landing_per_ton = per_ton(item.landed_cost_local());
            let landing_per_kg = landing_per_ton / KG_PER_TON;

            let assumptions =
                assumptions_for(item.item_index).unwrap_or(default_assumptions);
            let gross_per_kg = assumptions.selling_price_per_kg - landing_per_kg;
            let net_per_kg = gross_per_kg
                * (Decimal::ONE - assumptions.profit_tax_percent / Decimal::ONE_HUNDRED);
            let total_net = net_per_kg * qty * KG_PER_TON;

            ProductProfitSummary {
                item_index: item.item_index,
                quantity_tons: qty,
                price_per_ton_import: per_ton(item.base_amount_import),
                price_per_ton_local: per_ton(item.base_amount_local),
                foreign_cost_per_ton: per_ton(item.foreign_local),
                local_cost_per_ton: per_ton(item.local_local),
                tax_cost_per_ton: per_ton(item.tax_local),
                landing_cost_per_ton: landing_per_ton,
                landing_cost_per_kg: landing_per_kg,
                selling_price_per_kg: assumptions.selling_price_per_kg,
                gross_profit_per_kg: gross_per_kg,
                profit_tax_percent: assumptions.profit_tax_percent,
                net_profit_per_kg: net_per_kg,
                total_net_profit: total_net,
            }
        })
        .collect()
}

/// Sum of `total_net_profit` across all rows.
pub fn estimated_total_net_profit(summaries: &[ProductProfitSummary]) -> Decimal {
    summaries.iter().map(|s| s.total_net_profit).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::{CostTotals, ItemCostBreakdown};

    fn breakdown() -> CostBreakdown {
        CostBreakdown {
            items: vec![ItemCostBreakdown {
                item_index: 0,
                quantity: Decimal::new(10, 0),
                base_amount_import: Decimal::new(10_000, 0),
                base_amount_local: Decimal::new(1_000_000, 0),
                foreign_local: Decimal::new(100_000, 0),
                foreign_import: Decimal::new(1_000, 0),
                local_local: Decimal::new(50_000, 0),
                local_import: Decimal::new(500, 0),
                tax_local: Decimal::new(150_000, 0),
                tax_import: Decimal::new(1_500, 0),
            }],
            totals: CostTotals::default(),
        }
    }

    #[test]
    fn per_ton_and_per_kg_figures_derive_from_landed_cost() {
        let summaries = build_product_summaries(
            &breakdown(),
            ProfitAssumptions::default(),
            |_| None,
        );

        let row = &summaries[0];
        // 1,300,000 local landed over 10 tons.
        assert_eq!(row.landing_cost_per_ton, Decimal::new(130_000, 0));
        assert_eq!(row.landing_cost_per_kg, Decimal::new(130, 0));
        assert_eq!(row.foreign_cost_per_ton, Decimal::new(10_000, 0));
        assert_eq!(row.tax_cost_per_ton, Decimal::new(15_000, 0));
    }

    #[test]
    fn net_profit_applies_the_profit_tax() {
        let assumptions = ProfitAssumptions {
            selling_price_per_kg: Decimal::new(150, 0),
            profit_tax_percent: Decimal::new(30, 0),
        };
        let summaries = build_product_summaries(&breakdown(), assumptions, |_| None);

        let row = &summaries[0];
        assert_eq!(row.gross_profit_per_kg, Decimal::new(20, 0));
        assert_eq!(row.net_profit_per_kg, Decimal::new(14, 0));
        // 14 per kg over 10 tons = 140,000.
        assert_eq!(row.total_net_profit, Decimal::new(140_000, 0));
        assert_eq!(estimated_total_net_profit(&summaries), Decimal::new(140_000, 0));
    }

    #[test]
    fn per_item_override_beats_the_default() {
        let default = ProfitAssumptions {
            selling_price_per_kg: Decimal::new(150, 0),
            profit_tax_percent: Decimal::ZERO,
        };
        let override_row = ProfitAssumptions {
            selling_price_per_kg: Decimal::new(200, 0),
            profit_tax_percent: Decimal::ZERO,
        };

        let summaries = build_product_summaries(&breakdown(), default, |idx| {
            (idx == 0).then_some(override_row)
        });

        assert_eq!(summaries[0].selling_price_per_kg, Decimal::new(200, 0));
    }
}
