//! Cost component types shared by the allocation engine and the worksheet.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which bucket a cost belongs to.
///
/// Foreign and local costs are allocated before taxes so that
/// percent-of-landed-cost taxes compound on top of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostBucket {
    Foreign,
    Local,
    Tax,
}

/// How a component's amount is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostScope {
    /// Fixed amount distributed across items by the allocation basis.
    TotalAmount,
    /// Amount per ton of item quantity.
    PerTon,
    /// Amount per kilogram of item quantity.
    PerKg,
    /// Percentage of the item's declared goods value.
    PercentOfCif,
    /// Percentage of the item's accumulated landed cost so far.
    PercentOfLandedCost,
}

impl CostScope {
    pub fn is_percentage(self) -> bool {
        matches!(self, CostScope::PercentOfCif | CostScope::PercentOfLandedCost)
    }
}

/// Basis for distributing `TotalAmount` components across items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMethod {
    ByValue,
    ByQuantity,
}

/// One logistics cost line on the worksheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostComponent {
    pub name: String,
    pub bucket: CostBucket,
    pub scope: CostScope,
    /// Fixed amount or per-unit rate, in `currency`. Unused for percentage
    /// scopes.
    pub amount: Decimal,
    /// Percentage for percentage scopes. Tax components fall back to the
    /// statutory table when this is `None`.
    pub percent: Option<Decimal>,
    pub currency: String,
    /// Rate converting `currency` into the worksheet currency. Not needed when
    /// the component is already in the worksheet or shipment currency.
    pub exchange_rate: Option<Decimal>,
    /// Restrict the component to a single shipment item.
    pub apply_to_item: Option<usize>,
}

/// Statutory import tax table: (name, percent).
const TAX_TABLE: &[(&str, u32)] = &[
    ("import duty tax 5%", 5),
    ("excise tax 3%", 3),
    ("sur tax 10%", 10),
    ("social welfare tax 3%", 3),
    ("withholding tax 3%", 3),
    ("vat 15%", 15),
];

/// Look up the statutory percentage for a named tax, case-insensitively.
pub fn tax_percent_for(name: &str) -> Option<Decimal> {
    let key = name.trim().to_lowercase();
    TAX_TABLE
        .iter()
        .find(|(tax, _)| *tax == key)
        .map(|(_, percent)| Decimal::from(*percent))
}

/// The full statutory tax table as percent-of-landed-cost components in the
/// given currency.
pub fn default_tax_components(currency: &str) -> Vec<CostComponent> {
    TAX_TABLE
        .iter()
        .map(|(name, percent)| CostComponent {
            name: name.to_string(),
            bucket: CostBucket::Tax,
            scope: CostScope::PercentOfLandedCost,
            amount: Decimal::ZERO,
            percent: Some(Decimal::from(*percent)),
            currency: currency.to_string(),
            exchange_rate: None,
            apply_to_item: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tax_table_lookup_is_case_insensitive() {
        assert_eq!(tax_percent_for("VAT 15%"), Some(Decimal::from(15)));
        assert_eq!(tax_percent_for("Import Duty Tax 5%"), Some(Decimal::from(5)));
        assert_eq!(tax_percent_for("Sur Tax 10%"), Some(Decimal::from(10)));
        assert_eq!(tax_percent_for("road toll"), None);
    }

    #[test]
    fn default_tax_components_cover_the_full_table() {
        let taxes = default_tax_components("BDT");
        assert_eq!(taxes.len(), 6);
        assert!(taxes.iter().all(|t| t.bucket == CostBucket::Tax));
        assert!(taxes.iter().all(|t| t.scope == CostScope::PercentOfLandedCost));
    }
}
