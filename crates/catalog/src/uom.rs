//! Unit-of-measure normalization and conversion.
//!
//! The trade deals in metric tons at purchase and kilograms at retail, so the
//! only conversions that matter are within the ton/kg family. Unknown unit
//! pairs convert with factor 1 (quantities pass through untouched).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const KG_PER_TON: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

/// Normalized unit of measurement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Ton,
    Kilogram,
    /// Any unit outside the ton/kg family (bags, rolls, pieces).
    Other(String),
}

impl Unit {
    /// Parse a free-form UOM label into a normalized unit.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "ton" | "tons" | "tonne" | "tonnes" | "mt" | "metric ton" | "metric tonne" => {
                Unit::Ton
            }
            "kg" | "kgs" | "kilogram" | "kilograms" => Unit::Kilogram,
            other => Unit::Other(other.to_string()),
        }
    }

    pub fn is_ton(&self) -> bool {
        matches!(self, Unit::Ton)
    }

    pub fn is_kg(&self) -> bool {
        matches!(self, Unit::Kilogram)
    }
}

impl core::fmt::Display for Unit {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Unit::Ton => f.write_str("Ton"),
            Unit::Kilogram => f.write_str("Kilogram"),
            Unit::Other(label) => f.write_str(label),
        }
    }
}

/// Multiplicative factor converting quantities `from` -> `to`.
pub fn conversion_factor(from: &Unit, to: &Unit) -> Decimal {
    if from.is_ton() && to.is_kg() {
        KG_PER_TON
    } else if from.is_kg() && to.is_ton() {
        Decimal::ONE / KG_PER_TON
    } else {
        Decimal::ONE
    }
}

/// Convert a quantity between units.
pub fn convert_quantity(quantity: Decimal, from: &Unit, to: &Unit) -> Decimal {
    quantity * conversion_factor(from, to)
}

/// Convert a per-unit rate between units (inverse of the quantity factor).
pub fn convert_rate(rate: Decimal, from: &Unit, to: &Unit) -> Decimal {
    let factor = conversion_factor(from, to);
    if factor.is_zero() { rate } else { rate / factor }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalizes_ton_family() {
        for label in ["Ton", "tonnes", "MT", "metric ton", " tons "] {
            assert_eq!(Unit::parse(label), Unit::Ton, "label: {label}");
        }
    }

    #[test]
    fn parse_normalizes_kg_family() {
        for label in ["kg", "Kgs", "Kilogram", "KILOGRAMS"] {
            assert_eq!(Unit::parse(label), Unit::Kilogram, "label: {label}");
        }
    }

    #[test]
    fn ton_to_kg_multiplies_by_thousand() {
        let qty = Decimal::new(25, 1); // 2.5 tons
        assert_eq!(
            convert_quantity(qty, &Unit::Ton, &Unit::Kilogram),
            Decimal::new(2500, 0)
        );
    }

    #[test]
    fn kg_to_ton_divides_by_thousand() {
        let qty = Decimal::new(500, 0);
        assert_eq!(
            convert_quantity(qty, &Unit::Kilogram, &Unit::Ton),
            Decimal::new(5, 1)
        );
    }

    #[test]
    fn rate_conversion_is_inverse_of_quantity_conversion() {
        // 50,000 per ton is 50 per kg.
        let rate = Decimal::new(50_000, 0);
        assert_eq!(
            convert_rate(rate, &Unit::Ton, &Unit::Kilogram),
            Decimal::new(50, 0)
        );
    }

    #[test]
    fn unknown_pairs_pass_through() {
        let qty = Decimal::new(7, 0);
        let bags = Unit::parse("bags");
        assert_eq!(convert_quantity(qty, &bags, &Unit::Ton), qty);
        assert_eq!(convert_rate(qty, &Unit::Ton, &bags), qty);
    }
}
