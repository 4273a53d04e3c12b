//! Pure landed cost allocation engine.
//!
//! Costs are spread in two passes: first the foreign and local buckets, each
//! accumulating into a per-item running subtotal (goods value plus allocated
//! costs), then the tax bucket, so percent-of-landed-cost taxes are computed
//! on the fully loaded base. All amounts are tracked in both the shipment
//! (import) currency and the worksheet (local) currency.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use plasticflow_core::DomainError;

use crate::component::{AllocationMethod, CostBucket, CostComponent, CostScope, tax_percent_for};

const KG_PER_TON: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

/// One shipment item as seen by the allocation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationItem {
    pub item_index: usize,
    /// Quantity in tons.
    pub quantity: Decimal,
    /// Declared goods value in the shipment currency.
    pub base_amount_import: Decimal,
}

/// Allocated costs for one item, split by bucket and currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCostBreakdown {
    pub item_index: usize,
    pub quantity: Decimal,
    pub base_amount_import: Decimal,
    pub base_amount_local: Decimal,
    pub foreign_local: Decimal,
    pub foreign_import: Decimal,
    pub local_local: Decimal,
    pub local_import: Decimal,
    pub tax_local: Decimal,
    pub tax_import: Decimal,
}

impl ItemCostBreakdown {
    pub fn additional_cost_local(&self) -> Decimal {
        self.foreign_local + self.local_local
    }

    pub fn additional_cost_import(&self) -> Decimal {
        self.foreign_import + self.local_import
    }

    pub fn landed_cost_local(&self) -> Decimal {
        self.base_amount_local + self.additional_cost_local() + self.tax_local
    }

    pub fn landed_cost_import(&self) -> Decimal {
        self.base_amount_import + self.additional_cost_import() + self.tax_import
    }

    pub fn landed_rate_local(&self) -> Decimal {
        if self.quantity.is_zero() {
            Decimal::ZERO
        } else {
            self.landed_cost_local() / self.quantity
        }
    }

    pub fn landed_rate_import(&self) -> Decimal {
        if self.quantity.is_zero() {
            Decimal::ZERO
        } else {
            self.landed_cost_import() / self.quantity
        }
    }
}

/// Bucket totals across all items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostTotals {
    pub foreign_local: Decimal,
    pub foreign_import: Decimal,
    pub local_local: Decimal,
    pub local_import: Decimal,
    pub tax_local: Decimal,
    pub tax_import: Decimal,
}

/// Full allocation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub items: Vec<ItemCostBreakdown>,
    pub totals: CostTotals,
}

impl CostBreakdown {
    pub fn total_base_local(&self) -> Decimal {
        self.items.iter().map(|i| i.base_amount_local).sum()
    }

    pub fn total_base_import(&self) -> Decimal {
        self.items.iter().map(|i| i.base_amount_import).sum()
    }

    pub fn total_additional_cost_local(&self) -> Decimal {
        self.totals.foreign_local + self.totals.local_local
    }

    pub fn total_additional_cost_import(&self) -> Decimal {
        self.totals.foreign_import + self.totals.local_import
    }

    pub fn total_landed_cost_local(&self) -> Decimal {
        self.total_base_local() + self.total_additional_cost_local() + self.totals.tax_local
    }

    pub fn total_landed_cost_import(&self) -> Decimal {
        self.total_base_import() + self.total_additional_cost_import() + self.totals.tax_import
    }

    pub fn total_quantity(&self) -> Decimal {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn avg_landed_cost_local(&self) -> Decimal {
        let qty = self.total_quantity();
        if qty.is_zero() {
            Decimal::ZERO
        } else {
            self.total_landed_cost_local() / qty
        }
    }

    pub fn avg_landed_cost_import(&self) -> Decimal {
        let qty = self.total_quantity();
        if qty.is_zero() {
            Decimal::ZERO
        } else {
            self.total_landed_cost_import() / qty
        }
    }
}

struct CurrencyContext<'a> {
    shipment_currency: &'a str,
    worksheet_currency: &'a str,
    shipment_exchange_rate: Decimal,
}

impl CurrencyContext<'_> {
    /// Rate converting the component's currency into the worksheet currency.
    fn component_rate(&self, component: &CostComponent) -> Result<Decimal, DomainError> {
        if component.currency == self.worksheet_currency {
            return Ok(Decimal::ONE);
        }
        if component.currency == self.shipment_currency {
            let rate = component
                .exchange_rate
                .filter(|r| *r > Decimal::ZERO)
                .unwrap_or(self.shipment_exchange_rate);
            if rate <= Decimal::ZERO {
                return Err(DomainError::validation(
                    "set the shipment exchange rate to convert shipment-currency components",
                ));
            }
            return Ok(rate);
        }
        match component.exchange_rate {
            Some(rate) if rate > Decimal::ZERO => Ok(rate),
            _ => Err(DomainError::validation(format!(
                "provide an exchange rate for cost component '{}' ({} -> {})",
                component.name, component.currency, self.worksheet_currency
            ))),
        }
    }

    /// Convert an amount in the component's currency into (local, import).
    fn convert(
        &self,
        component: &CostComponent,
        amount: Decimal,
    ) -> Result<(Decimal, Decimal), DomainError> {
        let rate = self.component_rate(component)?;
        let local = amount * rate;

        let import = if component.currency == self.shipment_currency {
            amount
        } else if self.shipment_currency == self.worksheet_currency {
            local
        } else if self.shipment_exchange_rate > Decimal::ZERO {
            local / self.shipment_exchange_rate
        } else {
            Decimal::ZERO
        };

        Ok((local, import))
    }

    fn base_local(&self, base_import: Decimal) -> Result<Decimal, DomainError> {
        if self.shipment_currency == self.worksheet_currency {
            return Ok(base_import);
        }
        if self.shipment_exchange_rate <= Decimal::ZERO {
            return Err(DomainError::validation(
                "set the shipment exchange rate to convert goods value into the worksheet currency",
            ));
        }
        Ok(base_import * self.shipment_exchange_rate)
    }

    /// Base value for percent-of-CIF, in the component's own currency.
    fn cif_base_for(
        &self,
        component: &CostComponent,
        base_import: Decimal,
        base_local: Decimal,
    ) -> Result<Decimal, DomainError> {
        if component.currency == self.shipment_currency {
            return Ok(base_import);
        }
        if component.currency == self.worksheet_currency {
            return Ok(base_local);
        }
        let rate = self.component_rate(component)?;
        Ok(base_local / rate)
    }

    fn local_to_component(
        &self,
        component: &CostComponent,
        local_amount: Decimal,
    ) -> Result<Decimal, DomainError> {
        if component.currency == self.worksheet_currency {
            return Ok(local_amount);
        }
        let rate = self.component_rate(component)?;
        Ok(local_amount / rate)
    }
}

fn resolve_percent(component: &CostComponent) -> Result<Decimal, DomainError> {
    let percent = match component.percent {
        Some(p) => p,
        None if component.bucket == CostBucket::Tax => {
            tax_percent_for(&component.name).unwrap_or(Decimal::ZERO)
        }
        None => Decimal::ZERO,
    };
    if percent <= Decimal::ZERO {
        return Err(DomainError::validation(format!(
            "set a percent for component '{}'",
            component.name
        )));
    }
    Ok(percent)
}

/// Allocate all cost components across the shipment items.
pub fn allocate_costs(
    items: &[AllocationItem],
    components: &[CostComponent],
    method: AllocationMethod,
    shipment_currency: &str,
    worksheet_currency: &str,
    shipment_exchange_rate: Decimal,
) -> Result<CostBreakdown, DomainError> {
    let ctx = CurrencyContext {
        shipment_currency,
        worksheet_currency,
        shipment_exchange_rate,
    };

    let mut rows: Vec<ItemCostBreakdown> = Vec::with_capacity(items.len());
    for item in items {
        rows.push(ItemCostBreakdown {
            item_index: item.item_index,
            quantity: item.quantity,
            base_amount_import: item.base_amount_import,
            base_amount_local: ctx.base_local(item.base_amount_import)?,
            foreign_local: Decimal::ZERO,
            foreign_import: Decimal::ZERO,
            local_local: Decimal::ZERO,
            local_import: Decimal::ZERO,
            tax_local: Decimal::ZERO,
            tax_import: Decimal::ZERO,
        });
    }

    // Running per-item base for percent-of-landed-cost: goods value plus all
    // non-tax costs allocated so far.
    let mut subtotal_local: Vec<Decimal> = rows.iter().map(|r| r.base_amount_local).collect();
    let mut totals = CostTotals::default();

    // Foreign first, then local, then taxes.
    for bucket in [CostBucket::Foreign, CostBucket::Local] {
        for component in components.iter().filter(|c| c.bucket == bucket) {
            let shares =
                distribute(component, &rows, &subtotal_local, method, &ctx, false)?;
            for (position, local, import) in shares {
                let row = &mut rows[position];
                match bucket {
                    CostBucket::Foreign => {
                        row.foreign_local += local;
                        row.foreign_import += import;
                        totals.foreign_local += local;
                        totals.foreign_import += import;
                    }
                    CostBucket::Local => {
                        row.local_local += local;
                        row.local_import += import;
                        totals.local_local += local;
                        totals.local_import += import;
                    }
                    CostBucket::Tax => unreachable!(),
                }
                subtotal_local[position] += local;
            }
        }
    }

    for component in components.iter().filter(|c| c.bucket == CostBucket::Tax) {
        let shares = distribute(component, &rows, &subtotal_local, method, &ctx, true)?;
        for (position, local, import) in shares {
            let row = &mut rows[position];
            row.tax_local += local;
            row.tax_import += import;
            totals.tax_local += local;
            totals.tax_import += import;
        }
    }

    Ok(CostBreakdown { items: rows, totals })
}

/// Distribute one component; returns (row position, local amount, import
/// amount) triples.
fn distribute(
    component: &CostComponent,
    rows: &[ItemCostBreakdown],
    subtotal_local: &[Decimal],
    method: AllocationMethod,
    ctx: &CurrencyContext<'_>,
    is_tax: bool,
) -> Result<Vec<(usize, Decimal, Decimal)>, DomainError> {
    if is_tax && !component.scope.is_percentage() {
        return Err(DomainError::validation(format!(
            "tax component '{}' must use a percentage scope",
            component.name
        )));
    }

    let targets: Vec<usize> = match component.apply_to_item {
        Some(item_index) => {
            let position = rows
                .iter()
                .position(|r| r.item_index == item_index)
                .ok_or_else(|| {
                    DomainError::validation(format!(
                        "cost component '{}' references an unknown shipment item",
                        component.name
                    ))
                })?;
            vec![position]
        }
        None => (0..rows.len()).collect(),
    };
    if targets.is_empty() {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    match component.scope {
        CostScope::TotalAmount => {
            if component.amount <= Decimal::ZERO {
                return Ok(Vec::new());
            }
            let basis: Vec<Decimal> = targets
                .iter()
                .map(|&p| match method {
                    AllocationMethod::ByQuantity => rows[p].quantity,
                    AllocationMethod::ByValue => rows[p].base_amount_import,
                })
                .map(|v| v.max(Decimal::ZERO))
                .collect();
            let total_basis: Decimal = basis.iter().copied().sum();
            if total_basis.is_zero() {
                return Err(DomainError::validation(format!(
                    "cannot distribute component '{}' because the allocation basis is zero",
                    component.name
                )));
            }
            for (&position, share_basis) in targets.iter().zip(basis) {
                let amount = component.amount * share_basis / total_basis;
                let (local, import) = ctx.convert(component, amount)?;
                out.push((position, local, import));
            }
        }
        CostScope::PerTon => {
            if component.amount.is_zero() {
                return Ok(Vec::new());
            }
            for &position in &targets {
                let qty = rows[position].quantity;
                if qty.is_zero() {
                    continue;
                }
                let (local, import) = ctx.convert(component, component.amount * qty)?;
                out.push((position, local, import));
            }
        }
        CostScope::PerKg => {
            if component.amount.is_zero() {
                return Ok(Vec::new());
            }
            for &position in &targets {
                let qty_kg = rows[position].quantity * KG_PER_TON;
                if qty_kg.is_zero() {
                    continue;
                }
                let (local, import) = ctx.convert(component, component.amount * qty_kg)?;
                out.push((position, local, import));
            }
        }
        CostScope::PercentOfCif => {
            let percent = resolve_percent(component)?;
            for &position in &targets {
                let base = ctx.cif_base_for(
                    component,
                    rows[position].base_amount_import,
                    rows[position].base_amount_local,
                )?;
                let amount = base * percent / Decimal::ONE_HUNDRED;
                let (local, import) = ctx.convert(component, amount)?;
                out.push((position, local, import));
            }
        }
        CostScope::PercentOfLandedCost => {
            let percent = resolve_percent(component)?;
            for &position in &targets {
                let base = ctx.local_to_component(component, subtotal_local[position])?;
                let amount = base * percent / Decimal::ONE_HUNDRED;
                let (local, import) = ctx.convert(component, amount)?;
                out.push((position, local, import));
            }
        }
    }
    Ok(out)
}
