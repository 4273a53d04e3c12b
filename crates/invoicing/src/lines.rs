//! Proportional invoice line builder.
//!
//! Invoice lines are scaled down from the sales order lines by the ratio of
//! the invoiced amount to the order total. The final line absorbs rounding
//! drift so the invoice total matches the requested amount exactly (within
//! the payment tolerance).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use plasticflow_catalog::{ProductId, Unit};
use plasticflow_core::{DomainError, DomainResult, PAYMENT_TOLERANCE};
use plasticflow_sales::SalesOrderLine;

/// One invoice line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub product_id: ProductId,
    pub uom: Unit,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub amount: Decimal,
}

/// Build invoice lines worth `amount` from the order lines.
pub fn build_invoice_lines(
    order_lines: &[SalesOrderLine],
    amount: Decimal,
) -> DomainResult<Vec<InvoiceLine>> {
    if amount <= Decimal::ZERO {
        return Err(DomainError::validation(
            "invoice amount must be greater than zero",
        ));
    }

    let order_total: Decimal = order_lines.iter().map(|l| l.amount).sum();
    let ratio = if order_total <= PAYMENT_TOLERANCE {
        Decimal::ONE
    } else {
        (amount / order_total).min(Decimal::ONE)
    };

    let mut lines: Vec<InvoiceLine> = order_lines
        .iter()
        .filter(|line| line.quantity > Decimal::ZERO)
        .map(|line| {
            let quantity = line.quantity * ratio;
            InvoiceLine {
                product_id: line.product_id,
                uom: line.uom.clone(),
                quantity,
                rate: line.rate,
                amount: quantity * line.rate,
            }
        })
        .collect();

    if lines.is_empty() {
        return Err(DomainError::validation(
            "the sales order has no lines with quantities to invoice",
        ));
    }

    // Push rounding drift into the last line.
    let total: Decimal = lines.iter().map(|l| l.amount).sum();
    let difference = amount - total;
    if difference.abs() > PAYMENT_TOLERANCE {
        let last = lines.last_mut().unwrap();
        if !last.rate.is_zero() {
            last.quantity += difference / last.rate;
        } else if !last.quantity.is_zero() {
            last.rate = (last.amount + difference) / last.quantity;
        }
        last.amount = last.quantity * last.rate;
    }

    let total: Decimal = lines.iter().map(|l| l.amount).sum();
    if (amount - total).abs() > PAYMENT_TOLERANCE {
        return Err(DomainError::validation(
            "unable to allocate invoice lines for the requested amount",
        ));
    }

    Ok(lines)
}
