use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use plasticflow_catalog::{ProductId, Unit};
use plasticflow_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, QTY_TOLERANCE, TenantId,
    clamp_non_negative,
};
use plasticflow_events::Event;
use plasticflow_parties::PartyId;

/// Purchase order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseOrderId(pub AggregateId);

impl PurchaseOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PurchaseOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Purchase order fulfilment status.
///
/// `PartiallyReceived` and `Closed` are derived from line receipts, never set
/// directly by a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoStatus {
    Draft,
    Submitted,
    PartiallyReceived,
    Closed,
    Cancelled,
}

/// One ordered line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderLine {
    pub product_id: ProductId,
    pub uom: Unit,
    pub quantity: Decimal,
    /// Rate per UOM in the purchase currency.
    pub rate: Decimal,
    /// quantity * rate, in the purchase currency.
    pub amount: Decimal,
    pub received_qty: Decimal,
}

impl PurchaseOrderLine {
    pub fn pending_qty(&self) -> Decimal {
        clamp_non_negative(self.quantity - self.received_qty)
    }

    pub fn is_fully_received(&self) -> bool {
        self.quantity - self.received_qty <= QTY_TOLERANCE
    }
}

/// A line that still has quantity awaiting shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLine {
    pub line_index: usize,
    pub product_id: ProductId,
    pub uom: Unit,
    pub pending_qty: Decimal,
    pub rate: Decimal,
}

/// Aggregate root: PurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    tenant_id: Option<TenantId>,
    supplier_id: Option<PartyId>,
    purchase_currency: String,
    local_currency: String,
    exchange_rate: Decimal,
    order_date: Option<NaiveDate>,
    expected_shipment: Option<NaiveDate>,
    lines: Vec<PurchaseOrderLine>,
    status: PoStatus,
    version: u64,
    created: bool,
}

impl PurchaseOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PurchaseOrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            supplier_id: None,
            purchase_currency: String::new(),
            local_currency: String::new(),
            exchange_rate: Decimal::ONE,
            order_date: None,
            expected_shipment: None,
            lines: Vec::new(),
            status: PoStatus::Draft,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn supplier_id(&self) -> Option<PartyId> {
        self.supplier_id
    }

    pub fn status(&self) -> PoStatus {
        self.status
    }

    pub fn lines(&self) -> &[PurchaseOrderLine] {
        &self.lines
    }

    pub fn purchase_currency(&self) -> &str {
        &self.purchase_currency
    }

    pub fn local_currency(&self) -> &str {
        &self.local_currency
    }

    pub fn exchange_rate(&self) -> Decimal {
        self.exchange_rate
    }

    pub fn expected_shipment(&self) -> Option<NaiveDate> {
        self.expected_shipment
    }

    pub fn total_quantity(&self) -> Decimal {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Total in the purchase currency.
    pub fn total_amount(&self) -> Decimal {
        self.lines.iter().map(|l| l.amount).sum()
    }

    /// Total converted to the local currency at the order's exchange rate.
    pub fn total_amount_local(&self) -> Decimal {
        self.total_amount() * self.exchange_rate
    }

    /// Lines with remaining quantity, for drafting an import shipment.
    ///
    /// Returns an error when every line is already fully received.
    pub fn pending_lines(&self) -> Result<Vec<PendingLine>, DomainError> {
        let pending: Vec<PendingLine> = self
            .lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.pending_qty() > QTY_TOLERANCE)
            .map(|(line_index, line)| PendingLine {
                line_index,
                product_id: line.product_id,
                uom: line.uom.clone(),
                pending_qty: line.pending_qty(),
                rate: line.rate,
            })
            .collect();

        if pending.is_empty() {
            return Err(DomainError::invariant(
                "all purchase order lines are fully received",
            ));
        }
        Ok(pending)
    }

    /// Status implied by the current receipt quantities.
    fn derived_receipt_status(&self) -> PoStatus {
        let mut fully_received = true;
        let mut any_received = false;
        for line in &self.lines {
            if line.received_qty > QTY_TOLERANCE {
                any_received = true;
            }
            if !line.is_fully_received() {
                fully_received = false;
            }
        }

        if fully_received && any_received {
            PoStatus::Closed
        } else if any_received {
            PoStatus::PartiallyReceived
        } else {
            PoStatus::Submitted
        }
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// A line quantity drawn into a purchase order (untrusted input; clamped by
/// the aggregate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineReceipt {
    pub line_index: usize,
    pub quantity: Decimal,
}

/// Command: CreatePurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchaseOrder {
    pub tenant_id: TenantId,
    pub purchase_order_id: PurchaseOrderId,
    pub supplier_id: PartyId,
    pub purchase_currency: String,
    pub local_currency: String,
    /// Ignored (forced to 1) when currencies match; required positive
    /// otherwise.
    pub exchange_rate: Option<Decimal>,
    pub order_date: NaiveDate,
    pub expected_shipment: Option<NaiveDate>,
    pub lines: Vec<(ProductId, Unit, Decimal, Decimal)>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitPurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitPurchaseOrder {
    pub tenant_id: TenantId,
    pub purchase_order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordReceipt (shipment arrival drawing down ordered quantity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordReceipt {
    pub tenant_id: TenantId,
    pub purchase_order_id: PurchaseOrderId,
    pub receipts: Vec<LineReceipt>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RevertReceipt (shipment rolled back or cancelled).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertReceipt {
    pub tenant_id: TenantId,
    pub purchase_order_id: PurchaseOrderId,
    pub receipts: Vec<LineReceipt>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelPurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelPurchaseOrder {
    pub tenant_id: TenantId,
    pub purchase_order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderCommand {
    CreatePurchaseOrder(CreatePurchaseOrder),
    SubmitPurchaseOrder(SubmitPurchaseOrder),
    RecordReceipt(RecordReceipt),
    RevertReceipt(RevertReceipt),
    CancelPurchaseOrder(CancelPurchaseOrder),
}

/// Event: PurchaseOrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderCreated {
    pub tenant_id: TenantId,
    pub purchase_order_id: PurchaseOrderId,
    pub supplier_id: PartyId,
    pub purchase_currency: String,
    pub local_currency: String,
    pub exchange_rate: Decimal,
    pub order_date: NaiveDate,
    pub expected_shipment: Option<NaiveDate>,
    pub lines: Vec<PurchaseOrderLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderSubmitted {
    pub tenant_id: TenantId,
    pub purchase_order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReceiptRecorded.
///
/// Quantities are already clamped so that no line exceeds its ordered amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRecorded {
    pub tenant_id: TenantId,
    pub purchase_order_id: PurchaseOrderId,
    pub receipts: Vec<LineReceipt>,
    pub new_status: PoStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReceiptReverted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptReverted {
    pub tenant_id: TenantId,
    pub purchase_order_id: PurchaseOrderId,
    pub receipts: Vec<LineReceipt>,
    pub new_status: PoStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderCancelled {
    pub tenant_id: TenantId,
    pub purchase_order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderEvent {
    PurchaseOrderCreated(PurchaseOrderCreated),
    PurchaseOrderSubmitted(PurchaseOrderSubmitted),
    ReceiptRecorded(ReceiptRecorded),
    ReceiptReverted(ReceiptReverted),
    PurchaseOrderCancelled(PurchaseOrderCancelled),
}

impl Event for PurchaseOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(_) => "purchasing.order.created",
            PurchaseOrderEvent::PurchaseOrderSubmitted(_) => "purchasing.order.submitted",
            PurchaseOrderEvent::ReceiptRecorded(_) => "purchasing.order.receipt_recorded",
            PurchaseOrderEvent::ReceiptReverted(_) => "purchasing.order.receipt_reverted",
            PurchaseOrderEvent::PurchaseOrderCancelled(_) => "purchasing.order.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderSubmitted(e) => e.occurred_at,
            PurchaseOrderEvent::ReceiptRecorded(e) => e.occurred_at,
            PurchaseOrderEvent::ReceiptReverted(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PurchaseOrder {
    type Command = PurchaseOrderCommand;
    type Event = PurchaseOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => {
                self.id = e.purchase_order_id;
                self.tenant_id = Some(e.tenant_id);
                self.supplier_id = Some(e.supplier_id);
                self.purchase_currency = e.purchase_currency.clone();
                self.local_currency = e.local_currency.clone();
                self.exchange_rate = e.exchange_rate;
                self.order_date = Some(e.order_date);
                self.expected_shipment = e.expected_shipment;
                self.lines = e.lines.clone();
                self.status = PoStatus::Draft;
                self.created = true;
            }
            PurchaseOrderEvent::PurchaseOrderSubmitted(_) => {
                self.status = PoStatus::Submitted;
            }
            PurchaseOrderEvent::ReceiptRecorded(e) => {
                for receipt in &e.receipts {
                    if let Some(line) = self.lines.get_mut(receipt.line_index) {
                        line.received_qty += receipt.quantity;
                    }
                }
                self.status = e.new_status;
            }
            PurchaseOrderEvent::ReceiptReverted(e) => {
                for receipt in &e.receipts {
                    if let Some(line) = self.lines.get_mut(receipt.line_index) {
                        line.received_qty =
                            clamp_non_negative(line.received_qty - receipt.quantity);
                    }
                }
                self.status = e.new_status;
            }
            PurchaseOrderEvent::PurchaseOrderCancelled(_) => {
                self.status = PoStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseOrderCommand::CreatePurchaseOrder(cmd) => self.handle_create(cmd),
            PurchaseOrderCommand::SubmitPurchaseOrder(cmd) => self.handle_submit(cmd),
            PurchaseOrderCommand::RecordReceipt(cmd) => self.handle_record_receipt(cmd),
            PurchaseOrderCommand::RevertReceipt(cmd) => self.handle_revert_receipt(cmd),
            PurchaseOrderCommand::CancelPurchaseOrder(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl PurchaseOrder {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_order_id(&self, purchase_order_id: PurchaseOrderId) -> Result<(), DomainError> {
        if self.id != purchase_order_id {
            return Err(DomainError::invariant("purchase_order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_create(
        &self,
        cmd: &CreatePurchaseOrder,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase order already exists"));
        }

        if cmd.lines.is_empty() {
            return Err(DomainError::validation(
                "purchase order must have at least one line",
            ));
        }

        let purchase_currency = cmd.purchase_currency.trim().to_uppercase();
        let local_currency = cmd.local_currency.trim().to_uppercase();
        if purchase_currency.is_empty() || local_currency.is_empty() {
            return Err(DomainError::validation("currency codes cannot be empty"));
        }

        let exchange_rate = if purchase_currency == local_currency {
            Decimal::ONE
        } else {
            match cmd.exchange_rate {
                Some(rate) if rate > Decimal::ZERO => rate,
                _ => {
                    return Err(DomainError::validation(format!(
                        "set a positive exchange rate to convert {purchase_currency} to {local_currency}"
                    )));
                }
            }
        };

        let mut lines = Vec::with_capacity(cmd.lines.len());
        for (product_id, uom, quantity, rate) in &cmd.lines {
            if *quantity <= Decimal::ZERO {
                return Err(DomainError::validation("line quantity must be positive"));
            }
            if *rate < Decimal::ZERO {
                return Err(DomainError::validation("line rate cannot be negative"));
            }
            lines.push(PurchaseOrderLine {
                product_id: *product_id,
                uom: uom.clone(),
                quantity: *quantity,
                rate: *rate,
                amount: *quantity * *rate,
                received_qty: Decimal::ZERO,
            });
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderCreated(
            PurchaseOrderCreated {
                tenant_id: cmd.tenant_id,
                purchase_order_id: cmd.purchase_order_id,
                supplier_id: cmd.supplier_id,
                purchase_currency,
                local_currency,
                exchange_rate,
                order_date: cmd.order_date,
                expected_shipment: cmd.expected_shipment,
                lines,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_submit(
        &self,
        cmd: &SubmitPurchaseOrder,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_order_id(cmd.purchase_order_id)?;

        if self.status != PoStatus::Draft {
            return Err(DomainError::invariant(
                "only draft purchase orders can be submitted",
            ));
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderSubmitted(
            PurchaseOrderSubmitted {
                tenant_id: cmd.tenant_id,
                purchase_order_id: cmd.purchase_order_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_record_receipt(
        &self,
        cmd: &RecordReceipt,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_order_id(cmd.purchase_order_id)?;

        if !matches!(
            self.status,
            PoStatus::Submitted | PoStatus::PartiallyReceived
        ) {
            return Err(DomainError::invariant(
                "receipts can only be recorded against submitted purchase orders",
            ));
        }

        // Clamp each receipt so the line never exceeds its ordered quantity.
        let mut clamped = Vec::new();
        for receipt in &cmd.receipts {
            let line = self
                .lines
                .get(receipt.line_index)
                .ok_or_else(|| DomainError::validation("receipt references unknown line"))?;
            if receipt.quantity <= Decimal::ZERO {
                return Err(DomainError::validation("receipt quantity must be positive"));
            }
            let accepted = receipt.quantity.min(line.pending_qty());
            if accepted > QTY_TOLERANCE {
                clamped.push(LineReceipt {
                    line_index: receipt.line_index,
                    quantity: accepted,
                });
            }
        }

        if clamped.is_empty() {
            return Err(DomainError::invariant(
                "no pending quantity remains on the targeted lines",
            ));
        }

        // Derive status on a scratch copy to keep handle() pure.
        let mut preview = self.clone();
        for receipt in &clamped {
            preview.lines[receipt.line_index].received_qty += receipt.quantity;
        }
        let new_status = preview.derived_receipt_status();

        Ok(vec![PurchaseOrderEvent::ReceiptRecorded(ReceiptRecorded {
            tenant_id: cmd.tenant_id,
            purchase_order_id: cmd.purchase_order_id,
            receipts: clamped,
            new_status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_revert_receipt(
        &self,
        cmd: &RevertReceipt,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_order_id(cmd.purchase_order_id)?;

        if !matches!(
            self.status,
            PoStatus::Submitted | PoStatus::PartiallyReceived | PoStatus::Closed
        ) {
            return Err(DomainError::invariant(
                "receipts can only be reverted on submitted purchase orders",
            ));
        }

        let mut clamped = Vec::new();
        for receipt in &cmd.receipts {
            let line = self
                .lines
                .get(receipt.line_index)
                .ok_or_else(|| DomainError::validation("receipt references unknown line"))?;
            if receipt.quantity <= Decimal::ZERO {
                return Err(DomainError::validation("revert quantity must be positive"));
            }
            // Floor at zero: never revert more than was received.
            let accepted = receipt.quantity.min(line.received_qty);
            if accepted > QTY_TOLERANCE {
                clamped.push(LineReceipt {
                    line_index: receipt.line_index,
                    quantity: accepted,
                });
            }
        }

        if clamped.is_empty() {
            return Err(DomainError::invariant(
                "no received quantity remains to revert on the targeted lines",
            ));
        }

        let mut preview = self.clone();
        for receipt in &clamped {
            preview.lines[receipt.line_index].received_qty = clamp_non_negative(
                preview.lines[receipt.line_index].received_qty - receipt.quantity,
            );
        }
        let new_status = preview.derived_receipt_status();

        Ok(vec![PurchaseOrderEvent::ReceiptReverted(ReceiptReverted {
            tenant_id: cmd.tenant_id,
            purchase_order_id: cmd.purchase_order_id,
            receipts: clamped,
            new_status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(
        &self,
        cmd: &CancelPurchaseOrder,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_order_id(cmd.purchase_order_id)?;

        match self.status {
            PoStatus::Cancelled => {
                return Err(DomainError::conflict("purchase order is already cancelled"));
            }
            PoStatus::PartiallyReceived | PoStatus::Closed => {
                return Err(DomainError::invariant(
                    "purchase orders with receipts cannot be cancelled",
                ));
            }
            PoStatus::Draft | PoStatus::Submitted => {}
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderCancelled(
            PurchaseOrderCancelled {
                tenant_id: cmd.tenant_id,
                purchase_order_id: cmd.purchase_order_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plasticflow_core::AggregateId;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_order_id() -> PurchaseOrderId {
        PurchaseOrderId::new(AggregateId::new())
    }

    fn test_product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn create_cmd(tenant_id: TenantId, order_id: PurchaseOrderId) -> CreatePurchaseOrder {
        CreatePurchaseOrder {
            tenant_id,
            purchase_order_id: order_id,
            supplier_id: PartyId::new(AggregateId::new()),
            purchase_currency: "usd".to_string(),
            local_currency: "BDT".to_string(),
            exchange_rate: Some(Decimal::new(11050, 2)), // 110.50
            order_date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            expected_shipment: NaiveDate::from_ymd_opt(2024, 4, 15),
            lines: vec![
                (test_product_id(), Unit::Ton, Decimal::new(100, 0), Decimal::new(950, 0)),
                (test_product_id(), Unit::Ton, Decimal::new(50, 0), Decimal::new(1020, 0)),
            ],
            occurred_at: Utc::now(),
        }
    }

    fn created_order(tenant_id: TenantId, order_id: PurchaseOrderId) -> PurchaseOrder {
        let mut order = PurchaseOrder::empty(order_id);
        let events = order
            .handle(&PurchaseOrderCommand::CreatePurchaseOrder(create_cmd(
                tenant_id, order_id,
            )))
            .unwrap();
        order.apply(&events[0]);
        order
    }

    fn submitted_order(tenant_id: TenantId, order_id: PurchaseOrderId) -> PurchaseOrder {
        let mut order = created_order(tenant_id, order_id);
        let events = order
            .handle(&PurchaseOrderCommand::SubmitPurchaseOrder(
                SubmitPurchaseOrder {
                    tenant_id,
                    purchase_order_id: order_id,
                    occurred_at: Utc::now(),
                },
            ))
            .unwrap();
        order.apply(&events[0]);
        order
    }

    #[test]
    fn create_normalizes_currency_codes_and_computes_amounts() {
        let tenant_id = test_tenant_id();
        let order_id = test_order_id();
        let order = created_order(tenant_id, order_id);

        assert_eq!(order.purchase_currency(), "USD");
        assert_eq!(order.local_currency(), "BDT");
        assert_eq!(order.lines()[0].amount, Decimal::new(95_000, 0));
        assert_eq!(order.total_quantity(), Decimal::new(150, 0));
        assert_eq!(order.total_amount(), Decimal::new(146_000, 0));
        assert_eq!(
            order.total_amount_local(),
            Decimal::new(146_000, 0) * Decimal::new(11050, 2)
        );
        assert_eq!(order.status(), PoStatus::Draft);
    }

    #[test]
    fn create_defaults_exchange_rate_when_currencies_match() {
        let mut cmd = create_cmd(test_tenant_id(), test_order_id());
        cmd.purchase_currency = "BDT".to_string();
        cmd.exchange_rate = None;

        let order = PurchaseOrder::empty(cmd.purchase_order_id);
        let events = order
            .handle(&PurchaseOrderCommand::CreatePurchaseOrder(cmd))
            .unwrap();
        match &events[0] {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => {
                assert_eq!(e.exchange_rate, Decimal::ONE);
            }
            _ => panic!("Expected PurchaseOrderCreated event"),
        }
    }

    #[test]
    fn create_rejects_missing_exchange_rate_for_foreign_currency() {
        let mut cmd = create_cmd(test_tenant_id(), test_order_id());
        cmd.exchange_rate = None;

        let order = PurchaseOrder::empty(cmd.purchase_order_id);
        let err = order
            .handle(&PurchaseOrderCommand::CreatePurchaseOrder(cmd))
            .unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for missing exchange rate"),
        }
    }

    #[test]
    fn create_rejects_non_positive_quantities() {
        let mut cmd = create_cmd(test_tenant_id(), test_order_id());
        cmd.lines[0].2 = Decimal::ZERO;

        let order = PurchaseOrder::empty(cmd.purchase_order_id);
        let err = order
            .handle(&PurchaseOrderCommand::CreatePurchaseOrder(cmd))
            .unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for zero quantity"),
        }
    }

    #[test]
    fn create_rejects_empty_lines() {
        let mut cmd = create_cmd(test_tenant_id(), test_order_id());
        cmd.lines.clear();

        let order = PurchaseOrder::empty(cmd.purchase_order_id);
        let err = order
            .handle(&PurchaseOrderCommand::CreatePurchaseOrder(cmd))
            .unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for empty lines"),
        }
    }

    #[test]
    fn receipt_moves_submitted_order_to_partially_received() {
        let tenant_id = test_tenant_id();
        let order_id = test_order_id();
        let mut order = submitted_order(tenant_id, order_id);

        let events = order
            .handle(&PurchaseOrderCommand::RecordReceipt(RecordReceipt {
                tenant_id,
                purchase_order_id: order_id,
                receipts: vec![LineReceipt {
                    line_index: 0,
                    quantity: Decimal::new(40, 0),
                }],
                occurred_at: Utc::now(),
            }))
            .unwrap();
        order.apply(&events[0]);

        assert_eq!(order.status(), PoStatus::PartiallyReceived);
        assert_eq!(order.lines()[0].received_qty, Decimal::new(40, 0));
        assert_eq!(order.lines()[0].pending_qty(), Decimal::new(60, 0));
    }

    #[test]
    fn receipt_is_clamped_to_ordered_quantity() {
        let tenant_id = test_tenant_id();
        let order_id = test_order_id();
        let mut order = submitted_order(tenant_id, order_id);

        let events = order
            .handle(&PurchaseOrderCommand::RecordReceipt(RecordReceipt {
                tenant_id,
                purchase_order_id: order_id,
                receipts: vec![LineReceipt {
                    line_index: 0,
                    quantity: Decimal::new(500, 0), // ordered only 100
                }],
                occurred_at: Utc::now(),
            }))
            .unwrap();

        match &events[0] {
            PurchaseOrderEvent::ReceiptRecorded(e) => {
                assert_eq!(e.receipts[0].quantity, Decimal::new(100, 0));
            }
            _ => panic!("Expected ReceiptRecorded event"),
        }
        order.apply(&events[0]);
        assert_eq!(order.lines()[0].received_qty, Decimal::new(100, 0));
    }

    #[test]
    fn fully_receiving_all_lines_closes_the_order() {
        let tenant_id = test_tenant_id();
        let order_id = test_order_id();
        let mut order = submitted_order(tenant_id, order_id);

        let events = order
            .handle(&PurchaseOrderCommand::RecordReceipt(RecordReceipt {
                tenant_id,
                purchase_order_id: order_id,
                receipts: vec![
                    LineReceipt {
                        line_index: 0,
                        quantity: Decimal::new(100, 0),
                    },
                    LineReceipt {
                        line_index: 1,
                        quantity: Decimal::new(50, 0),
                    },
                ],
                occurred_at: Utc::now(),
            }))
            .unwrap();
        order.apply(&events[0]);

        assert_eq!(order.status(), PoStatus::Closed);
        assert!(order.pending_lines().is_err());
    }

    #[test]
    fn revert_receipt_reopens_a_closed_order() {
        let tenant_id = test_tenant_id();
        let order_id = test_order_id();
        let mut order = submitted_order(tenant_id, order_id);

        let events = order
            .handle(&PurchaseOrderCommand::RecordReceipt(RecordReceipt {
                tenant_id,
                purchase_order_id: order_id,
                receipts: vec![
                    LineReceipt {
                        line_index: 0,
                        quantity: Decimal::new(100, 0),
                    },
                    LineReceipt {
                        line_index: 1,
                        quantity: Decimal::new(50, 0),
                    },
                ],
                occurred_at: Utc::now(),
            }))
            .unwrap();
        order.apply(&events[0]);
        assert_eq!(order.status(), PoStatus::Closed);

        let events = order
            .handle(&PurchaseOrderCommand::RevertReceipt(RevertReceipt {
                tenant_id,
                purchase_order_id: order_id,
                receipts: vec![LineReceipt {
                    line_index: 0,
                    quantity: Decimal::new(30, 0),
                }],
                occurred_at: Utc::now(),
            }))
            .unwrap();
        order.apply(&events[0]);

        assert_eq!(order.status(), PoStatus::PartiallyReceived);
        assert_eq!(order.lines()[0].received_qty, Decimal::new(70, 0));
    }

    #[test]
    fn revert_is_floored_at_zero_received() {
        let tenant_id = test_tenant_id();
        let order_id = test_order_id();
        let mut order = submitted_order(tenant_id, order_id);

        let events = order
            .handle(&PurchaseOrderCommand::RecordReceipt(RecordReceipt {
                tenant_id,
                purchase_order_id: order_id,
                receipts: vec![LineReceipt {
                    line_index: 0,
                    quantity: Decimal::new(20, 0),
                }],
                occurred_at: Utc::now(),
            }))
            .unwrap();
        order.apply(&events[0]);

        let events = order
            .handle(&PurchaseOrderCommand::RevertReceipt(RevertReceipt {
                tenant_id,
                purchase_order_id: order_id,
                receipts: vec![LineReceipt {
                    line_index: 0,
                    quantity: Decimal::new(75, 0), // only 20 received
                }],
                occurred_at: Utc::now(),
            }))
            .unwrap();

        match &events[0] {
            PurchaseOrderEvent::ReceiptReverted(e) => {
                assert_eq!(e.receipts[0].quantity, Decimal::new(20, 0));
                assert_eq!(e.new_status, PoStatus::Submitted);
            }
            _ => panic!("Expected ReceiptReverted event"),
        }
        order.apply(&events[0]);
        assert_eq!(order.lines()[0].received_qty, Decimal::ZERO);
    }

    #[test]
    fn receipt_rejected_on_draft_order() {
        let tenant_id = test_tenant_id();
        let order_id = test_order_id();
        let order = created_order(tenant_id, order_id);

        let err = order
            .handle(&PurchaseOrderCommand::RecordReceipt(RecordReceipt {
                tenant_id,
                purchase_order_id: order_id,
                receipts: vec![LineReceipt {
                    line_index: 0,
                    quantity: Decimal::new(10, 0),
                }],
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(_) => {}
            _ => panic!("Expected InvariantViolation error for draft order receipt"),
        }
    }

    #[test]
    fn pending_lines_exposes_remaining_quantities() {
        let tenant_id = test_tenant_id();
        let order_id = test_order_id();
        let mut order = submitted_order(tenant_id, order_id);

        let events = order
            .handle(&PurchaseOrderCommand::RecordReceipt(RecordReceipt {
                tenant_id,
                purchase_order_id: order_id,
                receipts: vec![LineReceipt {
                    line_index: 0,
                    quantity: Decimal::new(100, 0),
                }],
                occurred_at: Utc::now(),
            }))
            .unwrap();
        order.apply(&events[0]);

        let pending = order.pending_lines().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].line_index, 1);
        assert_eq!(pending[0].pending_qty, Decimal::new(50, 0));
    }

    #[test]
    fn cancel_rejected_once_receipts_exist() {
        let tenant_id = test_tenant_id();
        let order_id = test_order_id();
        let mut order = submitted_order(tenant_id, order_id);

        let events = order
            .handle(&PurchaseOrderCommand::RecordReceipt(RecordReceipt {
                tenant_id,
                purchase_order_id: order_id,
                receipts: vec![LineReceipt {
                    line_index: 0,
                    quantity: Decimal::new(5, 0),
                }],
                occurred_at: Utc::now(),
            }))
            .unwrap();
        order.apply(&events[0]);

        let err = order
            .handle(&PurchaseOrderCommand::CancelPurchaseOrder(
                CancelPurchaseOrder {
                    tenant_id,
                    purchase_order_id: order_id,
                    occurred_at: Utc::now(),
                },
            ))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(_) => {}
            _ => panic!("Expected InvariantViolation error for cancel after receipt"),
        }
    }

    #[test]
    fn cancel_succeeds_on_submitted_order_without_receipts() {
        let tenant_id = test_tenant_id();
        let order_id = test_order_id();
        let mut order = submitted_order(tenant_id, order_id);

        let events = order
            .handle(&PurchaseOrderCommand::CancelPurchaseOrder(
                CancelPurchaseOrder {
                    tenant_id,
                    purchase_order_id: order_id,
                    occurred_at: Utc::now(),
                },
            ))
            .unwrap();
        order.apply(&events[0]);

        assert_eq!(order.status(), PoStatus::Cancelled);
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Received quantity never exceeds ordered quantity, whatever is
            /// requested.
            #[test]
            fn received_never_exceeds_ordered(raw_qty in 1i64..100_000) {
                let tenant_id = test_tenant_id();
                let order_id = test_order_id();
                let mut order = submitted_order(tenant_id, order_id);

                let result = order.handle(&PurchaseOrderCommand::RecordReceipt(RecordReceipt {
                    tenant_id,
                    purchase_order_id: order_id,
                    receipts: vec![LineReceipt {
                        line_index: 0,
                        quantity: Decimal::new(raw_qty, 1),
                    }],
                    occurred_at: Utc::now(),
                }));

                if let Ok(events) = result {
                    order.apply(&events[0]);
                }
                prop_assert!(order.lines()[0].received_qty <= order.lines()[0].quantity);
            }
        }
    }
}
