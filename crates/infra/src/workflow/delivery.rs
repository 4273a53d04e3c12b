//! Delivery workflow: delivery notes issuing the reserved stock and closing
//! out the sales order and its gate pass.

use chrono::{NaiveDate, Utc};
use serde_json::Value as JsonValue;

use plasticflow_core::TenantId;
use plasticflow_events::{EventBus, EventEnvelope};
use plasticflow_inventory::{IssueStock, ReverseIssue, StockEntry, StockEntryCommand, StockEntryId};
use plasticflow_logistics::{
    CancelDeliveryNote, CloseGatePass, ConfirmDelivery, CreateDeliveryNote, DeliveryNote,
    DeliveryNoteCommand, DeliveryNoteId, DeliveryNoteLine, DeliveryStatus, GatePass,
    GatePassCommand, GatePassId, GatePassStatus, ReopenGatePass, SubmitDeliveryNote,
};
use plasticflow_sales::{
    BatchRef, CompleteDelivery, OrderStatus, ReverseDelivery, SalesOrder, SalesOrderCommand,
    SalesOrderId,
};

use super::{WorkflowEngine, aggregate_types, lot_slot};
use crate::command_dispatcher::DispatchError;
use crate::event_store::{EventStore, StoredEvent};

impl<S, B> WorkflowEngine<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub(crate) fn load_delivery_note(
        &self,
        tenant_id: TenantId,
        delivery_note_id: DeliveryNoteId,
    ) -> Result<DeliveryNote, DispatchError> {
        self.dispatcher()
            .load(tenant_id, delivery_note_id.0, |_, id| {
                DeliveryNote::empty(DeliveryNoteId::new(id))
            })
    }

    /// Draft a delivery note from a ready-for-delivery order's lines.
    pub fn create_delivery_note(
        &self,
        tenant_id: TenantId,
        delivery_note_id: DeliveryNoteId,
        order_id: SalesOrderId,
        delivery_date: Option<NaiveDate>,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let order = self.load_sales_order(tenant_id, order_id)?;
        if order.status() != OrderStatus::ReadyForDelivery {
            return Err(DispatchError::InvariantViolation(
                "sales order is not ready for delivery".to_string(),
            ));
        }
        let gate_pass = order
            .gate_pass()
            .map(GatePassId::new)
            .ok_or(DispatchError::NotFound)?;

        let lines: Vec<DeliveryNoteLine> = order
            .lines()
            .iter()
            .map(|l| DeliveryNoteLine {
                product_id: l.product_id,
                uom: l.uom.clone(),
                quantity: l.quantity,
                batch: l.batch,
                warehouse: l.warehouse,
            })
            .collect();

        self.dispatcher().dispatch(
            tenant_id,
            delivery_note_id.0,
            aggregate_types::DELIVERY_NOTE,
            DeliveryNoteCommand::CreateDeliveryNote(CreateDeliveryNote {
                tenant_id,
                delivery_note_id,
                sales_order: order_id,
                gate_pass,
                lines,
                delivery_date,
                occurred_at: Utc::now(),
            }),
            |_, id| DeliveryNote::empty(DeliveryNoteId::new(id)),
        )
    }

    /// Dispatch the goods: issue every batch-pinned line from its lot, mark
    /// the order delivered, and close the gate pass.
    ///
    /// The gate pass must have been issued at the gate first.
    pub fn submit_delivery_note(
        &self,
        tenant_id: TenantId,
        delivery_note_id: DeliveryNoteId,
    ) -> Result<(), DispatchError> {
        let note = self.load_delivery_note(tenant_id, delivery_note_id)?;
        let order_id = note.sales_order().ok_or(DispatchError::NotFound)?;
        let gate_pass_id = note.gate_pass().ok_or(DispatchError::NotFound)?;

        let gate_pass = self.load_gate_pass(tenant_id, gate_pass_id)?;
        if gate_pass.status() != GatePassStatus::Issued {
            return Err(DispatchError::InvariantViolation(
                "gate pass must be issued before the delivery note is submitted".to_string(),
            ));
        }

        let now = Utc::now();
        self.dispatcher().dispatch(
            tenant_id,
            delivery_note_id.0,
            aggregate_types::DELIVERY_NOTE,
            DeliveryNoteCommand::SubmitDeliveryNote(SubmitDeliveryNote {
                tenant_id,
                delivery_note_id,
                occurred_at: now,
            }),
            |_, id| DeliveryNote::empty(DeliveryNoteId::new(id)),
        )?;

        for (batch, quantity) in batch_lines(&note) {
            self.dispatcher().dispatch(
                tenant_id,
                batch.entry_id.0,
                aggregate_types::STOCK_ENTRY,
                StockEntryCommand::IssueStock(IssueStock {
                    tenant_id,
                    entry_id: batch.entry_id,
                    line_index: batch.line_index,
                    quantity,
                    occurred_at: now,
                }),
                |_, id| StockEntry::empty(StockEntryId::new(id)),
            )?;
            let entry = self.load_stock_entry(tenant_id, batch.entry_id)?;
            if let Some(item) = entry.items().get(batch.line_index) {
                let slot = lot_slot(&entry, item.product_id)?;
                self.mutate_ledger(tenant_id, |ledger| ledger.issue(slot, quantity, now))?;
            }
        }

        self.dispatcher().dispatch(
            tenant_id,
            order_id.0,
            aggregate_types::SALES_ORDER,
            SalesOrderCommand::CompleteDelivery(CompleteDelivery {
                tenant_id,
                order_id,
                occurred_at: now,
            }),
            |_, id| SalesOrder::empty(SalesOrderId::new(id)),
        )?;

        self.dispatcher().dispatch(
            tenant_id,
            gate_pass_id.0,
            aggregate_types::GATE_PASS,
            GatePassCommand::CloseGatePass(CloseGatePass {
                tenant_id,
                gate_pass_id,
                occurred_at: now,
            }),
            |_, id| GatePass::empty(GatePassId::new(id)),
        )?;
        Ok(())
    }

    pub fn confirm_delivery(&self, cmd: ConfirmDelivery) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher().dispatch(
            cmd.tenant_id,
            cmd.delivery_note_id.0,
            aggregate_types::DELIVERY_NOTE,
            DeliveryNoteCommand::ConfirmDelivery(cmd.clone()),
            |_, id| DeliveryNote::empty(DeliveryNoteId::new(id)),
        )
    }

    /// Cancel a delivery note. A note that already issued stock reverses the
    /// issues, reopens the order, and reopens its gate pass.
    pub fn cancel_delivery_note(
        &self,
        tenant_id: TenantId,
        delivery_note_id: DeliveryNoteId,
    ) -> Result<(), DispatchError> {
        let note = self.load_delivery_note(tenant_id, delivery_note_id)?;
        let was_dispatched = matches!(
            note.status(),
            DeliveryStatus::InTransit | DeliveryStatus::Delivered
        );
        let now = Utc::now();

        self.dispatcher().dispatch(
            tenant_id,
            delivery_note_id.0,
            aggregate_types::DELIVERY_NOTE,
            DeliveryNoteCommand::CancelDeliveryNote(CancelDeliveryNote {
                tenant_id,
                delivery_note_id,
                occurred_at: now,
            }),
            |_, id| DeliveryNote::empty(DeliveryNoteId::new(id)),
        )?;

        if !was_dispatched {
            return Ok(());
        }

        for (batch, quantity) in batch_lines(&note) {
            self.dispatcher().dispatch(
                tenant_id,
                batch.entry_id.0,
                aggregate_types::STOCK_ENTRY,
                StockEntryCommand::ReverseIssue(ReverseIssue {
                    tenant_id,
                    entry_id: batch.entry_id,
                    line_index: batch.line_index,
                    quantity,
                    occurred_at: now,
                }),
                |_, id| StockEntry::empty(StockEntryId::new(id)),
            )?;
            let entry = self.load_stock_entry(tenant_id, batch.entry_id)?;
            if let Some(item) = entry.items().get(batch.line_index) {
                let slot = lot_slot(&entry, item.product_id)?;
                self.mutate_ledger(tenant_id, |ledger| ledger.reverse_issue(slot, quantity, now))?;
            }
        }

        if let Some(order_id) = note.sales_order() {
            self.dispatcher().dispatch(
                tenant_id,
                order_id.0,
                aggregate_types::SALES_ORDER,
                SalesOrderCommand::ReverseDelivery(ReverseDelivery {
                    tenant_id,
                    order_id,
                    occurred_at: now,
                }),
                |_, id| SalesOrder::empty(SalesOrderId::new(id)),
            )?;
        }
        if let Some(gate_pass_id) = note.gate_pass() {
            self.dispatcher().dispatch(
                tenant_id,
                gate_pass_id.0,
                aggregate_types::GATE_PASS,
                GatePassCommand::ReopenGatePass(ReopenGatePass {
                    tenant_id,
                    gate_pass_id,
                    occurred_at: now,
                }),
                |_, id| GatePass::empty(GatePassId::new(id)),
            )?;
        }
        Ok(())
    }
}

/// Batch-pinned note lines as (batch, quantity) pairs.
fn batch_lines(note: &DeliveryNote) -> Vec<(BatchRef, rust_decimal::Decimal)> {
    note.lines()
        .iter()
        .filter_map(|l| l.batch.map(|b| (b, l.quantity)))
        .collect()
}
