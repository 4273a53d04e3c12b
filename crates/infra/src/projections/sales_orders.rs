//! Sales order board: one summary row per order, grouped by status on query.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use plasticflow_core::{TenantId, clamp_non_negative};
use plasticflow_events::EventEnvelope;
use plasticflow_parties::PartyId;
use plasticflow_sales::{OrderStatus, SalesOrderEvent, SalesOrderId, SalesType};

use super::{ProjectionError, StreamCursors};
use crate::read_model::TenantStore;

/// Read model record for one sales order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesOrderSummary {
    pub order_id: SalesOrderId,
    pub customer: PartyId,
    pub sales_type: SalesType,
    pub currency: String,
    pub status: OrderStatus,
    pub total_quantity: Decimal,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub invoiced_amount: Decimal,
    pub outstanding_amount: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Sales order projection over `SalesOrderEvent` streams.
#[derive(Debug)]
pub struct SalesOrdersProjection<S>
where
    S: TenantStore<SalesOrderId, SalesOrderSummary>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> SalesOrdersProjection<S>
where
    S: TenantStore<SalesOrderId, SalesOrderSummary>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, order_id: &SalesOrderId) -> Option<SalesOrderSummary> {
        self.store.get(tenant_id, order_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<SalesOrderSummary> {
        let mut rows = self.store.list(tenant_id);
        rows.sort_by_key(|r| *r.order_id.0.as_uuid().as_bytes());
        rows
    }

    pub fn by_status(&self, tenant_id: TenantId, status: OrderStatus) -> Vec<SalesOrderSummary> {
        self.list(tenant_id)
            .into_iter()
            .filter(|r| r.status == status)
            .collect()
    }

    /// Orders past draft that are neither completed nor cancelled.
    pub fn open_orders(&self, tenant_id: TenantId) -> Vec<SalesOrderSummary> {
        self.list(tenant_id)
            .into_iter()
            .filter(|r| {
                !matches!(
                    r.status,
                    OrderStatus::Draft | OrderStatus::Completed | OrderStatus::Cancelled
                )
            })
            .collect()
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();

        self.cursors
            .advance(tenant_id, aggregate_id, envelope.sequence_number(), || {
                let event: SalesOrderEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

                let (event_tenant, order_id) = sales_order_event_ids(&event);
                if event_tenant != tenant_id {
                    return Err(ProjectionError::TenantIsolation(
                        "event tenant_id does not match envelope tenant_id".to_string(),
                    ));
                }
                if order_id.0 != aggregate_id {
                    return Err(ProjectionError::TenantIsolation(
                        "event order_id does not match envelope aggregate_id".to_string(),
                    ));
                }

                self.apply_event(tenant_id, order_id, &event);
                Ok(())
            })
    }

    fn apply_event(&self, tenant_id: TenantId, order_id: SalesOrderId, event: &SalesOrderEvent) {
        match event {
            SalesOrderEvent::SalesOrderCreated(e) => {
                let total_amount: Decimal = e.lines.iter().map(|l| l.amount).sum();
                let total_quantity: Decimal = e.lines.iter().map(|l| l.quantity).sum();
                self.store.upsert(
                    tenant_id,
                    order_id,
                    SalesOrderSummary {
                        order_id,
                        customer: e.customer,
                        sales_type: e.sales_type,
                        currency: e.currency.clone(),
                        status: OrderStatus::Draft,
                        total_quantity,
                        total_amount,
                        paid_amount: Decimal::ZERO,
                        invoiced_amount: Decimal::ZERO,
                        outstanding_amount: total_amount,
                        updated_at: e.occurred_at,
                    },
                );
            }
            SalesOrderEvent::PaymentSlipAdded(e) => {
                self.update(tenant_id, order_id, |row| {
                    row.paid_amount += e.slip.amount_paid;
                    row.status = e.new_status;
                    row.updated_at = e.occurred_at;
                });
            }
            SalesOrderEvent::SalesOrderSubmitted(e) => {
                self.update(tenant_id, order_id, |row| {
                    row.status = e.new_status;
                    row.updated_at = e.occurred_at;
                });
            }
            SalesOrderEvent::InvoicingProgressRecorded(e) => {
                self.update(tenant_id, order_id, |row| {
                    row.invoiced_amount = e.invoiced_amount;
                    row.outstanding_amount =
                        clamp_non_negative(row.total_amount - e.invoiced_amount);
                    row.status = e.new_status;
                    row.updated_at = e.occurred_at;
                });
            }
            SalesOrderEvent::GatePassAttached(e) => {
                self.update(tenant_id, order_id, |row| {
                    row.status = OrderStatus::ReadyForDelivery;
                    row.updated_at = e.occurred_at;
                });
            }
            SalesOrderEvent::DeliveryCompleted(e) => {
                self.update(tenant_id, order_id, |row| {
                    row.status = OrderStatus::Completed;
                    row.updated_at = e.occurred_at;
                });
            }
            SalesOrderEvent::DeliveryReversed(e) => {
                self.update(tenant_id, order_id, |row| {
                    row.status = OrderStatus::ReadyForDelivery;
                    row.updated_at = e.occurred_at;
                });
            }
            SalesOrderEvent::SalesOrderCancelled(e) => {
                self.update(tenant_id, order_id, |row| {
                    row.status = OrderStatus::Cancelled;
                    row.updated_at = e.occurred_at;
                });
            }
        }
    }

    fn update(
        &self,
        tenant_id: TenantId,
        order_id: SalesOrderId,
        f: impl FnOnce(&mut SalesOrderSummary),
    ) {
        if let Some(mut row) = self.store.get(tenant_id, &order_id) {
            f(&mut row);
            self.store.upsert(tenant_id, order_id, row);
        }
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.cursors.reset();

        let mut envs: Vec<_> = envelopes.into_iter().collect();

        let mut tenants = envs.iter().map(|e| e.tenant_id()).collect::<Vec<_>>();
        tenants.sort_by_key(|t| *t.as_uuid().as_bytes());
        tenants.dedup();
        for t in tenants {
            self.store.clear_tenant(t);
        }

        envs.sort_by_key(|e| {
            (
                *e.tenant_id().as_uuid().as_bytes(),
                *e.aggregate_id().as_uuid().as_bytes(),
                e.sequence_number(),
            )
        });

        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}

fn sales_order_event_ids(event: &SalesOrderEvent) -> (TenantId, SalesOrderId) {
    match event {
        SalesOrderEvent::SalesOrderCreated(e) => (e.tenant_id, e.order_id),
        SalesOrderEvent::PaymentSlipAdded(e) => (e.tenant_id, e.order_id),
        SalesOrderEvent::SalesOrderSubmitted(e) => (e.tenant_id, e.order_id),
        SalesOrderEvent::InvoicingProgressRecorded(e) => (e.tenant_id, e.order_id),
        SalesOrderEvent::GatePassAttached(e) => (e.tenant_id, e.order_id),
        SalesOrderEvent::DeliveryCompleted(e) => (e.tenant_id, e.order_id),
        SalesOrderEvent::DeliveryReversed(e) => (e.tenant_id, e.order_id),
        SalesOrderEvent::SalesOrderCancelled(e) => (e.tenant_id, e.order_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use plasticflow_catalog::{ProductId, Unit, WarehouseId};
    use plasticflow_core::AggregateId;
    use plasticflow_sales::{
        DeliverySource, PaymentSlip, SalesOrderCreated, SalesOrderLine, SalesOrderSubmitted,
    };
    use std::sync::Arc;
    use uuid::Uuid;

    use crate::read_model::InMemoryTenantStore;

    type Store = Arc<InMemoryTenantStore<SalesOrderId, SalesOrderSummary>>;

    fn projection() -> SalesOrdersProjection<Store> {
        SalesOrdersProjection::new(Arc::new(InMemoryTenantStore::new()))
    }

    fn envelope(
        tenant: TenantId,
        order_id: SalesOrderId,
        seq: u64,
        event: &SalesOrderEvent,
    ) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant,
            order_id.0,
            "sales_order",
            seq,
            Utc::now(),
            serde_json::to_value(event).unwrap(),
        )
    }

    fn created(tenant: TenantId, order_id: SalesOrderId, sales_type: SalesType) -> SalesOrderEvent {
        SalesOrderEvent::SalesOrderCreated(SalesOrderCreated {
            tenant_id: tenant,
            order_id,
            customer: PartyId::new(AggregateId::new()),
            sales_type,
            delivery_source: DeliverySource::Warehouse,
            currency: "BDT".to_string(),
            lines: vec![SalesOrderLine {
                product_id: ProductId::new(AggregateId::new()),
                uom: Unit::Ton,
                quantity: Decimal::new(10, 0),
                rate: Decimal::new(100_000, 0),
                amount: Decimal::new(1_000_000, 0),
                batch: None,
                warehouse: Some(WarehouseId::new(AggregateId::new())),
            }],
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn board_tracks_status_and_amounts() {
        let projection = projection();
        let tenant = TenantId::new();
        let order_id = SalesOrderId::new(AggregateId::new());

        projection
            .apply_envelope(&envelope(tenant, order_id, 1, &created(tenant, order_id, SalesType::Cash)))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                tenant,
                order_id,
                2,
                &SalesOrderEvent::SalesOrderSubmitted(SalesOrderSubmitted {
                    tenant_id: tenant,
                    order_id,
                    new_status: OrderStatus::PaymentPending,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                tenant,
                order_id,
                3,
                &SalesOrderEvent::PaymentSlipAdded(plasticflow_sales::PaymentSlipAdded {
                    tenant_id: tenant,
                    order_id,
                    slip: PaymentSlip {
                        reference: "BANK-001".to_string(),
                        amount_paid: Decimal::new(1_000_000, 0),
                        paid_on: None,
                    },
                    new_status: OrderStatus::PaymentVerified,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        let row = projection.get(tenant, &order_id).unwrap();
        assert_eq!(row.status, OrderStatus::PaymentVerified);
        assert_eq!(row.paid_amount, Decimal::new(1_000_000, 0));
        assert_eq!(row.outstanding_amount, Decimal::new(1_000_000, 0));

        assert_eq!(projection.open_orders(tenant).len(), 1);
        assert_eq!(
            projection.by_status(tenant, OrderStatus::PaymentVerified).len(),
            1
        );
    }

    #[test]
    fn rebuild_replays_out_of_order_envelopes() {
        let projection = projection();
        let tenant = TenantId::new();
        let order_id = SalesOrderId::new(AggregateId::new());

        let envs = vec![
            envelope(
                tenant,
                order_id,
                2,
                &SalesOrderEvent::SalesOrderSubmitted(SalesOrderSubmitted {
                    tenant_id: tenant,
                    order_id,
                    new_status: OrderStatus::CreditSales,
                    occurred_at: Utc::now(),
                }),
            ),
            envelope(tenant, order_id, 1, &created(tenant, order_id, SalesType::Credit)),
        ];

        projection.rebuild_from_scratch(envs).unwrap();
        let row = projection.get(tenant, &order_id).unwrap();
        assert_eq!(row.status, OrderStatus::CreditSales);
    }
}
