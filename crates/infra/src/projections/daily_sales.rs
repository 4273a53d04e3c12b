//! Invoice read model feeding the daily sales report and receivables totals.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use plasticflow_core::{TenantId, clamp_non_negative};
use plasticflow_events::EventEnvelope;
use plasticflow_invoicing::{InvoiceEvent, InvoiceId, InvoiceStatus};
use plasticflow_parties::PartyId;
use plasticflow_sales::{SalesOrderId, SalesType};

use super::{ProjectionError, StreamCursors};
use crate::read_model::TenantStore;

/// Read model record for one invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceRow {
    pub invoice_id: InvoiceId,
    pub sales_order: SalesOrderId,
    pub customer: PartyId,
    pub invoice_type: SalesType,
    pub currency: String,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub outstanding_amount: Decimal,
    pub status: InvoiceStatus,
}

/// One day of the daily sales report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySalesRow {
    pub date: NaiveDate,
    pub invoiced_total: Decimal,
    pub invoice_count: usize,
}

/// Invoice projection over `InvoiceEvent` streams.
///
/// The daily report groups by `invoice_date` at query time, so a cancelled
/// invoice falls off the right day without any compensation bookkeeping.
#[derive(Debug)]
pub struct DailySalesProjection<S>
where
    S: TenantStore<InvoiceId, InvoiceRow>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> DailySalesProjection<S>
where
    S: TenantStore<InvoiceId, InvoiceRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, invoice_id: &InvoiceId) -> Option<InvoiceRow> {
        self.store.get(tenant_id, invoice_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<InvoiceRow> {
        let mut rows = self.store.list(tenant_id);
        rows.sort_by_key(|r| (r.invoice_date, *r.invoice_id.0.as_uuid().as_bytes()));
        rows
    }

    /// Daily invoiced totals over an inclusive date range. Cancelled invoices
    /// are excluded; days without invoices are omitted.
    pub fn daily_sales(
        &self,
        tenant_id: TenantId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<DailySalesRow> {
        let mut days: BTreeMap<NaiveDate, (Decimal, usize)> = BTreeMap::new();
        for row in self.store.list(tenant_id) {
            if row.status == InvoiceStatus::Cancelled {
                continue;
            }
            if row.invoice_date < from || row.invoice_date > to {
                continue;
            }
            let day = days.entry(row.invoice_date).or_insert((Decimal::ZERO, 0));
            day.0 += row.total_amount;
            day.1 += 1;
        }

        days.into_iter()
            .map(|(date, (invoiced_total, invoice_count))| DailySalesRow {
                date,
                invoiced_total,
                invoice_count,
            })
            .collect()
    }

    /// Total outstanding across pending invoices.
    pub fn outstanding_receivables(&self, tenant_id: TenantId) -> Decimal {
        self.store
            .list(tenant_id)
            .into_iter()
            .filter(|r| r.status == InvoiceStatus::Pending)
            .map(|r| r.outstanding_amount)
            .sum()
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();

        self.cursors
            .advance(tenant_id, aggregate_id, envelope.sequence_number(), || {
                let event: InvoiceEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

                let (event_tenant, invoice_id) = invoice_event_ids(&event);
                if event_tenant != tenant_id {
                    return Err(ProjectionError::TenantIsolation(
                        "event tenant_id does not match envelope tenant_id".to_string(),
                    ));
                }
                if invoice_id.0 != aggregate_id {
                    return Err(ProjectionError::TenantIsolation(
                        "event invoice_id does not match envelope aggregate_id".to_string(),
                    ));
                }

                self.apply_event(tenant_id, invoice_id, &event);
                Ok(())
            })
    }

    fn apply_event(&self, tenant_id: TenantId, invoice_id: InvoiceId, event: &InvoiceEvent) {
        match event {
            InvoiceEvent::InvoiceIssued(e) => {
                self.store.upsert(
                    tenant_id,
                    invoice_id,
                    InvoiceRow {
                        invoice_id,
                        sales_order: e.sales_order,
                        customer: e.customer,
                        invoice_type: e.invoice_type,
                        currency: e.currency.clone(),
                        invoice_date: e.invoice_date,
                        due_date: e.due_date,
                        total_amount: e.total_amount,
                        paid_amount: Decimal::ZERO,
                        outstanding_amount: e.total_amount,
                        status: InvoiceStatus::Pending,
                    },
                );
            }
            InvoiceEvent::InvoicePaymentRecorded(e) => {
                if let Some(mut row) = self.store.get(tenant_id, &invoice_id) {
                    row.paid_amount += e.amount;
                    row.outstanding_amount =
                        clamp_non_negative(row.total_amount - row.paid_amount);
                    row.status = e.new_status;
                    self.store.upsert(tenant_id, invoice_id, row);
                }
            }
            InvoiceEvent::InvoiceCancelled(_) => {
                if let Some(mut row) = self.store.get(tenant_id, &invoice_id) {
                    row.status = InvoiceStatus::Cancelled;
                    row.outstanding_amount = Decimal::ZERO;
                    self.store.upsert(tenant_id, invoice_id, row);
                }
            }
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

fn invoice_event_ids(event: &InvoiceEvent) -> (TenantId, InvoiceId) {
    match event {
        InvoiceEvent::InvoiceIssued(e) => (e.tenant_id, e.invoice_id),
        InvoiceEvent::InvoicePaymentRecorded(e) => (e.tenant_id, e.invoice_id),
        InvoiceEvent::InvoiceCancelled(e) => (e.tenant_id, e.invoice_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use plasticflow_catalog::{ProductId, Unit};
    use plasticflow_core::AggregateId;
    use plasticflow_invoicing::{InvoiceCancelled, InvoiceIssued, InvoiceLine};
    use std::sync::Arc;
    use uuid::Uuid;

    use crate::read_model::InMemoryTenantStore;

    type Store = Arc<InMemoryTenantStore<InvoiceId, InvoiceRow>>;

    fn projection() -> DailySalesProjection<Store> {
        DailySalesProjection::new(Arc::new(InMemoryTenantStore::new()))
    }

    fn envelope(
        tenant: TenantId,
        invoice_id: InvoiceId,
        seq: u64,
        event: &InvoiceEvent,
    ) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant,
            invoice_id.0,
            "invoice",
            seq,
            Utc::now(),
            serde_json::to_value(event).unwrap(),
        )
    }

    fn issued(
        tenant: TenantId,
        invoice_id: InvoiceId,
        sales_order: SalesOrderId,
        date: NaiveDate,
        amount: i64,
    ) -> InvoiceEvent {
        InvoiceEvent::InvoiceIssued(InvoiceIssued {
            tenant_id: tenant,
            invoice_id,
            sales_order,
            customer: PartyId::new(AggregateId::new()),
            invoice_type: SalesType::Credit,
            currency: "BDT".to_string(),
            invoice_date: date,
            due_date: date,
            lines: vec![InvoiceLine {
                product_id: ProductId::new(AggregateId::new()),
                uom: Unit::Ton,
                quantity: Decimal::new(1, 0),
                rate: Decimal::new(amount, 0),
                amount: Decimal::new(amount, 0),
            }],
            total_amount: Decimal::new(amount, 0),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn daily_report_groups_by_invoice_date() {
        let projection = projection();
        let tenant = TenantId::new();
        let order = SalesOrderId::new(AggregateId::new());
        let day_one = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        let day_two = NaiveDate::from_ymd_opt(2025, 7, 2).unwrap();

        for (date, amount) in [(day_one, 500_000), (day_one, 250_000), (day_two, 100_000)] {
            let invoice_id = InvoiceId::new(AggregateId::new());
            projection
                .apply_envelope(&envelope(
                    tenant,
                    invoice_id,
                    1,
                    &issued(tenant, invoice_id, order, date, amount),
                ))
                .unwrap();
        }

        let rows = projection.daily_sales(tenant, day_one, day_two);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].invoiced_total, Decimal::new(750_000, 0));
        assert_eq!(rows[0].invoice_count, 2);
        assert_eq!(rows[1].invoiced_total, Decimal::new(100_000, 0));
    }

    #[test]
    fn cancelled_invoices_drop_out_of_the_report_and_receivables() {
        let projection = projection();
        let tenant = TenantId::new();
        let order = SalesOrderId::new(AggregateId::new());
        let date = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        let invoice_id = InvoiceId::new(AggregateId::new());

        projection
            .apply_envelope(&envelope(
                tenant,
                invoice_id,
                1,
                &issued(tenant, invoice_id, order, date, 500_000),
            ))
            .unwrap();
        assert_eq!(
            projection.outstanding_receivables(tenant),
            Decimal::new(500_000, 0)
        );

        projection
            .apply_envelope(&envelope(
                tenant,
                invoice_id,
                2,
                &InvoiceEvent::InvoiceCancelled(InvoiceCancelled {
                    tenant_id: tenant,
                    invoice_id,
                    sales_order: Some(order),
                    reverted_amount: Decimal::new(500_000, 0),
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        assert!(projection.daily_sales(tenant, date, date).is_empty());
        assert_eq!(projection.outstanding_receivables(tenant), Decimal::ZERO);
    }

    #[test]
    fn payments_reduce_outstanding_receivables() {
        let projection = projection();
        let tenant = TenantId::new();
        let order = SalesOrderId::new(AggregateId::new());
        let date = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        let invoice_id = InvoiceId::new(AggregateId::new());

        projection
            .apply_envelope(&envelope(
                tenant,
                invoice_id,
                1,
                &issued(tenant, invoice_id, order, date, 500_000),
            ))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                tenant,
                invoice_id,
                2,
                &InvoiceEvent::InvoicePaymentRecorded(plasticflow_invoicing::InvoicePaymentRecorded {
                    tenant_id: tenant,
                    invoice_id,
                    amount: Decimal::new(200_000, 0),
                    outstanding_amount: Decimal::new(300_000, 0),
                    new_status: InvoiceStatus::Pending,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        assert_eq!(
            projection.outstanding_receivables(tenant),
            Decimal::new(300_000, 0)
        );
    }
}
