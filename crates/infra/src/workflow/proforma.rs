//! Proforma workflow: quotations and their conversion into draft sales
//! orders.

use chrono::{NaiveDate, Utc};
use serde_json::Value as JsonValue;

use plasticflow_core::{Aggregate, TenantId};
use plasticflow_events::{EventBus, EventEnvelope};
use plasticflow_parties::PartyId;
use plasticflow_sales::{
    CancelProformaInvoice, CreateProformaInvoice, CreateSalesOrder, DeliverySource,
    MarkProformaConverted, ProformaInvoice, ProformaInvoiceCommand, ProformaInvoiceId,
    ProformaLineInput, SalesOrder, SalesOrderCommand, SalesOrderId, SalesType,
    SubmitProformaInvoice,
};

use super::{WorkflowEngine, aggregate_types};
use crate::command_dispatcher::DispatchError;
use crate::event_store::{EventStore, StoredEvent};

/// Request to draft a proforma invoice.
#[derive(Debug, Clone)]
pub struct ProformaDraft {
    pub tenant_id: TenantId,
    pub proforma_id: ProformaInvoiceId,
    pub customer: PartyId,
    pub currency: String,
    pub valid_until: Option<NaiveDate>,
    pub lines: Vec<ProformaLineInput>,
}

/// Request to convert a submitted proforma into a draft sales order.
#[derive(Debug, Clone)]
pub struct ProformaConversion {
    pub tenant_id: TenantId,
    pub proforma_id: ProformaInvoiceId,
    pub order_id: SalesOrderId,
    pub sales_type: SalesType,
    pub delivery_source: DeliverySource,
}

impl<S, B> WorkflowEngine<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub(crate) fn load_proforma_invoice(
        &self,
        tenant_id: TenantId,
        proforma_id: ProformaInvoiceId,
    ) -> Result<ProformaInvoice, DispatchError> {
        self.dispatcher()
            .load(tenant_id, proforma_id.0, |_, id| {
                ProformaInvoice::empty(ProformaInvoiceId::new(id))
            })
    }

    pub fn create_proforma_invoice(
        &self,
        draft: ProformaDraft,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher().dispatch(
            draft.tenant_id,
            draft.proforma_id.0,
            aggregate_types::PROFORMA_INVOICE,
            ProformaInvoiceCommand::CreateProformaInvoice(CreateProformaInvoice {
                tenant_id: draft.tenant_id,
                proforma_id: draft.proforma_id,
                customer: draft.customer,
                currency: draft.currency,
                valid_until: draft.valid_until,
                lines: draft.lines,
                occurred_at: Utc::now(),
            }),
            |_, id| ProformaInvoice::empty(ProformaInvoiceId::new(id)),
        )
    }

    pub fn submit_proforma_invoice(
        &self,
        tenant_id: TenantId,
        proforma_id: ProformaInvoiceId,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher().dispatch(
            tenant_id,
            proforma_id.0,
            aggregate_types::PROFORMA_INVOICE,
            ProformaInvoiceCommand::SubmitProformaInvoice(SubmitProformaInvoice {
                tenant_id,
                proforma_id,
                occurred_at: Utc::now(),
            }),
            |_, id| ProformaInvoice::empty(ProformaInvoiceId::new(id)),
        )
    }

    /// Convert a submitted proforma into a draft sales order at the
    /// VAT-inclusive rates, then mark the proforma converted.
    ///
    /// The conversion rules run on a loaded copy first so no order is
    /// created for a proforma that cannot convert.
    pub fn convert_proforma_invoice(
        &self,
        req: ProformaConversion,
    ) -> Result<SalesOrderId, DispatchError> {
        let proforma = self.load_proforma_invoice(req.tenant_id, req.proforma_id)?;
        let now = Utc::now();

        proforma
            .handle(&ProformaInvoiceCommand::MarkProformaConverted(
                MarkProformaConverted {
                    tenant_id: req.tenant_id,
                    proforma_id: req.proforma_id,
                    sales_order: req.order_id.0,
                    occurred_at: now,
                },
            ))
            .map_err(DispatchError::from)?;

        let customer = proforma.customer().ok_or(DispatchError::NotFound)?;
        self.dispatcher().dispatch(
            req.tenant_id,
            req.order_id.0,
            aggregate_types::SALES_ORDER,
            SalesOrderCommand::CreateSalesOrder(CreateSalesOrder {
                tenant_id: req.tenant_id,
                order_id: req.order_id,
                customer,
                sales_type: req.sales_type,
                delivery_source: req.delivery_source,
                currency: proforma.currency().to_string(),
                lines: proforma.order_line_inputs(),
                occurred_at: now,
            }),
            |_, id| SalesOrder::empty(SalesOrderId::new(id)),
        )?;

        self.dispatcher().dispatch(
            req.tenant_id,
            req.proforma_id.0,
            aggregate_types::PROFORMA_INVOICE,
            ProformaInvoiceCommand::MarkProformaConverted(MarkProformaConverted {
                tenant_id: req.tenant_id,
                proforma_id: req.proforma_id,
                sales_order: req.order_id.0,
                occurred_at: now,
            }),
            |_, id| ProformaInvoice::empty(ProformaInvoiceId::new(id)),
        )?;
        Ok(req.order_id)
    }

    pub fn cancel_proforma_invoice(
        &self,
        tenant_id: TenantId,
        proforma_id: ProformaInvoiceId,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher().dispatch(
            tenant_id,
            proforma_id.0,
            aggregate_types::PROFORMA_INVOICE,
            ProformaInvoiceCommand::CancelProformaInvoice(CancelProformaInvoice {
                tenant_id,
                proforma_id,
                occurred_at: Utc::now(),
            }),
            |_, id| ProformaInvoice::empty(ProformaInvoiceId::new(id)),
        )
    }
}
