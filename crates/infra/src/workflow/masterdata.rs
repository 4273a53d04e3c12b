//! Master data workflow: parties, products, and warehouses.
//!
//! These aggregates have no cross-aggregate rules; the engine only routes
//! their commands through the dispatcher so every write shares one path.

use serde_json::Value as JsonValue;

use plasticflow_catalog::{
    ArchiveProduct, CreateProduct, CreateWarehouse, Product, ProductCommand, ProductId, Warehouse,
    WarehouseCommand, WarehouseId,
};
use plasticflow_events::{EventBus, EventEnvelope};
use plasticflow_parties::{Party, PartyCommand, PartyId, RegisterParty, SuspendParty, UpdateDetails};

use super::{WorkflowEngine, aggregate_types};
use crate::command_dispatcher::DispatchError;
use crate::event_store::{EventStore, StoredEvent};

impl<S, B> WorkflowEngine<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn register_party(&self, cmd: RegisterParty) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher().dispatch(
            cmd.tenant_id,
            cmd.party_id.0,
            aggregate_types::PARTY,
            PartyCommand::RegisterParty(cmd.clone()),
            |_, id| Party::empty(PartyId::new(id)),
        )
    }

    pub fn update_party_details(
        &self,
        cmd: UpdateDetails,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher().dispatch(
            cmd.tenant_id,
            cmd.party_id.0,
            aggregate_types::PARTY,
            PartyCommand::UpdateDetails(cmd.clone()),
            |_, id| Party::empty(PartyId::new(id)),
        )
    }

    pub fn suspend_party(&self, cmd: SuspendParty) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher().dispatch(
            cmd.tenant_id,
            cmd.party_id.0,
            aggregate_types::PARTY,
            PartyCommand::SuspendParty(cmd.clone()),
            |_, id| Party::empty(PartyId::new(id)),
        )
    }

    pub fn create_product(&self, cmd: CreateProduct) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher().dispatch(
            cmd.tenant_id,
            cmd.product_id.0,
            aggregate_types::PRODUCT,
            ProductCommand::CreateProduct(cmd.clone()),
            |_, id| Product::empty(ProductId::new(id)),
        )
    }

    pub fn archive_product(&self, cmd: ArchiveProduct) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher().dispatch(
            cmd.tenant_id,
            cmd.product_id.0,
            aggregate_types::PRODUCT,
            ProductCommand::ArchiveProduct(cmd.clone()),
            |_, id| Product::empty(ProductId::new(id)),
        )
    }

    pub fn create_warehouse(
        &self,
        cmd: CreateWarehouse,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher().dispatch(
            cmd.tenant_id,
            cmd.warehouse_id.0,
            aggregate_types::WAREHOUSE,
            WarehouseCommand::CreateWarehouse(cmd.clone()),
            |_, id| Warehouse::empty(WarehouseId::new(id)),
        )
    }
}
