//! Loading order aggregate.
//!
//! A loading order schedules the physical loading of a sales order onto a
//! vehicle. Completing it requires a gate pass on the sales order, which the
//! workflow layer verifies against the read model before dispatch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use plasticflow_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use plasticflow_events::Event;
use plasticflow_sales::SalesOrderId;

/// Loading order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadingOrderId(pub AggregateId);

impl LoadingOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for LoadingOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadingStatus {
    NewOrder,
    Loading,
    Completed,
    Cancelled,
}

/// Aggregate root: LoadingOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadingOrder {
    id: LoadingOrderId,
    tenant_id: Option<TenantId>,
    sales_order: Option<SalesOrderId>,
    driver_name: String,
    vehicle_plate: String,
    driver_phone: String,
    destination: String,
    status: LoadingStatus,
    version: u64,
    created: bool,
}

impl LoadingOrder {
    pub fn empty(id: LoadingOrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            sales_order: None,
            driver_name: String::new(),
            vehicle_plate: String::new(),
            driver_phone: String::new(),
            destination: String::new(),
            status: LoadingStatus::NewOrder,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> LoadingOrderId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn sales_order(&self) -> Option<SalesOrderId> {
        self.sales_order
    }

    pub fn status(&self) -> LoadingStatus {
        self.status
    }
}

impl AggregateRoot for LoadingOrder {
    type Id = LoadingOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateLoadingOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLoadingOrder {
    pub tenant_id: TenantId,
    pub loading_order_id: LoadingOrderId,
    pub sales_order: SalesOrderId,
    pub driver_name: String,
    pub vehicle_plate: String,
    pub driver_phone: String,
    pub destination: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartLoading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartLoading {
    pub tenant_id: TenantId,
    pub loading_order_id: LoadingOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompleteLoading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteLoading {
    pub tenant_id: TenantId,
    pub loading_order_id: LoadingOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelLoadingOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelLoadingOrder {
    pub tenant_id: TenantId,
    pub loading_order_id: LoadingOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadingOrderCommand {
    CreateLoadingOrder(CreateLoadingOrder),
    StartLoading(StartLoading),
    CompleteLoading(CompleteLoading),
    CancelLoadingOrder(CancelLoadingOrder),
}

/// Event: LoadingOrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingOrderCreated {
    pub tenant_id: TenantId,
    pub loading_order_id: LoadingOrderId,
    pub sales_order: SalesOrderId,
    pub driver_name: String,
    pub vehicle_plate: String,
    pub driver_phone: String,
    pub destination: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LoadingStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingStarted {
    pub tenant_id: TenantId,
    pub loading_order_id: LoadingOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LoadingCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingCompleted {
    pub tenant_id: TenantId,
    pub loading_order_id: LoadingOrderId,
    pub sales_order: Option<SalesOrderId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LoadingOrderCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingOrderCancelled {
    pub tenant_id: TenantId,
    pub loading_order_id: LoadingOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadingOrderEvent {
    LoadingOrderCreated(LoadingOrderCreated),
    LoadingStarted(LoadingStarted),
    LoadingCompleted(LoadingCompleted),
    LoadingOrderCancelled(LoadingOrderCancelled),
}

impl Event for LoadingOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LoadingOrderEvent::LoadingOrderCreated(_) => "logistics.loading_order.created",
            LoadingOrderEvent::LoadingStarted(_) => "logistics.loading_order.started",
            LoadingOrderEvent::LoadingCompleted(_) => "logistics.loading_order.completed",
            LoadingOrderEvent::LoadingOrderCancelled(_) => "logistics.loading_order.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LoadingOrderEvent::LoadingOrderCreated(e) => e.occurred_at,
            LoadingOrderEvent::LoadingStarted(e) => e.occurred_at,
            LoadingOrderEvent::LoadingCompleted(e) => e.occurred_at,
            LoadingOrderEvent::LoadingOrderCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for LoadingOrder {
    type Command = LoadingOrderCommand;
    type Event = LoadingOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LoadingOrderEvent::LoadingOrderCreated(e) => {
                self.id = e.loading_order_id;
                self.tenant_id = Some(e.tenant_id);
                self.sales_order = Some(e.sales_order);
                self.driver_name = e.driver_name.clone();
                self.vehicle_plate = e.vehicle_plate.clone();
                self.driver_phone = e.driver_phone.clone();
                self.destination = e.destination.clone();
                self.status = LoadingStatus::NewOrder;
                self.created = true;
            }
            LoadingOrderEvent::LoadingStarted(_) => {
                self.status = LoadingStatus::Loading;
            }
            LoadingOrderEvent::LoadingCompleted(_) => {
                self.status = LoadingStatus::Completed;
            }
            LoadingOrderEvent::LoadingOrderCancelled(_) => {
                self.status = LoadingStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LoadingOrderCommand::CreateLoadingOrder(cmd) => self.handle_create(cmd),
            LoadingOrderCommand::StartLoading(cmd) => self.handle_start(cmd),
            LoadingOrderCommand::CompleteLoading(cmd) => self.handle_complete(cmd),
            LoadingOrderCommand::CancelLoadingOrder(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl LoadingOrder {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_loading_order_id(&self, loading_order_id: LoadingOrderId) -> Result<(), DomainError> {
        if self.id != loading_order_id {
            return Err(DomainError::invariant("loading_order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateLoadingOrder) -> Result<Vec<LoadingOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("loading order already exists"));
        }
        let driver_name = cmd.driver_name.trim().to_string();
        let vehicle_plate = cmd.vehicle_plate.trim().to_string();
        if driver_name.is_empty() {
            return Err(DomainError::validation("driver name cannot be empty"));
        }
        if vehicle_plate.is_empty() {
            return Err(DomainError::validation("vehicle plate cannot be empty"));
        }

        Ok(vec![LoadingOrderEvent::LoadingOrderCreated(
            LoadingOrderCreated {
                tenant_id: cmd.tenant_id,
                loading_order_id: cmd.loading_order_id,
                sales_order: cmd.sales_order,
                driver_name,
                vehicle_plate,
                driver_phone: cmd.driver_phone.trim().to_string(),
                destination: cmd.destination.trim().to_string(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_start(&self, cmd: &StartLoading) -> Result<Vec<LoadingOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_loading_order_id(cmd.loading_order_id)?;

        if self.status != LoadingStatus::NewOrder {
            return Err(DomainError::invariant(
                "only a new loading order can start loading",
            ));
        }

        Ok(vec![LoadingOrderEvent::LoadingStarted(LoadingStarted {
            tenant_id: cmd.tenant_id,
            loading_order_id: cmd.loading_order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    /// The workflow layer verifies a gate pass exists for the sales order
    /// before dispatching this command.
    fn handle_complete(&self, cmd: &CompleteLoading) -> Result<Vec<LoadingOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_loading_order_id(cmd.loading_order_id)?;

        if self.status != LoadingStatus::Loading {
            return Err(DomainError::invariant(
                "only a loading order in progress can be completed",
            ));
        }

        Ok(vec![LoadingOrderEvent::LoadingCompleted(LoadingCompleted {
            tenant_id: cmd.tenant_id,
            loading_order_id: cmd.loading_order_id,
            sales_order: self.sales_order,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelLoadingOrder) -> Result<Vec<LoadingOrderEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_loading_order_id(cmd.loading_order_id)?;

        match self.status {
            LoadingStatus::Completed => {
                return Err(DomainError::invariant(
                    "a completed loading order cannot be cancelled",
                ));
            }
            LoadingStatus::Cancelled => {
                return Err(DomainError::conflict("loading order is already cancelled"));
            }
            LoadingStatus::NewOrder | LoadingStatus::Loading => {}
        }

        Ok(vec![LoadingOrderEvent::LoadingOrderCancelled(
            LoadingOrderCancelled {
                tenant_id: cmd.tenant_id,
                loading_order_id: cmd.loading_order_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_loading_order_id() -> LoadingOrderId {
        LoadingOrderId::new(AggregateId::new())
    }

    fn created_loading_order(tenant_id: TenantId, loading_order_id: LoadingOrderId) -> LoadingOrder {
        let mut order = LoadingOrder::empty(loading_order_id);
        let events = order
            .handle(&LoadingOrderCommand::CreateLoadingOrder(CreateLoadingOrder {
                tenant_id,
                loading_order_id,
                sales_order: SalesOrderId::new(AggregateId::new()),
                driver_name: "Karim".to_string(),
                vehicle_plate: "CTG-11-4455".to_string(),
                driver_phone: "01711000000".to_string(),
                destination: "Tejgaon".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        order.apply(&events[0]);
        order
    }

    #[test]
    fn loading_runs_new_to_completed() {
        let tenant_id = test_tenant_id();
        let loading_order_id = test_loading_order_id();
        let mut order = created_loading_order(tenant_id, loading_order_id);
        assert_eq!(order.status(), LoadingStatus::NewOrder);

        let events = order
            .handle(&LoadingOrderCommand::StartLoading(StartLoading {
                tenant_id,
                loading_order_id,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        order.apply(&events[0]);
        assert_eq!(order.status(), LoadingStatus::Loading);

        let events = order
            .handle(&LoadingOrderCommand::CompleteLoading(CompleteLoading {
                tenant_id,
                loading_order_id,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        match &events[0] {
            LoadingOrderEvent::LoadingCompleted(e) => assert!(e.sales_order.is_some()),
            _ => panic!("Expected LoadingCompleted event"),
        }
        order.apply(&events[0]);
        assert_eq!(order.status(), LoadingStatus::Completed);
    }

    #[test]
    fn completing_without_starting_is_rejected() {
        let tenant_id = test_tenant_id();
        let loading_order_id = test_loading_order_id();
        let order = created_loading_order(tenant_id, loading_order_id);

        let err = order
            .handle(&LoadingOrderCommand::CompleteLoading(CompleteLoading {
                tenant_id,
                loading_order_id,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(_) => {}
            _ => panic!("Expected InvariantViolation error"),
        }
    }

    #[test]
    fn completed_orders_cannot_be_cancelled() {
        let tenant_id = test_tenant_id();
        let loading_order_id = test_loading_order_id();
        let mut order = created_loading_order(tenant_id, loading_order_id);

        for command in [
            LoadingOrderCommand::StartLoading(StartLoading {
                tenant_id,
                loading_order_id,
                occurred_at: Utc::now(),
            }),
            LoadingOrderCommand::CompleteLoading(CompleteLoading {
                tenant_id,
                loading_order_id,
                occurred_at: Utc::now(),
            }),
        ] {
            let events = order.handle(&command).unwrap();
            order.apply(&events[0]);
        }

        let err = order
            .handle(&LoadingOrderCommand::CancelLoadingOrder(CancelLoadingOrder {
                tenant_id,
                loading_order_id,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(_) => {}
            _ => panic!("Expected InvariantViolation error"),
        }
    }
}
