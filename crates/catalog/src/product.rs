//! Product master records for the resins the desk trades (HDPE, PP, PVC and
//! friends). A product is little more than an item code, a display name, and
//! its stock-keeping unit; prices and quantities live on the documents that
//! reference it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use plasticflow_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use plasticflow_events::Event;

use crate::uom::Unit;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Products are tradeable as soon as they are created; archiving retires them
/// from new documents while keeping history intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub item_code: String,
    pub name: String,
    pub uom: Unit,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    ArchiveProduct(ArchiveProduct),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub item_code: String,
    pub name: String,
    pub uom: Unit,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductArchived {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    ProductArchived(ProductArchived),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "catalog.product.created",
            ProductEvent::ProductArchived(_) => "catalog.product.archived",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ProductArchived(e) => e.occurred_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    tenant_id: Option<TenantId>,
    item_code: String,
    name: String,
    uom: Unit,
    status: ProductStatus,
    version: u64,
    created: bool,
}

impl Product {
    /// Blank instance to rehydrate a stream into.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            tenant_id: None,
            item_code: String::new(),
            name: String::new(),
            uom: Unit::Ton,
            status: ProductStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn item_code(&self) -> &str {
        &self.item_code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uom(&self) -> &Unit {
        &self.uom
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    /// Whether the product can appear on new purchase/sales documents.
    pub fn can_transact(&self) -> bool {
        self.created && self.status == ProductStatus::Active
    }

    fn guard_stream(&self, tenant_id: TenantId, product_id: ProductId) -> Result<(), DomainError> {
        if self.created && self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }

        let item_code = cmd.item_code.trim();
        if item_code.is_empty() {
            return Err(DomainError::validation("item code cannot be empty"));
        }

        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        // Item-code uniqueness per tenant is checked by the workflow layer
        // against the read model before this command is dispatched.

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            item_code: item_code.to_string(),
            name: name.to_string(),
            uom: cmd.uom.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn archive(&self, cmd: &ArchiveProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.guard_stream(cmd.tenant_id, cmd.product_id)?;

        if self.status == ProductStatus::Archived {
            return Err(DomainError::conflict("product is already archived"));
        }

        Ok(vec![ProductEvent::ProductArchived(ProductArchived {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.create(cmd),
            ProductCommand::ArchiveProduct(cmd) => self.archive(cmd),
        }
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.tenant_id = Some(e.tenant_id);
                self.item_code = e.item_code.clone();
                self.name = e.name.clone();
                self.uom = e.uom.clone();
                self.status = ProductStatus::Active;
                self.created = true;
            }
            ProductEvent::ProductArchived(_) => {
                self.status = ProductStatus::Archived;
            }
        }

        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plasticflow_core::AggregateId;

    fn create_cmd(tenant_id: TenantId, product_id: ProductId) -> CreateProduct {
        CreateProduct {
            tenant_id,
            product_id,
            item_code: "HDPE-F00952".to_string(),
            name: "HDPE Film Grade F00952".to_string(),
            uom: Unit::Ton,
            occurred_at: Utc::now(),
        }
    }

    /// Product with the creation event already applied.
    fn created() -> (Product, TenantId, ProductId) {
        let tenant_id = TenantId::new();
        let product_id = ProductId::new(AggregateId::new());
        let mut product = Product::empty(product_id);

        let events = product
            .handle(&ProductCommand::CreateProduct(create_cmd(
                tenant_id, product_id,
            )))
            .unwrap();
        product.apply(&events[0]);

        (product, tenant_id, product_id)
    }

    #[test]
    fn creation_trims_item_code_and_name() {
        let product_id = ProductId::new(AggregateId::new());
        let product = Product::empty(product_id);
        let mut cmd = create_cmd(TenantId::new(), product_id);
        cmd.item_code = "  PP-H030SG  ".to_string();
        cmd.name = " PP Homopolymer ".to_string();

        let events = product.handle(&ProductCommand::CreateProduct(cmd)).unwrap();
        let ProductEvent::ProductCreated(e) = &events[0] else {
            panic!("expected ProductCreated");
        };
        assert_eq!(e.item_code, "PP-H030SG");
        assert_eq!(e.name, "PP Homopolymer");
    }

    #[test]
    fn blank_item_code_or_name_is_rejected() {
        let product_id = ProductId::new(AggregateId::new());
        let product = Product::empty(product_id);

        let mut cmd = create_cmd(TenantId::new(), product_id);
        cmd.item_code = "   ".to_string();
        let err = product.handle(&ProductCommand::CreateProduct(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let mut cmd = create_cmd(TenantId::new(), product_id);
        cmd.name = String::new();
        let err = product.handle(&ProductCommand::CreateProduct(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn double_creation_conflicts() {
        let (product, tenant_id, product_id) = created();

        let err = product
            .handle(&ProductCommand::CreateProduct(create_cmd(
                tenant_id, product_id,
            )))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn new_product_is_immediately_transactable() {
        let (product, _, _) = created();

        assert_eq!(product.status(), ProductStatus::Active);
        assert!(product.can_transact());
        assert_eq!(product.version(), 1);
    }

    #[test]
    fn archiving_retires_the_product() {
        let (mut product, tenant_id, product_id) = created();

        let archive_cmd = ArchiveProduct {
            tenant_id,
            product_id,
            occurred_at: Utc::now(),
        };
        let events = product
            .handle(&ProductCommand::ArchiveProduct(archive_cmd.clone()))
            .unwrap();
        product.apply(&events[0]);

        assert_eq!(product.status(), ProductStatus::Archived);
        assert!(!product.can_transact());
        assert_eq!(product.version(), 2);

        // Archiving twice is a conflict.
        let err = product
            .handle(&ProductCommand::ArchiveProduct(archive_cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn archiving_an_unknown_product_is_not_found() {
        let product_id = ProductId::new(AggregateId::new());
        let product = Product::empty(product_id);

        let err = product
            .handle(&ProductCommand::ArchiveProduct(ArchiveProduct {
                tenant_id: TenantId::new(),
                product_id,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }

    #[test]
    fn commands_from_another_tenant_are_rejected() {
        let (product, _, product_id) = created();

        let err = product
            .handle(&ProductCommand::ArchiveProduct(ArchiveProduct {
                tenant_id: TenantId::new(),
                product_id,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn handle_is_pure() {
        let (product, tenant_id, product_id) = created();
        let state_before = product.clone();

        let archive_cmd = ArchiveProduct {
            tenant_id,
            product_id,
            occurred_at: Utc::now(),
        };
        let first = product
            .handle(&ProductCommand::ArchiveProduct(archive_cmd.clone()))
            .unwrap();
        let second = product
            .handle(&ProductCommand::ArchiveProduct(archive_cmd))
            .unwrap();

        assert_eq!(product, state_before);
        assert_eq!(first, second);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Replaying the same events into two fresh instances converges.
            #[test]
            fn replay_is_deterministic(
                item_code in "[A-Z0-9-]{1,20}",
                name in "[A-Za-z][A-Za-z0-9 ]{0,60}"
            ) {
                let tenant_id = TenantId::new();
                let product_id = ProductId::new(AggregateId::new());

                let events = vec![
                    ProductEvent::ProductCreated(ProductCreated {
                        tenant_id,
                        product_id,
                        item_code,
                        name,
                        uom: Unit::Ton,
                        occurred_at: Utc::now(),
                    }),
                    ProductEvent::ProductArchived(ProductArchived {
                        tenant_id,
                        product_id,
                        occurred_at: Utc::now(),
                    }),
                ];

                let mut left = Product::empty(product_id);
                let mut right = Product::empty(product_id);
                for event in &events {
                    left.apply(event);
                    right.apply(event);
                }

                prop_assert_eq!(&left, &right);
                prop_assert_eq!(left.status(), ProductStatus::Archived);
                prop_assert_eq!(left.version(), 2);
            }
        }
    }
}
