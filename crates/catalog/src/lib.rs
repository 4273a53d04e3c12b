//! Catalog domain module: product and warehouse master data plus unit
//! conversion rules.
//!
//! Pure deterministic domain logic (no IO, no HTTP, no storage).

pub mod product;
pub mod uom;
pub mod warehouse;

pub use product::{
    ArchiveProduct, CreateProduct, Product, ProductArchived, ProductCommand, ProductCreated,
    ProductEvent, ProductId, ProductStatus,
};
pub use uom::{Unit, conversion_factor, convert_quantity, convert_rate};
pub use warehouse::{
    CreateWarehouse, Warehouse, WarehouseCommand, WarehouseCreated, WarehouseEvent, WarehouseId,
};
