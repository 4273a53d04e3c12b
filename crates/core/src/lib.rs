//! `plasticflow-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! strongly-typed identifiers, the aggregate traits, the domain error model,
//! and decimal tolerance helpers shared by quantity and money math.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod tolerance;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, TenantId, UserId};
pub use tolerance::{PAYMENT_TOLERANCE, QTY_TOLERANCE, approx_eq, approx_zero, clamp_non_negative};
