//! FIFO reservation policy for warehouse stock.
//!
//! A warehouse reservation is rejected while an older batch of the same
//! product in the same warehouse still has available quantity. Batches are
//! ordered by arrival date (falling back to creation time) with creation time
//! as the tie-break. Customs-direct reservations are exempt; callers only
//! pass warehouse candidates through this check.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use plasticflow_catalog::{ProductId, WarehouseId};
use plasticflow_core::{DomainError, DomainResult, QTY_TOLERANCE};

use crate::entry::{EntryStatus, StockEntryId};

/// FIFO enforcement toggle. On by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FifoPolicy {
    pub enabled: bool,
}

impl Default for FifoPolicy {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl FifoPolicy {
    pub fn disabled() -> Self {
        Self { enabled: false }
    }
}

/// Batch view used for FIFO ordering, built from the stock entry read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub entry_id: StockEntryId,
    pub product_id: ProductId,
    pub warehouse: WarehouseId,
    pub arrival_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub available: Decimal,
    pub status: EntryStatus,
}

impl BatchSummary {
    fn arrival_marker(&self) -> NaiveDate {
        self.arrival_date.unwrap_or(self.created_at.date_naive())
    }

    /// True when `self` arrived strictly before `other`.
    fn is_older_than(&self, other: &BatchSummary) -> bool {
        match self.arrival_marker().cmp(&other.arrival_marker()) {
            core::cmp::Ordering::Less => true,
            core::cmp::Ordering::Equal => self.created_at < other.created_at,
            core::cmp::Ordering::Greater => false,
        }
    }
}

/// Reject a reservation against `candidate` while an older batch of the same
/// product in the same warehouse is still available.
pub fn ensure_fifo(
    policy: FifoPolicy,
    candidate: &BatchSummary,
    batches: &[BatchSummary],
) -> DomainResult<()> {
    if !policy.enabled {
        return Ok(());
    }

    let older_available = batches.iter().find(|batch| {
        batch.entry_id != candidate.entry_id
            && batch.product_id == candidate.product_id
            && batch.warehouse == candidate.warehouse
            && batch.status == EntryStatus::Available
            && batch.available > QTY_TOLERANCE
            && batch.is_older_than(candidate)
    });

    match older_available {
        Some(batch) => Err(DomainError::invariant(format!(
            "FIFO violation: batch {} of product {} is older and still has {} available",
            batch.entry_id, batch.product_id, batch.available
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use plasticflow_core::AggregateId;

    fn batch(
        product_id: ProductId,
        warehouse: WarehouseId,
        arrival: Option<(i32, u32, u32)>,
        created_day: u32,
        available: i64,
        status: EntryStatus,
    ) -> BatchSummary {
        BatchSummary {
            entry_id: StockEntryId::new(AggregateId::new()),
            product_id,
            warehouse,
            arrival_date: arrival.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap()),
            created_at: Utc.with_ymd_and_hms(2025, 1, created_day, 12, 0, 0).unwrap(),
            available: Decimal::new(available, 0),
            status,
        }
    }

    #[test]
    fn older_available_batch_blocks_reservation() {
        let product = ProductId::new(AggregateId::new());
        let warehouse = WarehouseId::new(AggregateId::new());
        let older = batch(product, warehouse, Some((2025, 1, 1)), 1, 50, EntryStatus::Available);
        let newer = batch(product, warehouse, Some((2025, 1, 10)), 10, 80, EntryStatus::Available);

        let err = ensure_fifo(FifoPolicy::default(), &newer, &[older.clone(), newer.clone()])
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(_) => {}
            _ => panic!("Expected InvariantViolation error for FIFO breach"),
        }

        // Reserving the older batch itself is fine.
        ensure_fifo(FifoPolicy::default(), &older, &[older.clone(), newer]).unwrap();
    }

    #[test]
    fn depleted_or_reserved_older_batches_do_not_block() {
        let product = ProductId::new(AggregateId::new());
        let warehouse = WarehouseId::new(AggregateId::new());
        let depleted = batch(product, warehouse, Some((2025, 1, 1)), 1, 0, EntryStatus::Depleted);
        let reserved = batch(product, warehouse, Some((2025, 1, 2)), 2, 20, EntryStatus::Reserved);
        let newer = batch(product, warehouse, Some((2025, 1, 10)), 10, 80, EntryStatus::Available);

        ensure_fifo(FifoPolicy::default(), &newer, &[depleted, reserved, newer.clone()]).unwrap();
    }

    #[test]
    fn other_warehouses_and_products_are_ignored() {
        let product = ProductId::new(AggregateId::new());
        let warehouse = WarehouseId::new(AggregateId::new());
        let other_wh = batch(
            product,
            WarehouseId::new(AggregateId::new()),
            Some((2025, 1, 1)),
            1,
            50,
            EntryStatus::Available,
        );
        let other_product = batch(
            ProductId::new(AggregateId::new()),
            warehouse,
            Some((2025, 1, 1)),
            1,
            50,
            EntryStatus::Available,
        );
        let newer = batch(product, warehouse, Some((2025, 1, 10)), 10, 80, EntryStatus::Available);

        ensure_fifo(
            FifoPolicy::default(),
            &newer,
            &[other_wh, other_product, newer.clone()],
        )
        .unwrap();
    }

    #[test]
    fn creation_time_breaks_same_day_ties() {
        let product = ProductId::new(AggregateId::new());
        let warehouse = WarehouseId::new(AggregateId::new());
        let mut first = batch(product, warehouse, Some((2025, 1, 5)), 4, 50, EntryStatus::Available);
        let second = batch(product, warehouse, Some((2025, 1, 5)), 6, 50, EntryStatus::Available);
        first.created_at = Utc.with_ymd_and_hms(2025, 1, 4, 8, 0, 0).unwrap();

        let err = ensure_fifo(FifoPolicy::default(), &second, &[first.clone(), second.clone()])
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(_) => {}
            _ => panic!("Expected InvariantViolation error for same-day tie"),
        }
    }

    #[test]
    fn disabled_policy_allows_any_order() {
        let product = ProductId::new(AggregateId::new());
        let warehouse = WarehouseId::new(AggregateId::new());
        let older = batch(product, warehouse, Some((2025, 1, 1)), 1, 50, EntryStatus::Available);
        let newer = batch(product, warehouse, Some((2025, 1, 10)), 10, 80, EntryStatus::Available);

        ensure_fifo(FifoPolicy::disabled(), &newer, &[older, newer.clone()]).unwrap();
    }
}
