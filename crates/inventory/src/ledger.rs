//! Stock ledger: the per-slot balance book.
//!
//! A slot is one (product, location) pair, where a location is either customs
//! stock under an import shipment or warehouse stock under a stock entry.
//! Every slot tracks available / reserved / issued quantities plus the landed
//! cost carried by that stock. Balances floor at zero on every mutation, so
//! the never-negative invariant holds by construction.
//!
//! The ledger itself is a plain keyed map: availability checks and FIFO rules
//! run in the workflow layer before commands are dispatched, and the read
//! model keeps one ledger per tenant.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use plasticflow_catalog::{ProductId, WarehouseId};
use plasticflow_core::clamp_non_negative;
use plasticflow_shipping::ImportShipmentId;

use crate::entry::StockEntryId;

/// Where a slot's stock physically sits.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StockLocation {
    /// Cleared or in-transit goods still under the shipment at customs.
    Customs { shipment: ImportShipmentId },
    /// Goods moved into a warehouse, tracked per stock entry (batch).
    Warehouse {
        warehouse: WarehouseId,
        entry: StockEntryId,
    },
}

/// Location discriminant for aggregated queries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    Customs,
    Warehouse,
}

impl StockLocation {
    pub fn kind(&self) -> LocationKind {
        match self {
            StockLocation::Customs { .. } => LocationKind::Customs,
            StockLocation::Warehouse { .. } => LocationKind::Warehouse,
        }
    }

    pub fn warehouse(&self) -> Option<WarehouseId> {
        match self {
            StockLocation::Warehouse { warehouse, .. } => Some(*warehouse),
            StockLocation::Customs { .. } => None,
        }
    }

    pub fn shipment(&self) -> Option<ImportShipmentId> {
        match self {
            StockLocation::Customs { shipment } => Some(*shipment),
            StockLocation::Warehouse { .. } => None,
        }
    }

    pub fn entry(&self) -> Option<StockEntryId> {
        match self {
            StockLocation::Warehouse { entry, .. } => Some(*entry),
            StockLocation::Customs { .. } => None,
        }
    }
}

/// Ledger slot key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub product: ProductId,
    pub location: StockLocation,
}

/// Balances and cost figures carried by one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotBalances {
    pub available: Decimal,
    pub reserved: Decimal,
    pub issued: Decimal,
    /// Landed cost per unit, local currency.
    pub landed_cost_rate: Decimal,
    /// Landed cost for the slot's original quantity, local currency.
    pub landed_cost_amount: Decimal,
    pub last_movement: DateTime<Utc>,
    pub remark: Option<String>,
}

impl SlotBalances {
    fn new(at: DateTime<Utc>) -> Self {
        Self {
            available: Decimal::ZERO,
            reserved: Decimal::ZERO,
            issued: Decimal::ZERO,
            landed_cost_rate: Decimal::ZERO,
            landed_cost_amount: Decimal::ZERO,
            last_movement: at,
            remark: None,
        }
    }

    /// Value of the on-hand (available + reserved) quantity at the slot's
    /// landed cost rate.
    pub fn stock_value(&self) -> Decimal {
        (self.available + self.reserved) * self.landed_cost_rate
    }
}

/// Absolute overwrite for `set_balances`; `None` fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotUpdate {
    pub available: Option<Decimal>,
    pub reserved: Option<Decimal>,
    pub issued: Option<Decimal>,
    pub landed_cost_rate: Option<Decimal>,
    pub landed_cost_amount: Option<Decimal>,
    pub remark: Option<String>,
}

/// Relative adjustment for `apply_delta`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDelta {
    pub available: Decimal,
    pub reserved: Decimal,
    pub issued: Decimal,
}

/// The balance book.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockLedger {
    slots: HashMap<SlotKey, SlotBalances>,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, key: &SlotKey) -> Option<&SlotBalances> {
        self.slots.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SlotKey, &SlotBalances)> {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Absolute overwrite of a slot; creates it when missing. Idempotent
    /// resync point for stock entry transitions.
    pub fn set_balances(&mut self, key: SlotKey, update: SlotUpdate, at: DateTime<Utc>) {
        let slot = self
            .slots
            .entry(key)
            .or_insert_with(|| SlotBalances::new(at));
        if let Some(available) = update.available {
            slot.available = clamp_non_negative(available);
        }
        if let Some(reserved) = update.reserved {
            slot.reserved = clamp_non_negative(reserved);
        }
        if let Some(issued) = update.issued {
            slot.issued = clamp_non_negative(issued);
        }
        if let Some(rate) = update.landed_cost_rate {
            slot.landed_cost_rate = rate;
        }
        if let Some(amount) = update.landed_cost_amount {
            slot.landed_cost_amount = amount;
        }
        if update.remark.is_some() {
            slot.remark = update.remark;
        }
        slot.last_movement = at;
    }

    /// Relative adjustment; every balance floors at zero.
    pub fn apply_delta(
        &mut self,
        key: SlotKey,
        delta: BalanceDelta,
        remark: Option<String>,
        at: DateTime<Utc>,
    ) {
        let slot = self
            .slots
            .entry(key)
            .or_insert_with(|| SlotBalances::new(at));
        slot.available = clamp_non_negative(slot.available + delta.available);
        slot.reserved = clamp_non_negative(slot.reserved + delta.reserved);
        slot.issued = clamp_non_negative(slot.issued + delta.issued);
        if remark.is_some() {
            slot.remark = remark;
        }
        slot.last_movement = at;
    }

    pub fn clear_slot(&mut self, key: &SlotKey) {
        self.slots.remove(key);
    }

    /// Remove every warehouse slot belonging to a stock entry.
    pub fn clear_entry(&mut self, entry: StockEntryId) {
        self.slots.retain(|key, _| key.location.entry() != Some(entry));
    }

    /// Remove every customs slot belonging to a shipment.
    pub fn clear_shipment(&mut self, shipment: ImportShipmentId) {
        self.slots
            .retain(|key, _| key.location.shipment() != Some(shipment));
    }

    /// Aggregated available quantity for a product at a location kind.
    pub fn available(&self, product: ProductId, kind: LocationKind) -> Decimal {
        self.slots
            .iter()
            .filter(|(key, _)| key.product == product && key.location.kind() == kind)
            .map(|(_, slot)| slot.available)
            .sum()
    }

    /// Available quantity for a product in one warehouse.
    pub fn available_in_warehouse(&self, product: ProductId, warehouse: WarehouseId) -> Decimal {
        self.slots
            .iter()
            .filter(|(key, _)| {
                key.product == product && key.location.warehouse() == Some(warehouse)
            })
            .map(|(_, slot)| slot.available)
            .sum()
    }

    /// Available quantity for a product still at customs under one shipment.
    pub fn available_for_shipment(
        &self,
        product: ProductId,
        shipment: ImportShipmentId,
    ) -> Decimal {
        self.slots
            .iter()
            .filter(|(key, _)| {
                key.product == product && key.location.shipment() == Some(shipment)
            })
            .map(|(_, slot)| slot.available)
            .sum()
    }

    // Movement verbs.

    /// available -> reserved.
    pub fn reserve(&mut self, key: SlotKey, quantity: Decimal, at: DateTime<Utc>) {
        self.apply_delta(
            key,
            BalanceDelta {
                available: -quantity,
                reserved: quantity,
                issued: Decimal::ZERO,
            },
            None,
            at,
        );
    }

    /// reserved -> available.
    pub fn release(&mut self, key: SlotKey, quantity: Decimal, at: DateTime<Utc>) {
        self.apply_delta(
            key,
            BalanceDelta {
                available: quantity,
                reserved: -quantity,
                issued: Decimal::ZERO,
            },
            None,
            at,
        );
    }

    /// reserved -> issued.
    pub fn issue(&mut self, key: SlotKey, quantity: Decimal, at: DateTime<Utc>) {
        self.apply_delta(
            key,
            BalanceDelta {
                available: Decimal::ZERO,
                reserved: -quantity,
                issued: quantity,
            },
            None,
            at,
        );
    }

    /// issued -> reserved.
    pub fn reverse_issue(&mut self, key: SlotKey, quantity: Decimal, at: DateTime<Utc>) {
        self.apply_delta(
            key,
            BalanceDelta {
                available: Decimal::ZERO,
                reserved: quantity,
                issued: -quantity,
            },
            None,
            at,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plasticflow_core::AggregateId;

    fn product() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn warehouse_key(product: ProductId) -> SlotKey {
        SlotKey {
            product,
            location: StockLocation::Warehouse {
                warehouse: WarehouseId::new(AggregateId::new()),
                entry: StockEntryId::new(AggregateId::new()),
            },
        }
    }

    fn customs_key(product: ProductId) -> SlotKey {
        SlotKey {
            product,
            location: StockLocation::Customs {
                shipment: ImportShipmentId::new(AggregateId::new()),
            },
        }
    }

    #[test]
    fn set_balances_overwrites_only_provided_fields() {
        let mut ledger = StockLedger::new();
        let key = warehouse_key(product());

        ledger.set_balances(
            key,
            SlotUpdate {
                available: Some(Decimal::new(100, 0)),
                reserved: Some(Decimal::ZERO),
                issued: Some(Decimal::ZERO),
                landed_cost_rate: Some(Decimal::new(120, 0)),
                landed_cost_amount: Some(Decimal::new(12_000, 0)),
                remark: Some("Stock available in warehouse".to_string()),
            },
            Utc::now(),
        );
        ledger.set_balances(
            key,
            SlotUpdate {
                available: Some(Decimal::new(80, 0)),
                ..SlotUpdate::default()
            },
            Utc::now(),
        );

        let slot = ledger.slot(&key).unwrap();
        assert_eq!(slot.available, Decimal::new(80, 0));
        assert_eq!(slot.landed_cost_rate, Decimal::new(120, 0));
        assert_eq!(slot.remark.as_deref(), Some("Stock available in warehouse"));
    }

    #[test]
    fn apply_delta_floors_every_balance_at_zero() {
        let mut ledger = StockLedger::new();
        let key = warehouse_key(product());

        ledger.apply_delta(
            key,
            BalanceDelta {
                available: Decimal::new(-50, 0),
                reserved: Decimal::new(10, 0),
                issued: Decimal::new(-1, 0),
            },
            None,
            Utc::now(),
        );

        let slot = ledger.slot(&key).unwrap();
        assert_eq!(slot.available, Decimal::ZERO);
        assert_eq!(slot.reserved, Decimal::new(10, 0));
        assert_eq!(slot.issued, Decimal::ZERO);
    }

    #[test]
    fn movement_verbs_shift_quantity_between_columns() {
        let mut ledger = StockLedger::new();
        let key = warehouse_key(product());
        ledger.set_balances(
            key,
            SlotUpdate {
                available: Some(Decimal::new(100, 0)),
                ..SlotUpdate::default()
            },
            Utc::now(),
        );

        ledger.reserve(key, Decimal::new(30, 0), Utc::now());
        ledger.issue(key, Decimal::new(10, 0), Utc::now());

        let slot = ledger.slot(&key).unwrap();
        assert_eq!(slot.available, Decimal::new(70, 0));
        assert_eq!(slot.reserved, Decimal::new(20, 0));
        assert_eq!(slot.issued, Decimal::new(10, 0));

        ledger.reverse_issue(key, Decimal::new(10, 0), Utc::now());
        ledger.release(key, Decimal::new(30, 0), Utc::now());

        let slot = ledger.slot(&key).unwrap();
        assert_eq!(slot.available, Decimal::new(100, 0));
        assert_eq!(slot.reserved, Decimal::ZERO);
        assert_eq!(slot.issued, Decimal::ZERO);
    }

    #[test]
    fn availability_queries_aggregate_by_location_kind() {
        let mut ledger = StockLedger::new();
        let p = product();
        let wh_key = warehouse_key(p);
        let customs = customs_key(p);

        ledger.set_balances(
            wh_key,
            SlotUpdate {
                available: Some(Decimal::new(60, 0)),
                ..SlotUpdate::default()
            },
            Utc::now(),
        );
        ledger.set_balances(
            customs,
            SlotUpdate {
                available: Some(Decimal::new(40, 0)),
                ..SlotUpdate::default()
            },
            Utc::now(),
        );

        assert_eq!(
            ledger.available(p, LocationKind::Warehouse),
            Decimal::new(60, 0)
        );
        assert_eq!(
            ledger.available(p, LocationKind::Customs),
            Decimal::new(40, 0)
        );
        let StockLocation::Warehouse { warehouse, .. } = wh_key.location else {
            unreachable!()
        };
        assert_eq!(
            ledger.available_in_warehouse(p, warehouse),
            Decimal::new(60, 0)
        );
        let StockLocation::Customs { shipment } = customs.location else {
            unreachable!()
        };
        assert_eq!(ledger.available_for_shipment(p, shipment), Decimal::new(40, 0));
    }

    #[test]
    fn clear_entry_removes_only_that_entrys_slots() {
        let mut ledger = StockLedger::new();
        let p = product();
        let wh_key = warehouse_key(p);
        let customs = customs_key(p);
        ledger.set_balances(wh_key, SlotUpdate::default(), Utc::now());
        ledger.set_balances(customs, SlotUpdate::default(), Utc::now());

        let StockLocation::Warehouse { entry, .. } = wh_key.location else {
            unreachable!()
        };
        ledger.clear_entry(entry);

        assert!(ledger.slot(&wh_key).is_none());
        assert!(ledger.slot(&customs).is_some());
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// No sequence of deltas can drive any balance negative.
            #[test]
            fn balances_never_go_negative(deltas in proptest::collection::vec(
                (-1_000i64..1_000, -1_000i64..1_000, -1_000i64..1_000),
                1..50,
            )) {
                let mut ledger = StockLedger::new();
                let key = warehouse_key(product());
                for (a, r, i) in deltas {
                    ledger.apply_delta(
                        key,
                        BalanceDelta {
                            available: Decimal::new(a, 0),
                            reserved: Decimal::new(r, 0),
                            issued: Decimal::new(i, 0),
                        },
                        None,
                        Utc::now(),
                    );
                    let slot = ledger.slot(&key).unwrap();
                    prop_assert!(slot.available >= Decimal::ZERO);
                    prop_assert!(slot.reserved >= Decimal::ZERO);
                    prop_assert!(slot.issued >= Decimal::ZERO);
                }
            }
        }
    }
}
