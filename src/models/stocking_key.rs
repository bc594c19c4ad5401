//! The identity every balance, ledger entry and reservation is tracked against.

use sea_orm::{ColumnTrait, Condition};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::enums::ItemType;

/// Stored in place of an absent location.
pub const NO_LOCATION: Uuid = Uuid::nil();
/// Stored in place of an absent batch or lot number.
pub const NO_CODE: &str = "";

/// `(item_type, item_id, warehouse, location?, batch?, lot?)`.
///
/// Absent location/batch/lot are a fixed value, not a wildcard: a key without
/// a batch never matches a key with one. Blank batch and lot strings are
/// normalized to absent so both spellings compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockingKey {
    pub item_type: ItemType,
    pub item_id: Uuid,
    pub warehouse_id: Uuid,
    pub warehouse_location_id: Option<Uuid>,
    pub batch_number: Option<String>,
    pub lot_number: Option<String>,
}

impl StockingKey {
    pub fn new(item_type: ItemType, item_id: Uuid, warehouse_id: Uuid) -> Self {
        Self {
            item_type,
            item_id,
            warehouse_id,
            warehouse_location_id: None,
            batch_number: None,
            lot_number: None,
        }
    }

    pub fn material(material_id: Uuid, warehouse_id: Uuid) -> Self {
        Self::new(ItemType::Material, material_id, warehouse_id)
    }

    pub fn finished_product(product_id: Uuid, warehouse_id: Uuid) -> Self {
        Self::new(ItemType::FinishedProduct, product_id, warehouse_id)
    }

    pub fn with_location(mut self, location_id: Option<Uuid>) -> Self {
        self.warehouse_location_id = location_id.filter(|id| *id != NO_LOCATION);
        self
    }

    pub fn with_batch(mut self, batch_number: Option<impl Into<String>>) -> Self {
        self.batch_number = normalize_code(batch_number.map(Into::into));
        self
    }

    pub fn with_lot(mut self, lot_number: Option<impl Into<String>>) -> Self {
        self.lot_number = normalize_code(lot_number.map(Into::into));
        self
    }

    /// Same item, batch and lot in another warehouse/location.
    pub fn relocated(&self, warehouse_id: Uuid, location_id: Option<Uuid>) -> Self {
        Self {
            warehouse_id,
            ..self.clone()
        }
        .with_location(location_id)
    }

    /// Rebuilds a key from its persisted columns.
    pub fn from_columns(
        item_type: ItemType,
        item_id: Uuid,
        warehouse_id: Uuid,
        location_id: Uuid,
        batch_number: &str,
        lot_number: &str,
    ) -> Self {
        Self::new(item_type, item_id, warehouse_id)
            .with_location(Some(location_id))
            .with_batch(Some(batch_number))
            .with_lot(Some(lot_number))
    }

    pub fn location_column(&self) -> Uuid {
        self.warehouse_location_id.unwrap_or(NO_LOCATION)
    }

    pub fn batch_column(&self) -> String {
        self.batch_number.clone().unwrap_or_else(|| NO_CODE.to_string())
    }

    pub fn lot_column(&self) -> String {
        self.lot_number.clone().unwrap_or_else(|| NO_CODE.to_string())
    }

    /// Sort key for taking several balance row locks. Every caller that
    /// locks more than one key locks them in this order.
    pub fn lock_order(&self) -> (Uuid, Uuid, Uuid, String, String, String) {
        (
            self.warehouse_id,
            self.item_id,
            self.location_column(),
            self.batch_column(),
            self.lot_column(),
            self.item_type.to_string(),
        )
    }

    /// Exact-match filter on all six key columns of `C`'s table.
    pub fn condition<C: StockingKeyColumns>(&self) -> Condition {
        Condition::all()
            .add(C::ITEM_TYPE.eq(self.item_type))
            .add(C::ITEM_ID.eq(self.item_id))
            .add(C::WAREHOUSE_ID.eq(self.warehouse_id))
            .add(C::WAREHOUSE_LOCATION_ID.eq(self.location_column()))
            .add(C::BATCH_NUMBER.eq(self.batch_column()))
            .add(C::LOT_NUMBER.eq(self.lot_column()))
    }
}

impl fmt::Display for StockingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}@{}/{}/{}/{}",
            self.item_type,
            self.item_id,
            self.warehouse_id,
            self.warehouse_location_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
            self.batch_number.as_deref().unwrap_or("-"),
            self.lot_number.as_deref().unwrap_or("-"),
        )
    }
}

fn normalize_code(code: Option<String>) -> Option<String> {
    code.map(|c| c.trim().to_string()).filter(|c| !c.is_empty())
}

/// Tables that carry the six stocking-key columns.
pub trait StockingKeyColumns: ColumnTrait {
    const ITEM_TYPE: Self;
    const ITEM_ID: Self;
    const WAREHOUSE_ID: Self;
    const WAREHOUSE_LOCATION_ID: Self;
    const BATCH_NUMBER: Self;
    const LOT_NUMBER: Self;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_codes_equal_absent_codes() {
        let item = Uuid::new_v4();
        let wh = Uuid::new_v4();
        let a = StockingKey::material(item, wh).with_batch(Some("  "));
        let b = StockingKey::material(item, wh).with_batch(None::<String>);
        assert_eq!(a, b);
        assert_eq!(a.batch_column(), NO_CODE);
    }

    #[test]
    fn lock_order_ignores_line_order() {
        let item = Uuid::new_v4();
        let a = StockingKey::material(item, Uuid::new_v4());
        let b = a.relocated(Uuid::new_v4(), None);

        let mut forward = vec![&a, &b];
        let mut backward = vec![&b, &a];
        forward.sort_by_key(|k| k.lock_order());
        backward.sort_by_key(|k| k.lock_order());
        assert_eq!(forward, backward);
    }

    #[test]
    fn absent_location_is_not_a_wildcard() {
        let item = Uuid::new_v4();
        let wh = Uuid::new_v4();
        let bare = StockingKey::material(item, wh);
        let located = StockingKey::material(item, wh).with_location(Some(Uuid::new_v4()));
        assert_ne!(bare, located);
        assert_eq!(bare.location_column(), NO_LOCATION);
    }

    #[test]
    fn column_round_trip_preserves_identity() {
        let key = StockingKey::finished_product(Uuid::new_v4(), Uuid::new_v4())
            .with_location(Some(Uuid::new_v4()))
            .with_batch(Some("B-01"))
            .with_lot(None::<String>);
        let rebuilt = StockingKey::from_columns(
            key.item_type,
            key.item_id,
            key.warehouse_id,
            key.location_column(),
            &key.batch_column(),
            &key.lot_column(),
        );
        assert_eq!(key, rebuilt);
    }

    #[test]
    fn relocated_keeps_item_batch_and_lot() {
        let key = StockingKey::material(Uuid::new_v4(), Uuid::new_v4())
            .with_batch(Some("B7"))
            .with_lot(Some("L1"));
        let target = Uuid::new_v4();
        let moved = key.relocated(target, None);
        assert_eq!(moved.warehouse_id, target);
        assert_eq!(moved.batch_number.as_deref(), Some("B7"));
        assert_eq!(moved.lot_number.as_deref(), Some("L1"));
        assert_eq!(moved.item_id, key.item_id);
    }
}
