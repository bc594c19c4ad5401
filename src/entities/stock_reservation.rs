use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::{
    ItemType, ReferenceType, ReservationStatus, StockingKey, StockingKeyColumns,
};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_reservations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub item_type: ItemType,
    pub item_id: Uuid,
    pub warehouse_id: Uuid,
    pub warehouse_location_id: Uuid,
    pub batch_number: String,
    pub lot_number: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub reserved_quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub fulfilled_quantity: Decimal,
    pub reference_type: ReferenceType,
    pub reference_id: Uuid,
    pub status: ReservationStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Quantity still held against the balance.
    pub fn outstanding_quantity(&self) -> Decimal {
        (self.reserved_quantity - self.fulfilled_quantity).max(Decimal::ZERO)
    }

    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Active
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }

    pub fn stocking_key(&self) -> StockingKey {
        StockingKey::from_columns(
            self.item_type,
            self.item_id,
            self.warehouse_id,
            self.warehouse_location_id,
            &self.batch_number,
            &self.lot_number,
        )
    }
}

impl StockingKeyColumns for Column {
    const ITEM_TYPE: Self = Column::ItemType;
    const ITEM_ID: Self = Column::ItemId;
    const WAREHOUSE_ID: Self = Column::WarehouseId;
    const WAREHOUSE_LOCATION_ID: Self = Column::WarehouseLocationId;
    const BATCH_NUMBER: Self = Column::BatchNumber;
    const LOT_NUMBER: Self = Column::LotNumber;
}
