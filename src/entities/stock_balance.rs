use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::{ItemType, StockingKey, StockingKeyColumns};

/// Materialized balance for one stocking key.
///
/// The table also carries a generated `available_quantity` column for
/// reporting; the model derives it instead of selecting it.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_balance")]
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
    pub quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub reserved_quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub unit_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_cost: Decimal,
    pub last_transaction_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn available_quantity(&self) -> Decimal {
        self.quantity - self.reserved_quantity
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
