use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::{ItemType, ReferenceType, StockingKey, StockingKeyColumns, TransactionType};

/// One immutable inventory movement. Rows are only ever inserted.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_ledger")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub transaction_type: TransactionType,
    pub transaction_number: String,
    pub transaction_date: NaiveDate,
    pub item_type: ItemType,
    pub item_id: Uuid,
    pub warehouse_id: Uuid,
    pub warehouse_location_id: Uuid,
    pub batch_number: String,
    pub lot_number: String,
    pub expiry_date: Option<NaiveDate>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub unit_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub balance_quantity: Decimal,
    pub reference_type: ReferenceType,
    pub reference_id: Uuid,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
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

    pub fn is_inbound(&self) -> bool {
        self.quantity.is_sign_positive()
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
