use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::ItemType;

/// `quantity` is signed: positive adds stock, negative removes it.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_adjustment_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub stock_adjustment_id: Uuid,
    pub item_type: ItemType,
    pub item_id: Uuid,
    pub warehouse_location_id: Option<Uuid>,
    pub batch_number: Option<String>,
    pub lot_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub unit_cost: Option<Decimal>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stock_adjustment::Entity",
        from = "Column::StockAdjustmentId",
        to = "super::stock_adjustment::Column::Id"
    )]
    StockAdjustment,
}

impl Related<super::stock_adjustment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockAdjustment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
