use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::ItemType;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_transfer_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub stock_transfer_id: Uuid,
    pub item_type: ItemType,
    pub item_id: Uuid,
    pub from_location_id: Option<Uuid>,
    pub to_location_id: Option<Uuid>,
    pub batch_number: Option<String>,
    pub lot_number: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub quantity: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stock_transfer::Entity",
        from = "Column::StockTransferId",
        to = "super::stock_transfer::Column::Id"
    )]
    StockTransfer,
}

impl Related<super::stock_transfer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockTransfer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
