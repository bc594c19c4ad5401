use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "delivery_order_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub delivery_order_id: Uuid,
    pub finished_product_id: Uuid,
    pub warehouse_location_id: Option<Uuid>,
    pub batch_number: Option<String>,
    pub lot_number: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub quantity: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::delivery_order::Entity",
        from = "Column::DeliveryOrderId",
        to = "super::delivery_order::Column::Id"
    )]
    DeliveryOrder,
}

impl Related<super::delivery_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeliveryOrder.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
