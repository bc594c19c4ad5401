use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "goods_receipt_note_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub goods_receipt_note_id: Uuid,
    pub material_id: Uuid,
    pub warehouse_location_id: Option<Uuid>,
    pub batch_number: Option<String>,
    pub lot_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub received_quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub accepted_quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub rejected_quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub unit_cost: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::goods_receipt_note::Entity",
        from = "Column::GoodsReceiptNoteId",
        to = "super::goods_receipt_note::Column::Id"
    )]
    GoodsReceiptNote,
}

impl Related<super::goods_receipt_note::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GoodsReceiptNote.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
