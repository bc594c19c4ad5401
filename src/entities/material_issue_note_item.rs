use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "material_issue_note_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub material_issue_note_id: Uuid,
    pub material_id: Uuid,
    pub warehouse_location_id: Option<Uuid>,
    pub batch_number: Option<String>,
    pub lot_number: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub quantity: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::material_issue_note::Entity",
        from = "Column::MaterialIssueNoteId",
        to = "super::material_issue_note::Column::Id"
    )]
    MaterialIssueNote,
}

impl Related<super::material_issue_note::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MaterialIssueNote.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
