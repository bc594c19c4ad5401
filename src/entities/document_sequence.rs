use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Last number handed out per document type and `YYYYMM` period.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "document_sequences")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub document_type: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub period: String,
    pub last_value: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
