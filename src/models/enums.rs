use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of stock-bearing item. Closed set: every match over it is exhaustive,
/// so a new item kind cannot silently fall through posting.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ItemType {
    #[sea_orm(string_value = "material")]
    Material,
    #[sea_orm(string_value = "finished_product")]
    FinishedProduct,
}

/// Ledger movement type.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionType {
    #[sea_orm(string_value = "grn")]
    Grn,
    #[sea_orm(string_value = "issue")]
    Issue,
    #[sea_orm(string_value = "adjustment")]
    Adjustment,
    #[sea_orm(string_value = "transfer_in")]
    TransferIn,
    #[sea_orm(string_value = "transfer_out")]
    TransferOut,
    #[sea_orm(string_value = "shipment")]
    Shipment,
}

/// Document that caused a movement or holds a reservation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReferenceType {
    #[sea_orm(string_value = "goods_receipt_note")]
    GoodsReceiptNote,
    #[sea_orm(string_value = "material_issue_note")]
    MaterialIssueNote,
    #[sea_orm(string_value = "stock_adjustment")]
    StockAdjustment,
    #[sea_orm(string_value = "stock_transfer")]
    StockTransfer,
    #[sea_orm(string_value = "delivery_order")]
    DeliveryOrder,
    #[sea_orm(string_value = "material_request")]
    MaterialRequest,
    #[sea_orm(string_value = "sales_order")]
    SalesOrder,
}

/// Reservation lifecycle. `Active` is the only non-terminal state.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReservationStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "fulfilled")]
    Fulfilled,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "expired")]
    Expired,
}

impl ReservationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ReservationStatus::Active)
    }

    pub fn can_transition_to(self, next: ReservationStatus) -> bool {
        matches!(
            (self, next),
            (
                ReservationStatus::Active,
                ReservationStatus::Fulfilled
                    | ReservationStatus::Cancelled
                    | ReservationStatus::Expired
            )
        )
    }
}

/// Explicit lifecycle for master records; stock-bearing rows are never hard-deleted.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LifecycleStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "deleted")]
    Deleted,
}
