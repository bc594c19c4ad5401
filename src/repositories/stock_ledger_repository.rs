use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use tracing::debug;
use uuid::Uuid;

use crate::entities::stock_ledger::{self, Column, Entity as StockLedger};
use crate::errors::ServiceError;
use crate::models::{ReferenceType, StockingKey, TransactionType};

/// A movement ready to be appended. `quantity` is signed and
/// `balance_quantity` is the running balance after this movement.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub transaction_type: TransactionType,
    pub transaction_number: String,
    pub transaction_date: NaiveDate,
    pub key: StockingKey,
    pub expiry_date: Option<NaiveDate>,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub balance_quantity: Decimal,
    pub reference_type: ReferenceType,
    pub reference_id: Uuid,
    pub created_by: String,
}

pub struct StockLedgerRepository;

impl StockLedgerRepository {
    /// Inserts one immutable ledger row.
    pub async fn append<C: ConnectionTrait>(
        db: &C,
        entry: NewLedgerEntry,
    ) -> Result<stock_ledger::Model, ServiceError> {
        let total_cost = entry.quantity * entry.unit_cost;
        let model = stock_ledger::ActiveModel {
            id: NotSet,
            transaction_type: Set(entry.transaction_type),
            transaction_number: Set(entry.transaction_number),
            transaction_date: Set(entry.transaction_date),
            item_type: Set(entry.key.item_type),
            item_id: Set(entry.key.item_id),
            warehouse_id: Set(entry.key.warehouse_id),
            warehouse_location_id: Set(entry.key.location_column()),
            batch_number: Set(entry.key.batch_column()),
            lot_number: Set(entry.key.lot_column()),
            expiry_date: Set(entry.expiry_date),
            quantity: Set(entry.quantity),
            unit_cost: Set(entry.unit_cost),
            total_cost: Set(total_cost),
            balance_quantity: Set(entry.balance_quantity),
            reference_type: Set(entry.reference_type),
            reference_id: Set(entry.reference_id),
            created_by: Set(entry.created_by),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await?;

        debug!(
            ledger_id = model.id,
            transaction_type = %model.transaction_type,
            quantity = %model.quantity,
            balance_quantity = %model.balance_quantity,
            "Ledger entry appended"
        );
        Ok(model)
    }

    /// Running balance after the newest entry for `key`, zero when the key
    /// has never moved. Call it only while holding the balance row lock.
    pub async fn latest_balance<C: ConnectionTrait>(
        db: &C,
        key: &StockingKey,
    ) -> Result<Decimal, ServiceError> {
        let latest = StockLedger::find()
            .filter(key.condition::<Column>())
            .order_by_desc(Column::Id)
            .one(db)
            .await?;
        Ok(latest
            .map(|entry| entry.balance_quantity)
            .unwrap_or(Decimal::ZERO))
    }

    /// All entries for `key` in insertion order.
    pub async fn entries_for_key<C: ConnectionTrait>(
        db: &C,
        key: &StockingKey,
    ) -> Result<Vec<stock_ledger::Model>, ServiceError> {
        Ok(StockLedger::find()
            .filter(key.condition::<Column>())
            .order_by_asc(Column::Id)
            .all(db)
            .await?)
    }

    /// Entries written by one posting document.
    pub async fn entries_for_reference<C: ConnectionTrait>(
        db: &C,
        reference_type: ReferenceType,
        reference_id: Uuid,
    ) -> Result<Vec<stock_ledger::Model>, ServiceError> {
        Ok(StockLedger::find()
            .filter(Column::ReferenceType.eq(reference_type))
            .filter(Column::ReferenceId.eq(reference_id))
            .order_by_asc(Column::Id)
            .all(db)
            .await?)
    }

    /// Sum of every signed quantity for `key`.
    pub async fn replay_quantity<C: ConnectionTrait>(
        db: &C,
        key: &StockingKey,
    ) -> Result<Decimal, ServiceError> {
        let entries = Self::entries_for_key(db, key).await?;
        Ok(entries.iter().map(|e| e.quantity).sum())
    }
}
