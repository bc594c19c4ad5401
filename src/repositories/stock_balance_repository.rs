use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Set,
};
use tracing::debug;
use uuid::Uuid;

use crate::entities::stock_balance::{self, Column, Entity as StockBalance};
use crate::errors::ServiceError;
use crate::models::StockingKey;

/// New quantity and cost for a stocking key after a movement.
#[derive(Debug, Clone)]
pub struct BalanceUpdate {
    pub key: StockingKey,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub last_transaction_date: NaiveDate,
}

pub struct StockBalanceRepository;

impl StockBalanceRepository {
    fn key_columns() -> [Column; 6] {
        [
            Column::ItemType,
            Column::ItemId,
            Column::WarehouseId,
            Column::WarehouseLocationId,
            Column::BatchNumber,
            Column::LotNumber,
        ]
    }

    fn new_row(
        key: &StockingKey,
        quantity: Decimal,
        unit_cost: Decimal,
        last_transaction_date: Option<NaiveDate>,
    ) -> stock_balance::ActiveModel {
        let now = Utc::now();
        stock_balance::ActiveModel {
            id: Set(Uuid::new_v4()),
            item_type: Set(key.item_type),
            item_id: Set(key.item_id),
            warehouse_id: Set(key.warehouse_id),
            warehouse_location_id: Set(key.location_column()),
            batch_number: Set(key.batch_column()),
            lot_number: Set(key.lot_column()),
            quantity: Set(quantity),
            reserved_quantity: Set(Decimal::ZERO),
            unit_cost: Set(unit_cost),
            total_cost: Set(quantity * unit_cost),
            last_transaction_date: Set(last_transaction_date),
            created_at: Set(now),
            updated_at: Set(now),
        }
    }

    /// Balance row for `key` without locking, if one exists.
    pub async fn find<C: ConnectionTrait>(
        db: &C,
        key: &StockingKey,
    ) -> Result<Option<stock_balance::Model>, ServiceError> {
        Ok(StockBalance::find()
            .filter(key.condition::<Column>())
            .one(db)
            .await?)
    }

    /// Balance row for `key`; a key that never received stock is `NotFound`.
    pub async fn get<C: ConnectionTrait>(
        db: &C,
        key: &StockingKey,
    ) -> Result<stock_balance::Model, ServiceError> {
        Self::find(db, key)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("No stock balance for {}", key)))
    }

    /// `SELECT ... FOR UPDATE` on the balance row. Held until the enclosing
    /// transaction ends.
    pub async fn lock<C: ConnectionTrait>(
        db: &C,
        key: &StockingKey,
    ) -> Result<Option<stock_balance::Model>, ServiceError> {
        Ok(StockBalance::find()
            .filter(key.condition::<Column>())
            .lock_exclusive()
            .one(db)
            .await?)
    }

    /// Inserts an empty row for `key` unless one exists, so concurrent first
    /// receipts have a row to queue on.
    pub async fn ensure_row<C: ConnectionTrait>(
        db: &C,
        key: &StockingKey,
    ) -> Result<(), ServiceError> {
        let inserted = StockBalance::insert(Self::new_row(key, Decimal::ZERO, Decimal::ZERO, None))
            .on_conflict(
                OnConflict::columns(Self::key_columns())
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
        if inserted > 0 {
            debug!(stocking_key = %key, "Created empty stock balance row");
        }
        Ok(())
    }

    /// Insert-or-update keyed on the full stocking key. `reserved_quantity`
    /// is left untouched on conflict.
    pub async fn upsert<C: ConnectionTrait>(
        db: &C,
        update: BalanceUpdate,
    ) -> Result<stock_balance::Model, ServiceError> {
        let row = Self::new_row(
            &update.key,
            update.quantity,
            update.unit_cost,
            Some(update.last_transaction_date),
        );
        StockBalance::insert(row)
            .on_conflict(
                OnConflict::columns(Self::key_columns())
                    .update_columns([
                        Column::Quantity,
                        Column::UnitCost,
                        Column::TotalCost,
                        Column::LastTransactionDate,
                        Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;

        Self::find(db, &update.key).await?.ok_or_else(|| {
            ServiceError::InternalError(format!(
                "Stock balance for {} missing after upsert",
                update.key
            ))
        })
    }

    /// Adds `delta` (signed) to `reserved_quantity` in place.
    pub async fn adjust_reserved<C: ConnectionTrait>(
        db: &C,
        key: &StockingKey,
        delta: Decimal,
    ) -> Result<(), ServiceError> {
        let result = StockBalance::update_many()
            .col_expr(
                Column::ReservedQuantity,
                Expr::col(Column::ReservedQuantity).add(delta),
            )
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(key.condition::<Column>())
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "No stock balance for {}",
                key
            )));
        }
        debug!(stocking_key = %key, delta = %delta, "Reserved quantity adjusted");
        Ok(())
    }

    /// Every balance row, for audits that walk all keys.
    pub async fn all<C: ConnectionTrait>(db: &C) -> Result<Vec<stock_balance::Model>, ServiceError> {
        Ok(StockBalance::find().all(db).await?)
    }
}
