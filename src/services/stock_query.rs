//! Read-side queries over the ledger and balances.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::entities::stock_balance::{self, Entity as StockBalance};
use crate::entities::stock_ledger::{self, Entity as StockLedger};
use crate::errors::ServiceError;
use crate::models::{ItemType, ReferenceType, StockingKey, TransactionType};
use crate::repositories::{StockBalanceRepository, StockLedgerRepository, StockReservationRepository};

const DEFAULT_LIMIT: u64 = 100;
const MAX_LIMIT: u64 = 1_000;

#[async_trait]
pub trait Query: Send + Sync {
    type Result: Send + Sync;

    async fn execute(&self, db: &DatabaseConnection) -> Result<Self::Result, ServiceError>;
}

fn page_limit(limit: Option<u64>) -> u64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Ledger entries in posting order, filtered by any combination of fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerQuery {
    pub item_type: Option<ItemType>,
    pub item_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub transaction_type: Option<TransactionType>,
    pub reference_type: Option<ReferenceType>,
    pub reference_id: Option<Uuid>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl LedgerQuery {
    fn condition(&self) -> Condition {
        use stock_ledger::Column;

        let mut cond = Condition::all();
        if let Some(item_type) = self.item_type {
            cond = cond.add(Column::ItemType.eq(item_type));
        }
        if let Some(item_id) = self.item_id {
            cond = cond.add(Column::ItemId.eq(item_id));
        }
        if let Some(warehouse_id) = self.warehouse_id {
            cond = cond.add(Column::WarehouseId.eq(warehouse_id));
        }
        if let Some(transaction_type) = self.transaction_type {
            cond = cond.add(Column::TransactionType.eq(transaction_type));
        }
        if let Some(reference_type) = self.reference_type {
            cond = cond.add(Column::ReferenceType.eq(reference_type));
        }
        if let Some(reference_id) = self.reference_id {
            cond = cond.add(Column::ReferenceId.eq(reference_id));
        }
        if let Some(from) = self.date_from {
            cond = cond.add(Column::TransactionDate.gte(from));
        }
        if let Some(to) = self.date_to {
            cond = cond.add(Column::TransactionDate.lte(to));
        }
        cond
    }
}

#[async_trait]
impl Query for LedgerQuery {
    type Result = Vec<stock_ledger::Model>;

    #[instrument(skip(self, db))]
    async fn execute(&self, db: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        Ok(StockLedger::find()
            .filter(self.condition())
            .order_by_asc(stock_ledger::Column::Id)
            .limit(page_limit(self.limit))
            .offset(self.offset.unwrap_or(0))
            .all(db)
            .await?)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BalanceQuery {
    pub item_type: Option<ItemType>,
    pub item_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub warehouse_location_id: Option<Uuid>,
    /// Skip keys with no physical quantity.
    #[serde(default)]
    pub non_zero_only: bool,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[async_trait]
impl Query for BalanceQuery {
    type Result = Vec<stock_balance::Model>;

    #[instrument(skip(self, db))]
    async fn execute(&self, db: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        use stock_balance::Column;

        let mut select = StockBalance::find();
        if let Some(item_type) = self.item_type {
            select = select.filter(Column::ItemType.eq(item_type));
        }
        if let Some(item_id) = self.item_id {
            select = select.filter(Column::ItemId.eq(item_id));
        }
        if let Some(warehouse_id) = self.warehouse_id {
            select = select.filter(Column::WarehouseId.eq(warehouse_id));
        }
        if let Some(location_id) = self.warehouse_location_id {
            select = select.filter(Column::WarehouseLocationId.eq(location_id));
        }
        if self.non_zero_only {
            select = select.filter(Column::Quantity.ne(Decimal::ZERO));
        }

        Ok(select
            .order_by_asc(Column::WarehouseId)
            .order_by_asc(Column::ItemId)
            .order_by_asc(Column::CreatedAt)
            .limit(page_limit(self.limit))
            .offset(self.offset.unwrap_or(0))
            .all(db)
            .await?)
    }
}

/// Point view of one key. A key that has never moved reads as all zeros.
#[derive(Debug, Clone, Serialize)]
pub struct StockLevel {
    pub stocking_key: StockingKey,
    pub quantity: Decimal,
    pub reserved_quantity: Decimal,
    pub available_quantity: Decimal,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLevelQuery {
    pub key: StockingKey,
}

#[async_trait]
impl Query for StockLevelQuery {
    type Result = StockLevel;

    async fn execute(&self, db: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let level = match StockBalanceRepository::find(db, &self.key).await? {
            Some(row) => StockLevel {
                stocking_key: self.key.clone(),
                quantity: row.quantity,
                reserved_quantity: row.reserved_quantity,
                available_quantity: row.available_quantity(),
                unit_cost: row.unit_cost,
                total_cost: row.total_cost,
            },
            None => StockLevel {
                stocking_key: self.key.clone(),
                quantity: Decimal::ZERO,
                reserved_quantity: Decimal::ZERO,
                available_quantity: Decimal::ZERO,
                unit_cost: Decimal::ZERO,
                total_cost: Decimal::ZERO,
            },
        };
        Ok(level)
    }
}

/// A balance row that disagrees with its ledger or its reservations.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerDivergence {
    pub stocking_key: StockingKey,
    pub balance_quantity: Decimal,
    pub ledger_sum: Decimal,
    pub last_balance_quantity: Decimal,
    pub reserved_quantity: Decimal,
    pub outstanding_reservations: Decimal,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LedgerVerification {
    pub keys_checked: u64,
    pub divergences: Vec<LedgerDivergence>,
}

impl LedgerVerification {
    pub fn is_consistent(&self) -> bool {
        self.divergences.is_empty()
    }
}

/// Replays every key's ledger and compares it with the balance row.
#[derive(Debug, Clone, Default)]
pub struct VerifyLedgerQuery;

#[async_trait]
impl Query for VerifyLedgerQuery {
    type Result = LedgerVerification;

    #[instrument(skip(self, db))]
    async fn execute(&self, db: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let mut report = LedgerVerification::default();

        for row in StockBalanceRepository::all(db).await? {
            let key = row.stocking_key();
            let entries = StockLedgerRepository::entries_for_key(db, &key).await?;
            let ledger_sum: Decimal = entries.iter().map(|e| e.quantity).sum();
            let last_balance_quantity = entries
                .last()
                .map(|e| e.balance_quantity)
                .unwrap_or(Decimal::ZERO);
            let outstanding_reservations: Decimal =
                StockReservationRepository::active_for_key(db, &key)
                    .await?
                    .iter()
                    .map(|r| r.outstanding_quantity())
                    .sum();

            report.keys_checked += 1;
            if row.quantity != ledger_sum
                || row.quantity != last_balance_quantity
                || row.reserved_quantity != outstanding_reservations
            {
                warn!(
                    stocking_key = %key,
                    balance_quantity = %row.quantity,
                    ledger_sum = %ledger_sum,
                    reserved_quantity = %row.reserved_quantity,
                    outstanding = %outstanding_reservations,
                    "Stock balance diverges from ledger"
                );
                report.divergences.push(LedgerDivergence {
                    stocking_key: key,
                    balance_quantity: row.quantity,
                    ledger_sum,
                    last_balance_quantity,
                    reserved_quantity: row.reserved_quantity,
                    outstanding_reservations,
                });
            }
        }
        Ok(report)
    }
}

/// Number of ledger entries matching a filter.
pub async fn count_ledger_entries(
    db: &DatabaseConnection,
    query: &LedgerQuery,
) -> Result<u64, ServiceError> {
    Ok(StockLedger::find()
        .filter(query.condition())
        .count(db)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_limit_is_bounded() {
        assert_eq!(page_limit(None), DEFAULT_LIMIT);
        assert_eq!(page_limit(Some(0)), 1);
        assert_eq!(page_limit(Some(50_000)), MAX_LIMIT);
    }

    #[test]
    fn empty_ledger_query_has_no_filters() {
        assert!(LedgerQuery::default().condition().is_empty());
    }
}
