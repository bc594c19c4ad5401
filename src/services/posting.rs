//! Posting operations: the only code that writes `stock_ledger` and the
//! quantity/cost columns of `stock_balance`.
//!
//! Every operation runs inside the caller's transaction and takes the
//! balance row lock before it reads the ledger, so two postings on the same
//! key queue behind each other instead of computing from the same previous
//! balance. Document services add their own status update to the same
//! transaction and commit.

use chrono::NaiveDate;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::DatabaseTransaction;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::entities::{stock_balance, stock_ledger};
use crate::errors::ServiceError;
use crate::events::Event;
use crate::models::{ReferenceType, StockingKey, TransactionType};
use crate::repositories::{
    BalanceUpdate, MasterDataRepository, NewLedgerEntry, StockBalanceRepository,
    StockLedgerRepository,
};
use crate::services::costing::weighted_average_cost;
use crate::services::reservations;

/// A document identified by type and id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    pub reference_type: ReferenceType,
    pub reference_id: Uuid,
}

impl DocumentRef {
    pub fn new(reference_type: ReferenceType, reference_id: Uuid) -> Self {
        Self {
            reference_type,
            reference_id,
        }
    }
}

/// Header data shared by every ledger entry of one posting.
#[derive(Debug, Clone)]
pub struct Movement {
    pub transaction_number: String,
    pub transaction_date: NaiveDate,
    /// Document that causes the movement; written on each ledger entry.
    pub source: DocumentRef,
    /// Parent document whose reservations an outbound movement fulfils.
    pub fulfils: Option<DocumentRef>,
    pub actor: String,
}

/// One inbound line. `unit_cost: None` values the stock at the key's
/// current weighted cost.
#[derive(Debug, Clone)]
pub struct StockLine {
    pub key: StockingKey,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
    pub expiry_date: Option<NaiveDate>,
}

/// Ledger entry written by a posting plus the balance it left behind.
#[derive(Debug, Clone)]
pub struct PostedMovement {
    pub entry: stock_ledger::Model,
    pub balance: stock_balance::Model,
}

impl PostedMovement {
    /// Notification for a key whose reservations now exceed physical stock.
    pub fn availability_warning(&self) -> Option<Event> {
        if self.balance.available_quantity() < Decimal::ZERO {
            Some(Event::StockBelowZeroAvailable {
                stocking_key: self.balance.stocking_key(),
                quantity: self.balance.quantity,
                reserved_quantity: self.balance.reserved_quantity,
            })
        } else {
            None
        }
    }
}

fn ensure_positive(quantity: Decimal, what: &str) -> Result<(), ServiceError> {
    if quantity <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "{} quantity must be positive, got {}",
            what, quantity
        )));
    }
    Ok(())
}

/// Quantity on hand according to the ledger. A balance row that disagrees
/// is reported and then overwritten by the caller's upsert.
fn reconcile(key: &StockingKey, row: &stock_balance::Model, ledger_quantity: Decimal) -> Decimal {
    if row.quantity != ledger_quantity {
        counter!("warehouse_ledger.posting.balance_divergence", 1);
        warn!(
            stocking_key = %key,
            balance_quantity = %row.quantity,
            ledger_quantity = %ledger_quantity,
            "Stock balance diverged from ledger; using ledger quantity"
        );
    }
    ledger_quantity
}

/// Takes the balance row locks for every key a multi-line posting touches,
/// in `StockingKey::lock_order`, before any line is posted. Inbound keys get
/// a row first so there is something to lock. Postings that touch the same
/// keys in a different line order then queue instead of deadlocking.
pub async fn lock_balances(
    txn: &DatabaseTransaction,
    inbound: &[&StockingKey],
    outbound: &[&StockingKey],
) -> Result<(), ServiceError> {
    let mut inbound: Vec<&StockingKey> = inbound.to_vec();
    inbound.sort_by_key(|k| k.lock_order());
    inbound.dedup();
    for key in &inbound {
        MasterDataRepository::resolve_stocking_key(txn, key).await?;
        StockBalanceRepository::ensure_row(txn, key).await?;
    }

    let mut keys: Vec<&StockingKey> = inbound.into_iter().chain(outbound.iter().copied()).collect();
    keys.sort_by_key(|k| k.lock_order());
    keys.dedup();
    for key in keys {
        StockBalanceRepository::lock(txn, key).await?;
    }
    Ok(())
}

/// Receipt-style posting (GRN, transfer-in, positive adjustment).
#[instrument(skip(txn, line, movement), fields(stocking_key = %line.key, quantity = %line.quantity, document_id = %movement.source.reference_id))]
pub async fn post_receipt(
    txn: &DatabaseTransaction,
    transaction_type: TransactionType,
    line: &StockLine,
    movement: &Movement,
) -> Result<PostedMovement, ServiceError> {
    ensure_positive(line.quantity, "Receipt")?;
    if let Some(cost) = line.unit_cost {
        if cost < Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "Unit cost must not be negative, got {}",
                cost
            )));
        }
    }
    MasterDataRepository::resolve_stocking_key(txn, &line.key).await?;

    StockBalanceRepository::ensure_row(txn, &line.key).await?;
    let row = StockBalanceRepository::lock(txn, &line.key)
        .await?
        .ok_or_else(|| {
            ServiceError::InternalError(format!("Stock balance for {} vanished", line.key))
        })?;

    let latest = StockLedgerRepository::latest_balance(txn, &line.key).await?;
    let on_hand = reconcile(&line.key, &row, latest);

    let incoming_cost = line.unit_cost.unwrap_or(row.unit_cost);
    let new_cost = weighted_average_cost(on_hand, row.unit_cost, line.quantity, incoming_cost);
    let new_quantity = on_hand + line.quantity;

    let entry = StockLedgerRepository::append(
        txn,
        NewLedgerEntry {
            transaction_type,
            transaction_number: movement.transaction_number.clone(),
            transaction_date: movement.transaction_date,
            key: line.key.clone(),
            expiry_date: line.expiry_date,
            quantity: line.quantity,
            unit_cost: incoming_cost,
            balance_quantity: new_quantity,
            reference_type: movement.source.reference_type,
            reference_id: movement.source.reference_id,
            created_by: movement.actor.clone(),
        },
    )
    .await?;

    let balance = StockBalanceRepository::upsert(
        txn,
        BalanceUpdate {
            key: line.key.clone(),
            quantity: new_quantity,
            unit_cost: new_cost,
            last_transaction_date: movement.transaction_date,
        },
    )
    .await?;

    counter!("warehouse_ledger.posting.movements", 1, "transaction_type" => transaction_type.to_string());
    debug!(
        ledger_id = entry.id,
        new_quantity = %new_quantity,
        unit_cost = %new_cost,
        "Receipt posted"
    );
    Ok(PostedMovement { entry, balance })
}

/// Consumption-style posting (issue, transfer-out, shipment, negative adjustment).
///
/// Checks physical quantity, not available quantity: the consuming document
/// is usually the holder of the reservation it fulfils.
#[instrument(skip(txn, key, movement), fields(stocking_key = %key, quantity = %quantity, document_id = %movement.source.reference_id))]
pub async fn post_consumption(
    txn: &DatabaseTransaction,
    transaction_type: TransactionType,
    key: &StockingKey,
    quantity: Decimal,
    movement: &Movement,
) -> Result<PostedMovement, ServiceError> {
    ensure_positive(quantity, "Consumption")?;
    MasterDataRepository::resolve_stocking_key(txn, key).await?;

    let row = match StockBalanceRepository::lock(txn, key).await? {
        Some(row) => row,
        None => {
            counter!("warehouse_ledger.posting.insufficient_stock", 1);
            return Err(ServiceError::InsufficientStock(format!(
                "No stock on hand for {}, requested {}",
                key, quantity
            )));
        }
    };

    let latest = StockLedgerRepository::latest_balance(txn, key).await?;
    let on_hand = reconcile(key, &row, latest);
    if on_hand < quantity {
        counter!("warehouse_ledger.posting.insufficient_stock", 1);
        return Err(ServiceError::InsufficientStock(format!(
            "{} has {} on hand, requested {}",
            key, on_hand, quantity
        )));
    }

    let new_quantity = on_hand - quantity;
    let entry = StockLedgerRepository::append(
        txn,
        NewLedgerEntry {
            transaction_type,
            transaction_number: movement.transaction_number.clone(),
            transaction_date: movement.transaction_date,
            key: key.clone(),
            expiry_date: None,
            quantity: -quantity,
            unit_cost: row.unit_cost,
            balance_quantity: new_quantity,
            reference_type: movement.source.reference_type,
            reference_id: movement.source.reference_id,
            created_by: movement.actor.clone(),
        },
    )
    .await?;

    let mut balance = StockBalanceRepository::upsert(
        txn,
        BalanceUpdate {
            key: key.clone(),
            quantity: new_quantity,
            unit_cost: row.unit_cost,
            last_transaction_date: movement.transaction_date,
        },
    )
    .await?;

    if let Some(parent) = movement.fulfils {
        let applied =
            reservations::fulfil_for_consumption(txn, key, parent, quantity).await?;
        if applied > Decimal::ZERO {
            balance = StockBalanceRepository::get(txn, key).await?;
        }
    }

    counter!("warehouse_ledger.posting.movements", 1, "transaction_type" => transaction_type.to_string());
    debug!(
        ledger_id = entry.id,
        new_quantity = %new_quantity,
        "Consumption posted"
    );
    Ok(PostedMovement { entry, balance })
}

/// Moves stock between two keys in one transaction: a `transfer_out` on the
/// source followed by a `transfer_in` on the destination. `unit_cost: None`
/// carries the source's weighted cost.
#[instrument(skip(txn, from, to, movement), fields(from = %from, to = %to, quantity = %quantity))]
pub async fn post_transfer(
    txn: &DatabaseTransaction,
    from: &StockingKey,
    to: &StockingKey,
    quantity: Decimal,
    unit_cost: Option<Decimal>,
    movement: &Movement,
) -> Result<(PostedMovement, PostedMovement), ServiceError> {
    if from == to {
        return Err(ServiceError::ValidationError(format!(
            "Transfer source and destination are the same key {}",
            from
        )));
    }
    if from.item_type != to.item_type || from.item_id != to.item_id {
        return Err(ServiceError::ValidationError(
            "Transfer must move the same item".to_string(),
        ));
    }

    lock_balances(txn, &[to], &[from]).await?;
    let outbound =
        post_consumption(txn, TransactionType::TransferOut, from, quantity, movement).await?;

    let inbound_line = StockLine {
        key: to.clone(),
        quantity,
        unit_cost: Some(unit_cost.unwrap_or(outbound.entry.unit_cost)),
        expiry_date: None,
    };
    let inbound = post_receipt(txn, TransactionType::TransferIn, &inbound_line, movement).await?;

    Ok((outbound, inbound))
}
