/*!
 * Posting transaction helpers
 *
 * Every posting runs inside one database transaction. Stock rows are locked
 * with `SELECT ... FOR UPDATE` inside that transaction, so the lock wait
 * budget is set here, once, for every document type.
 */

use metrics::{counter, histogram};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, Statement,
    TransactionTrait,
};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::errors::ServiceError;

/// An open posting transaction together with the instant it started.
///
/// Dropping it without calling [`commit_posting`] rolls everything back.
pub struct PostingTransaction {
    pub txn: DatabaseTransaction,
    started: Instant,
    operation: &'static str,
}

impl std::ops::Deref for PostingTransaction {
    type Target = DatabaseTransaction;

    fn deref(&self) -> &Self::Target {
        &self.txn
    }
}

/// Begins a posting transaction and applies the row-lock wait budget.
///
/// PostgreSQL gets `SET LOCAL lock_timeout`; SQLite serializes writers on
/// its own and reports `SQLITE_BUSY` instead.
pub async fn begin_posting(
    db: &DatabaseConnection,
    operation: &'static str,
    lock_timeout: Duration,
) -> Result<PostingTransaction, ServiceError> {
    let txn = db.begin().await.map_err(ServiceError::db_error)?;

    if txn.get_database_backend() == DbBackend::Postgres {
        let millis = lock_timeout.as_millis().max(1);
        txn.execute(Statement::from_string(
            DbBackend::Postgres,
            format!("SET LOCAL lock_timeout = '{}ms'", millis),
        ))
        .await
        .map_err(ServiceError::db_error)?;
    }

    debug!(operation, "Posting transaction started");
    counter!("warehouse_ledger.db.transaction.started", 1, "operation" => operation);

    Ok(PostingTransaction {
        txn,
        started: Instant::now(),
        operation,
    })
}

/// Commits a posting transaction and records its duration.
pub async fn commit_posting(posting: PostingTransaction) -> Result<(), ServiceError> {
    let PostingTransaction {
        txn,
        started,
        operation,
    } = posting;

    let result = txn.commit().await.map_err(ServiceError::db_error);
    let elapsed = started.elapsed();
    histogram!("warehouse_ledger.db.transaction.duration", elapsed, "operation" => operation);

    match &result {
        Ok(()) => {
            counter!("warehouse_ledger.db.transaction.committed", 1, "operation" => operation);
            debug!(operation, duration = ?elapsed, "Posting transaction committed");
        }
        Err(e) => {
            counter!("warehouse_ledger.db.transaction.rolled_back", 1, "operation" => operation);
            warn!(operation, error = %e, "Posting transaction failed to commit");
        }
    }

    result
}
