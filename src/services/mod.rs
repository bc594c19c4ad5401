//! Stock engine services.

use rust_decimal::Decimal;
use sea_orm::{
    DatabaseTransaction, EntityTrait, PrimaryKeyTrait, QuerySelect,
};
use std::time::Duration;
use uuid::Uuid;
use validator::ValidationError;

use crate::errors::ServiceError;

// Posting core
pub mod costing;
pub mod posting;
pub mod reservations;

// Stock documents
pub mod delivery_order;
pub mod document_sequence;
pub mod goods_receipt;
pub mod material_issue;
pub mod stock_adjustment;
pub mod stock_transfer;

// Read side
pub mod stock_query;

// Service factory for dependency injection
pub mod factory;

/// Row-lock wait budget used when no configuration is supplied.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) fn validate_positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value > Decimal::ZERO {
        Ok(())
    } else {
        let mut err = ValidationError::new("positive");
        err.message = Some("Must be greater than zero".into());
        Err(err)
    }
}

pub(crate) fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value >= Decimal::ZERO {
        Ok(())
    } else {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("Must not be negative".into());
        Err(err)
    }
}

/// Loads a document header with `SELECT ... FOR UPDATE`, so two postings of
/// the same document serialize and the second sees the first one's status.
pub(crate) async fn lock_document<E>(
    txn: &DatabaseTransaction,
    id: Uuid,
    label: &str,
) -> Result<E::Model, ServiceError>
where
    E: EntityTrait,
    Uuid: Into<<E::PrimaryKey as PrimaryKeyTrait>::ValueType>,
{
    E::find_by_id(id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("{} {} not found", label, id)))
}
