//! Document numbers of the form `PREFIX-YYYYMM-NNNNN`.
//!
//! Each `(document type, period)` pair owns one counter row. The row is
//! created on first use and bumped with a single atomic `UPDATE`, so two
//! transactions can never read the same value.

use chrono::NaiveDate;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};

use crate::entities::document_sequence::{self, Column, Entity as DocumentSequence};
use crate::errors::ServiceError;
use crate::models::DocumentKind;

pub fn period_of(date: NaiveDate) -> String {
    date.format("%Y%m").to_string()
}

pub fn format_document_number(kind: DocumentKind, period: &str, value: i64) -> String {
    format!("{}-{}-{:05}", kind.number_prefix(), period, value)
}

/// Allocates the next number for `kind` in the month of `date`. Runs inside
/// the caller's transaction; the counter row stays locked until it ends.
pub async fn next_document_number<C: ConnectionTrait>(
    db: &C,
    kind: DocumentKind,
    date: NaiveDate,
) -> Result<String, ServiceError> {
    let document_type = kind.number_prefix().to_string();
    let period = period_of(date);

    DocumentSequence::insert(document_sequence::ActiveModel {
        document_type: Set(document_type.clone()),
        period: Set(period.clone()),
        last_value: Set(0),
    })
    .on_conflict(
        OnConflict::columns([Column::DocumentType, Column::Period])
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(db)
    .await?;

    DocumentSequence::update_many()
        .col_expr(Column::LastValue, Expr::col(Column::LastValue).add(1))
        .filter(Column::DocumentType.eq(document_type.as_str()))
        .filter(Column::Period.eq(period.as_str()))
        .exec(db)
        .await?;

    let sequence = DocumentSequence::find_by_id((document_type.clone(), period.clone()))
        .one(db)
        .await?
        .ok_or_else(|| {
            ServiceError::InternalError(format!(
                "Document sequence {}/{} missing after increment",
                document_type, period
            ))
        })?;

    Ok(format_document_number(kind, &period, sequence.last_value))
}
