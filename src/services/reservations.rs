//! Soft holds against a stocking key.
//!
//! Free functions run inside a caller's transaction so document services can
//! combine them with postings; [`ReservationService`] wraps each in its own
//! transaction. Lock order is always balance row, then reservation row.

use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, DatabaseTransaction};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::db::{begin_posting, commit_posting};
use crate::entities::stock_reservation;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{ReferenceType, ReservationStatus, StockingKey};
use crate::repositories::{
    MasterDataRepository, NewReservation, StockBalanceRepository, StockLedgerRepository,
    StockReservationRepository,
};
use crate::services::posting::DocumentRef;
use crate::services::DEFAULT_LOCK_TIMEOUT;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReservationRequest {
    pub key: StockingKey,
    #[validate(custom = "crate::services::validate_positive")]
    pub quantity: Decimal,
    pub reference_type: ReferenceType,
    pub reference_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
    #[validate(length(min = 1))]
    pub actor: String,
}

/// Reservations moved to a terminal state in one call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClosedReservations {
    pub reservation_ids: Vec<Uuid>,
    pub released_quantity: Decimal,
}

impl ClosedReservations {
    pub fn count(&self) -> usize {
        self.reservation_ids.len()
    }
}

/// Holds `quantity` of available stock for a parent document.
#[instrument(skip(txn, request), fields(stocking_key = %request.key, quantity = %request.quantity))]
pub async fn create_reservation(
    txn: &DatabaseTransaction,
    request: ReservationRequest,
) -> Result<stock_reservation::Model, ServiceError> {
    request.validate()?;
    MasterDataRepository::resolve_stocking_key(txn, &request.key).await?;

    let available = match StockBalanceRepository::lock(txn, &request.key).await? {
        Some(row) => {
            let on_hand = StockLedgerRepository::latest_balance(txn, &request.key).await?;
            on_hand - row.reserved_quantity
        }
        None => Decimal::ZERO,
    };
    if available < request.quantity {
        counter!("warehouse_ledger.reservations.insufficient_available", 1);
        return Err(ServiceError::InsufficientAvailable(format!(
            "{} has {} available, requested {}",
            request.key, available, request.quantity
        )));
    }

    let reservation = StockReservationRepository::insert(
        txn,
        NewReservation {
            key: request.key.clone(),
            quantity: request.quantity,
            reference_type: request.reference_type,
            reference_id: request.reference_id,
            expires_at: request.expires_at,
            created_by: request.actor,
        },
    )
    .await?;
    StockBalanceRepository::adjust_reserved(txn, &request.key, request.quantity).await?;

    counter!("warehouse_ledger.reservations.created", 1);
    debug!(reservation_id = %reservation.id, "Reservation created");
    Ok(reservation)
}

/// Marks up to `quantity` of an active reservation as consumed and releases
/// that much from the balance's reserved quantity. Returns the reservation
/// and the amount applied.
#[instrument(skip(txn))]
pub async fn fulfill_reservation(
    txn: &DatabaseTransaction,
    reservation_id: Uuid,
    quantity: Decimal,
) -> Result<(stock_reservation::Model, Decimal), ServiceError> {
    if quantity <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "Fulfil quantity must be positive, got {}",
            quantity
        )));
    }
    let key = StockReservationRepository::find(txn, reservation_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Reservation {} not found", reservation_id)))?
        .stocking_key();

    StockBalanceRepository::lock(txn, &key).await?;
    let reservation = StockReservationRepository::lock(txn, reservation_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Reservation {} not found", reservation_id)))?;
    if !reservation.is_active() {
        return Err(ServiceError::InvalidStateTransition(format!(
            "Reservation {} is {}",
            reservation_id, reservation.status
        )));
    }
    apply_fulfilment(txn, reservation, quantity).await
}

async fn apply_fulfilment(
    txn: &DatabaseTransaction,
    reservation: stock_reservation::Model,
    quantity: Decimal,
) -> Result<(stock_reservation::Model, Decimal), ServiceError> {
    let applied = quantity.min(reservation.outstanding_quantity());
    let fulfilled = reservation.fulfilled_quantity + applied;
    let status = if fulfilled >= reservation.reserved_quantity {
        ReservationStatus::Fulfilled
    } else {
        ReservationStatus::Active
    };
    let key = reservation.stocking_key();

    let updated = StockReservationRepository::save_progress(txn, reservation, fulfilled, status).await?;
    if applied > Decimal::ZERO {
        StockBalanceRepository::adjust_reserved(txn, &key, -applied).await?;
    }
    Ok((updated, applied))
}

/// Applies a consumption of `quantity` on `key` to the parent document's
/// active reservations, oldest first. The caller already holds the balance
/// row lock. Returns the total applied.
pub(crate) async fn fulfil_for_consumption(
    txn: &DatabaseTransaction,
    key: &StockingKey,
    parent: DocumentRef,
    quantity: Decimal,
) -> Result<Decimal, ServiceError> {
    let open = StockReservationRepository::lock_active_for_key(
        txn,
        key,
        parent.reference_type,
        parent.reference_id,
    )
    .await?;

    let mut remaining = quantity;
    for reservation in open {
        if remaining <= Decimal::ZERO {
            break;
        }
        let (_, applied) = apply_fulfilment(txn, reservation, remaining).await?;
        remaining -= applied;
    }

    let applied = quantity - remaining;
    if applied > Decimal::ZERO {
        counter!("warehouse_ledger.reservations.fulfilled", 1);
        debug!(stocking_key = %key, applied = %applied, "Reservations fulfilled by consumption");
    }
    Ok(applied)
}

/// Moves one reservation to `status` and gives its outstanding hold back.
/// Takes the balance lock before the reservation lock; returns `None` when
/// the reservation left `active` before the lock was acquired.
async fn close_one(
    txn: &DatabaseTransaction,
    reservation_id: Uuid,
    key: &StockingKey,
    status: ReservationStatus,
) -> Result<Option<(stock_reservation::Model, Decimal)>, ServiceError> {
    StockBalanceRepository::lock(txn, key).await?;
    let reservation = StockReservationRepository::lock(txn, reservation_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Reservation {} not found", reservation_id)))?;
    if !reservation.status.can_transition_to(status) {
        return Ok(None);
    }

    let outstanding = reservation.outstanding_quantity();
    let fulfilled = reservation.fulfilled_quantity;
    let updated = StockReservationRepository::save_progress(txn, reservation, fulfilled, status).await?;
    if outstanding > Decimal::ZERO {
        StockBalanceRepository::adjust_reserved(txn, key, -outstanding).await?;
    }
    Ok(Some((updated, outstanding)))
}

async fn close_all(
    txn: &DatabaseTransaction,
    mut candidates: Vec<stock_reservation::Model>,
    status: ReservationStatus,
) -> Result<ClosedReservations, ServiceError> {
    candidates.sort_by_key(|r| r.stocking_key().lock_order());

    let mut closed = ClosedReservations::default();
    for candidate in candidates {
        let key = candidate.stocking_key();
        if let Some((reservation, released)) = close_one(txn, candidate.id, &key, status).await? {
            closed.reservation_ids.push(reservation.id);
            closed.released_quantity += released;
        }
    }
    Ok(closed)
}

/// Cancels or expires every active reservation of a parent document,
/// restoring what each still held. Running it again finds nothing to close.
#[instrument(skip(txn))]
pub async fn close_reservations_by_reference(
    txn: &DatabaseTransaction,
    reference_type: ReferenceType,
    reference_id: Uuid,
    status: ReservationStatus,
) -> Result<ClosedReservations, ServiceError> {
    if !matches!(
        status,
        ReservationStatus::Cancelled | ReservationStatus::Expired
    ) {
        return Err(ServiceError::ValidationError(format!(
            "Reservations can only be closed as cancelled or expired, not {}",
            status
        )));
    }
    let candidates =
        StockReservationRepository::active_for_reference(txn, reference_type, reference_id).await?;
    let closed = close_all(txn, candidates, status).await?;
    counter!("warehouse_ledger.reservations.closed", closed.count() as u64, "status" => status.to_string());
    Ok(closed)
}

/// Cancels one reservation. Cancelling an already cancelled reservation is
/// a no-op; a fulfilled or expired one cannot be cancelled.
#[instrument(skip(txn))]
pub async fn cancel_reservation(
    txn: &DatabaseTransaction,
    reservation_id: Uuid,
) -> Result<stock_reservation::Model, ServiceError> {
    let current = StockReservationRepository::find(txn, reservation_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Reservation {} not found", reservation_id)))?;

    match current.status {
        ReservationStatus::Cancelled => return Ok(current),
        ReservationStatus::Fulfilled | ReservationStatus::Expired => {
            return Err(ServiceError::InvalidStateTransition(format!(
                "Reservation {} is {} and cannot be cancelled",
                reservation_id, current.status
            )))
        }
        ReservationStatus::Active => {}
    }

    let key = current.stocking_key();
    match close_one(txn, reservation_id, &key, ReservationStatus::Cancelled).await? {
        Some((reservation, _)) => Ok(reservation),
        // Closed by someone else while we waited for the lock.
        None => StockReservationRepository::find(txn, reservation_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Reservation {} not found", reservation_id))),
    }
}

/// Expires every active reservation whose `expires_at` is at or before `now`.
#[instrument(skip(txn))]
pub async fn expire_due_reservations(
    txn: &DatabaseTransaction,
    now: DateTime<Utc>,
) -> Result<ClosedReservations, ServiceError> {
    let due = StockReservationRepository::active_due(txn, now).await?;
    let closed = close_all(txn, due, ReservationStatus::Expired).await?;
    counter!("warehouse_ledger.reservations.expired", closed.count() as u64);
    Ok(closed)
}

/// Reservation operations, each in its own posting transaction.
#[derive(Clone)]
pub struct ReservationService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<EventSender>,
    lock_timeout: Duration,
    default_ttl: Option<chrono::Duration>,
}

impl ReservationService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<EventSender>) -> Self {
        Self {
            db,
            event_sender,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            default_ttl: None,
        }
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Expiry applied to requests that do not carry one.
    pub fn with_default_ttl(mut self, ttl: Option<chrono::Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    fn publish(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            sender.publish(event);
        }
    }

    #[instrument(skip(self, request), fields(stocking_key = %request.key, reference_id = %request.reference_id))]
    pub async fn create(
        &self,
        mut request: ReservationRequest,
    ) -> Result<stock_reservation::Model, ServiceError> {
        if request.expires_at.is_none() {
            request.expires_at = self.default_ttl.map(|ttl| Utc::now() + ttl);
        }
        let posting = begin_posting(&self.db, "reservation.create", self.lock_timeout).await?;
        let reservation = create_reservation(&posting.txn, request).await?;
        commit_posting(posting).await?;

        self.publish(Event::ReservationCreated {
            reservation_id: reservation.id,
            reference_type: reservation.reference_type,
            reference_id: reservation.reference_id,
            stocking_key: reservation.stocking_key(),
            quantity: reservation.reserved_quantity,
        });
        Ok(reservation)
    }

    #[instrument(skip(self))]
    pub async fn fulfill(
        &self,
        reservation_id: Uuid,
        quantity: Decimal,
    ) -> Result<stock_reservation::Model, ServiceError> {
        let posting = begin_posting(&self.db, "reservation.fulfill", self.lock_timeout).await?;
        let (reservation, _) = fulfill_reservation(&posting.txn, reservation_id, quantity).await?;
        commit_posting(posting).await?;
        Ok(reservation)
    }

    #[instrument(skip(self))]
    pub async fn close_by_reference(
        &self,
        reference_type: ReferenceType,
        reference_id: Uuid,
        status: ReservationStatus,
    ) -> Result<ClosedReservations, ServiceError> {
        let posting = begin_posting(&self.db, "reservation.close", self.lock_timeout).await?;
        let closed =
            close_reservations_by_reference(&posting.txn, reference_type, reference_id, status)
                .await?;
        commit_posting(posting).await?;

        if closed.count() > 0 {
            info!(count = closed.count(), released = %closed.released_quantity, "Reservations closed");
            self.publish(Event::ReservationsClosed {
                reference_type,
                reference_id,
                status,
                count: closed.count(),
                released_quantity: closed.released_quantity,
            });
        }
        Ok(closed)
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, reservation_id: Uuid) -> Result<stock_reservation::Model, ServiceError> {
        let posting = begin_posting(&self.db, "reservation.cancel", self.lock_timeout).await?;
        let reservation = cancel_reservation(&posting.txn, reservation_id).await?;
        commit_posting(posting).await?;
        Ok(reservation)
    }

    #[instrument(skip(self))]
    pub async fn expire_due(&self, now: DateTime<Utc>) -> Result<ClosedReservations, ServiceError> {
        let posting = begin_posting(&self.db, "reservation.expire", self.lock_timeout).await?;
        let closed = expire_due_reservations(&posting.txn, now).await?;
        commit_posting(posting).await?;

        info!(
            expired_count = closed.count(),
            released = %closed.released_quantity,
            "Completed expired reservation sweep"
        );
        Ok(closed)
    }

    pub async fn get(&self, reservation_id: Uuid) -> Result<stock_reservation::Model, ServiceError> {
        StockReservationRepository::find(&*self.db, reservation_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Reservation {} not found", reservation_id)))
    }

    pub async fn list_by_reference(
        &self,
        reference_type: ReferenceType,
        reference_id: Uuid,
    ) -> Result<Vec<stock_reservation::Model>, ServiceError> {
        StockReservationRepository::list_by_reference(&*self.db, reference_type, reference_id).await
    }
}
