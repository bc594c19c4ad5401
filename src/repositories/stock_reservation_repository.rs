use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::entities::stock_reservation::{self, Column, Entity as StockReservation};
use crate::errors::ServiceError;
use crate::models::{ReferenceType, ReservationStatus, StockingKey};

#[derive(Debug, Clone)]
pub struct NewReservation {
    pub key: StockingKey,
    pub quantity: Decimal,
    pub reference_type: ReferenceType,
    pub reference_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: String,
}

pub struct StockReservationRepository;

impl StockReservationRepository {
    pub async fn insert<C: ConnectionTrait>(
        db: &C,
        reservation: NewReservation,
    ) -> Result<stock_reservation::Model, ServiceError> {
        let now = Utc::now();
        Ok(stock_reservation::ActiveModel {
            id: Set(Uuid::new_v4()),
            item_type: Set(reservation.key.item_type),
            item_id: Set(reservation.key.item_id),
            warehouse_id: Set(reservation.key.warehouse_id),
            warehouse_location_id: Set(reservation.key.location_column()),
            batch_number: Set(reservation.key.batch_column()),
            lot_number: Set(reservation.key.lot_column()),
            reserved_quantity: Set(reservation.quantity),
            fulfilled_quantity: Set(Decimal::ZERO),
            reference_type: Set(reservation.reference_type),
            reference_id: Set(reservation.reference_id),
            status: Set(ReservationStatus::Active),
            expires_at: Set(reservation.expires_at),
            created_by: Set(reservation.created_by),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?)
    }

    pub async fn find<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<stock_reservation::Model>, ServiceError> {
        Ok(StockReservation::find_by_id(id).one(db).await?)
    }

    /// Locks one reservation row. Callers take the balance lock first.
    pub async fn lock<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<stock_reservation::Model>, ServiceError> {
        Ok(StockReservation::find_by_id(id)
            .lock_exclusive()
            .one(db)
            .await?)
    }

    /// Active reservations of one parent document on one key, oldest first, locked.
    pub async fn lock_active_for_key<C: ConnectionTrait>(
        db: &C,
        key: &StockingKey,
        reference_type: ReferenceType,
        reference_id: Uuid,
    ) -> Result<Vec<stock_reservation::Model>, ServiceError> {
        Ok(StockReservation::find()
            .filter(key.condition::<Column>())
            .filter(Column::ReferenceType.eq(reference_type))
            .filter(Column::ReferenceId.eq(reference_id))
            .filter(Column::Status.eq(ReservationStatus::Active))
            .order_by_asc(Column::CreatedAt)
            .lock_exclusive()
            .all(db)
            .await?)
    }

    /// Active reservations of one parent document across all keys (unlocked).
    pub async fn active_for_reference<C: ConnectionTrait>(
        db: &C,
        reference_type: ReferenceType,
        reference_id: Uuid,
    ) -> Result<Vec<stock_reservation::Model>, ServiceError> {
        Ok(StockReservation::find()
            .filter(Column::ReferenceType.eq(reference_type))
            .filter(Column::ReferenceId.eq(reference_id))
            .filter(Column::Status.eq(ReservationStatus::Active))
            .order_by_asc(Column::CreatedAt)
            .all(db)
            .await?)
    }

    /// Active reservations whose expiry is at or before `now`.
    pub async fn active_due<C: ConnectionTrait>(
        db: &C,
        now: DateTime<Utc>,
    ) -> Result<Vec<stock_reservation::Model>, ServiceError> {
        Ok(StockReservation::find()
            .filter(Column::Status.eq(ReservationStatus::Active))
            .filter(Column::ExpiresAt.is_not_null())
            .filter(Column::ExpiresAt.lte(now))
            .order_by_asc(Column::ExpiresAt)
            .all(db)
            .await?)
    }

    pub async fn list_by_reference<C: ConnectionTrait>(
        db: &C,
        reference_type: ReferenceType,
        reference_id: Uuid,
    ) -> Result<Vec<stock_reservation::Model>, ServiceError> {
        Ok(StockReservation::find()
            .filter(Column::ReferenceType.eq(reference_type))
            .filter(Column::ReferenceId.eq(reference_id))
            .order_by_asc(Column::CreatedAt)
            .all(db)
            .await?)
    }

    /// Active reservations on one key, used to audit `reserved_quantity`.
    pub async fn active_for_key<C: ConnectionTrait>(
        db: &C,
        key: &StockingKey,
    ) -> Result<Vec<stock_reservation::Model>, ServiceError> {
        Ok(StockReservation::find()
            .filter(key.condition::<Column>())
            .filter(Column::Status.eq(ReservationStatus::Active))
            .all(db)
            .await?)
    }

    /// Persists new fulfilled quantity and status.
    pub async fn save_progress<C: ConnectionTrait>(
        db: &C,
        reservation: stock_reservation::Model,
        fulfilled_quantity: Decimal,
        status: ReservationStatus,
    ) -> Result<stock_reservation::Model, ServiceError> {
        let mut active: stock_reservation::ActiveModel = reservation.into();
        active.fulfilled_quantity = Set(fulfilled_quantity);
        active.status = Set(status);
        active.updated_at = Set(Utc::now());
        Ok(active.update(db).await?)
    }
}
