use sea_orm::{ConnectionTrait, EntityTrait};
use uuid::Uuid;

use crate::entities::{finished_product, material, warehouse, warehouse_location};
use crate::errors::ServiceError;
use crate::models::{ItemType, LifecycleStatus, StockingKey};

/// Read-only lookups against master data. Deleted records are treated as
/// absent: nothing new may be posted against them.
pub struct MasterDataRepository;

impl MasterDataRepository {
    pub async fn get_warehouse<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<warehouse::Model, ServiceError> {
        warehouse::Entity::find_by_id(id)
            .one(db)
            .await?
            .filter(|w| w.lifecycle_status == LifecycleStatus::Active)
            .ok_or_else(|| ServiceError::NotFound(format!("Warehouse {} not found", id)))
    }

    pub async fn get_warehouse_location<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<warehouse_location::Model, ServiceError> {
        warehouse_location::Entity::find_by_id(id)
            .one(db)
            .await?
            .filter(|l| l.lifecycle_status == LifecycleStatus::Active)
            .ok_or_else(|| ServiceError::NotFound(format!("Warehouse location {} not found", id)))
    }

    pub async fn get_material<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<material::Model, ServiceError> {
        material::Entity::find_by_id(id)
            .one(db)
            .await?
            .filter(|m| m.lifecycle_status == LifecycleStatus::Active)
            .ok_or_else(|| ServiceError::NotFound(format!("Material {} not found", id)))
    }

    pub async fn get_finished_product<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<finished_product::Model, ServiceError> {
        finished_product::Entity::find_by_id(id)
            .one(db)
            .await?
            .filter(|p| p.lifecycle_status == LifecycleStatus::Active)
            .ok_or_else(|| ServiceError::NotFound(format!("Finished product {} not found", id)))
    }

    /// Confirms every master record a stocking key names exists and is
    /// active, and that its location belongs to its warehouse.
    pub async fn resolve_stocking_key<C: ConnectionTrait>(
        db: &C,
        key: &StockingKey,
    ) -> Result<(), ServiceError> {
        match key.item_type {
            ItemType::Material => {
                Self::get_material(db, key.item_id).await?;
            }
            ItemType::FinishedProduct => {
                Self::get_finished_product(db, key.item_id).await?;
            }
        }

        Self::get_warehouse(db, key.warehouse_id).await?;

        if let Some(location_id) = key.warehouse_location_id {
            let location = Self::get_warehouse_location(db, location_id).await?;
            if location.warehouse_id != key.warehouse_id {
                return Err(ServiceError::ValidationError(format!(
                    "Location {} does not belong to warehouse {}",
                    location_id, key.warehouse_id
                )));
            }
        }
        Ok(())
    }
}
