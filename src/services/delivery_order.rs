use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::db::{begin_posting, commit_posting};
use crate::entities::{delivery_order, delivery_order_item};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{DocumentKind, DocumentStatus, ReferenceType, StockingKey, TransactionType};
use crate::repositories::MasterDataRepository;
use crate::services::document_sequence::next_document_number;
use crate::services::posting::{lock_balances, post_consumption, DocumentRef, Movement};
use crate::services::{lock_document, DEFAULT_LOCK_TIMEOUT};

const KIND: DocumentKind = DocumentKind::DeliveryOrder;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DeliveryOrderLine {
    pub finished_product_id: Uuid,
    pub warehouse_location_id: Option<Uuid>,
    pub batch_number: Option<String>,
    pub lot_number: Option<String>,
    #[validate(custom = "crate::services::validate_positive")]
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateDeliveryOrder {
    pub warehouse_id: Uuid,
    /// Sales order whose reservations this shipment consumes.
    pub sales_order_id: Option<Uuid>,
    pub customer_reference: Option<String>,
    pub delivery_date: NaiveDate,
    #[validate(length(min = 1))]
    pub created_by: String,
    #[validate(length(min = 1))]
    pub items: Vec<DeliveryOrderLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOrderDocument {
    pub header: delivery_order::Model,
    pub items: Vec<delivery_order_item::Model>,
}

fn line_key(warehouse_id: Uuid, item: &delivery_order_item::Model) -> StockingKey {
    StockingKey::finished_product(item.finished_product_id, warehouse_id)
        .with_location(item.warehouse_location_id)
        .with_batch(item.batch_number.clone())
        .with_lot(item.lot_number.clone())
}

async fn load_items<C: ConnectionTrait>(
    db: &C,
    delivery_id: Uuid,
) -> Result<Vec<delivery_order_item::Model>, ServiceError> {
    Ok(delivery_order_item::Entity::find()
        .filter(delivery_order_item::Column::DeliveryOrderId.eq(delivery_id))
        .order_by_asc(delivery_order_item::Column::Id)
        .all(db)
        .await?)
}

/// Delivery orders ship finished products to customers: `draft → shipped`.
#[derive(Clone)]
pub struct DeliveryOrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<EventSender>,
    lock_timeout: Duration,
}

impl DeliveryOrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<EventSender>) -> Self {
        Self {
            db,
            event_sender,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    #[instrument(skip(self, request), fields(warehouse_id = %request.warehouse_id))]
    pub async fn create(
        &self,
        request: CreateDeliveryOrder,
    ) -> Result<DeliveryOrderDocument, ServiceError> {
        request.validate()?;
        for line in &request.items {
            line.validate()?;
        }

        let posting = begin_posting(&self.db, "delivery.create", self.lock_timeout).await?;
        MasterDataRepository::get_warehouse(&posting.txn, request.warehouse_id).await?;
        for line in &request.items {
            let key = StockingKey::finished_product(line.finished_product_id, request.warehouse_id)
                .with_location(line.warehouse_location_id);
            MasterDataRepository::resolve_stocking_key(&posting.txn, &key).await?;
        }

        let delivery_number =
            next_document_number(&posting.txn, KIND, request.delivery_date).await?;
        let now = Utc::now();
        let header = delivery_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            delivery_number: Set(delivery_number),
            warehouse_id: Set(request.warehouse_id),
            sales_order_id: Set(request.sales_order_id),
            customer_reference: Set(request.customer_reference),
            delivery_date: Set(request.delivery_date),
            status: Set(KIND.initial_status()),
            created_by: Set(request.created_by),
            shipped_by: Set(None),
            shipped_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&posting.txn)
        .await?;

        let mut items = Vec::with_capacity(request.items.len());
        for line in request.items {
            let item = delivery_order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                delivery_order_id: Set(header.id),
                finished_product_id: Set(line.finished_product_id),
                warehouse_location_id: Set(line.warehouse_location_id),
                batch_number: Set(line.batch_number),
                lot_number: Set(line.lot_number),
                quantity: Set(line.quantity),
            }
            .insert(&posting.txn)
            .await?;
            items.push(item);
        }

        commit_posting(posting).await?;
        info!(
            delivery_id = %header.id,
            delivery_number = %header.delivery_number,
            "Delivery order created"
        );
        Ok(DeliveryOrderDocument { header, items })
    }

    /// Ships every line and fulfils the sales order's reservations.
    #[instrument(skip(self))]
    pub async fn ship(
        &self,
        delivery_id: Uuid,
        actor: &str,
    ) -> Result<DeliveryOrderDocument, ServiceError> {
        let posting = begin_posting(&self.db, "delivery.ship", self.lock_timeout).await?;
        let header =
            lock_document::<delivery_order::Entity>(&posting.txn, delivery_id, "Delivery order")
                .await?;
        KIND.ensure_postable(header.status)?;

        let items = load_items(&posting.txn, delivery_id).await?;
        let movement = Movement {
            transaction_number: header.delivery_number.clone(),
            transaction_date: header.delivery_date,
            source: DocumentRef::new(KIND.reference_type(), header.id),
            fulfils: header
                .sales_order_id
                .map(|id| DocumentRef::new(ReferenceType::SalesOrder, id)),
            actor: actor.to_string(),
        };

        let keys: Vec<StockingKey> = items
            .iter()
            .map(|i| line_key(header.warehouse_id, i))
            .collect();
        lock_balances(&posting.txn, &[], &keys.iter().collect::<Vec<_>>()).await?;

        let mut posted = Vec::with_capacity(items.len());
        for item in &items {
            let key = line_key(header.warehouse_id, item);
            posted.push(
                post_consumption(
                    &posting.txn,
                    TransactionType::Shipment,
                    &key,
                    item.quantity,
                    &movement,
                )
                .await?,
            );
        }

        let now = Utc::now();
        let mut active: delivery_order::ActiveModel = header.into();
        active.status = Set(KIND.posted_status());
        active.shipped_by = Set(Some(actor.to_string()));
        active.shipped_at = Set(Some(now));
        active.updated_at = Set(now);
        let header = active.update(&posting.txn).await?;

        commit_posting(posting).await?;
        info!(delivery_id = %delivery_id, ledger_entries = posted.len(), "Delivery order shipped");

        if let Some(sender) = &self.event_sender {
            sender.publish(Event::DocumentPosted {
                kind: KIND,
                document_id: header.id,
                document_number: header.delivery_number.clone(),
                ledger_entries: posted.len(),
            });
            sender.publish_all(posted.iter().filter_map(|p| p.availability_warning()));
        }
        Ok(DeliveryOrderDocument { header, items })
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, delivery_id: Uuid) -> Result<delivery_order::Model, ServiceError> {
        let posting = begin_posting(&self.db, "delivery.cancel", self.lock_timeout).await?;
        let header =
            lock_document::<delivery_order::Entity>(&posting.txn, delivery_id, "Delivery order")
                .await?;
        KIND.ensure_cancellable(header.status)?;

        let mut active: delivery_order::ActiveModel = header.into();
        active.status = Set(DocumentStatus::Cancelled);
        active.updated_at = Set(Utc::now());
        let header = active.update(&posting.txn).await?;
        commit_posting(posting).await?;

        if let Some(sender) = &self.event_sender {
            sender.publish(Event::DocumentCancelled {
                kind: KIND,
                document_id: header.id,
                document_number: header.delivery_number.clone(),
            });
        }
        Ok(header)
    }

    pub async fn get(&self, delivery_id: Uuid) -> Result<DeliveryOrderDocument, ServiceError> {
        let header = delivery_order::Entity::find_by_id(delivery_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Delivery order {} not found", delivery_id))
            })?;
        let items = load_items(&*self.db, delivery_id).await?;
        Ok(DeliveryOrderDocument { header, items })
    }
}
