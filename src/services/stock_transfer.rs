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
use crate::entities::{stock_transfer, stock_transfer_item};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{DocumentKind, DocumentStatus, ItemType, StockingKey};
use crate::repositories::MasterDataRepository;
use crate::services::document_sequence::next_document_number;
use crate::services::posting::{lock_balances, post_transfer, DocumentRef, Movement};
use crate::services::{lock_document, DEFAULT_LOCK_TIMEOUT};

const KIND: DocumentKind = DocumentKind::StockTransfer;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StockTransferLine {
    pub item_type: ItemType,
    pub item_id: Uuid,
    pub from_location_id: Option<Uuid>,
    pub to_location_id: Option<Uuid>,
    pub batch_number: Option<String>,
    pub lot_number: Option<String>,
    #[validate(custom = "crate::services::validate_positive")]
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateStockTransfer {
    pub from_warehouse_id: Uuid,
    pub to_warehouse_id: Uuid,
    pub transfer_date: NaiveDate,
    #[validate(length(min = 1))]
    pub created_by: String,
    #[validate(length(min = 1))]
    pub items: Vec<StockTransferLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockTransferDocument {
    pub header: stock_transfer::Model,
    pub items: Vec<stock_transfer_item::Model>,
}

/// Source and destination keys of one transfer line. Batch and lot travel
/// with the stock; warehouse and location change.
fn line_keys(
    header: &stock_transfer::Model,
    item: &stock_transfer_item::Model,
) -> (StockingKey, StockingKey) {
    let from = StockingKey::new(item.item_type, item.item_id, header.from_warehouse_id)
        .with_location(item.from_location_id)
        .with_batch(item.batch_number.clone())
        .with_lot(item.lot_number.clone());
    let to = from.relocated(header.to_warehouse_id, item.to_location_id);
    (from, to)
}

async fn load_items<C: ConnectionTrait>(
    db: &C,
    transfer_id: Uuid,
) -> Result<Vec<stock_transfer_item::Model>, ServiceError> {
    Ok(stock_transfer_item::Entity::find()
        .filter(stock_transfer_item::Column::StockTransferId.eq(transfer_id))
        .order_by_asc(stock_transfer_item::Column::Id)
        .all(db)
        .await?)
}

/// Stock transfers between warehouses or between locations of one warehouse.
#[derive(Clone)]
pub struct StockTransferService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<EventSender>,
    lock_timeout: Duration,
}

impl StockTransferService {
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

    #[instrument(skip(self, request), fields(from = %request.from_warehouse_id, to = %request.to_warehouse_id))]
    pub async fn create(
        &self,
        request: CreateStockTransfer,
    ) -> Result<StockTransferDocument, ServiceError> {
        request.validate()?;
        for line in &request.items {
            line.validate()?;
            if request.from_warehouse_id == request.to_warehouse_id
                && line.from_location_id == line.to_location_id
            {
                return Err(ServiceError::ValidationError(format!(
                    "Transfer line for {} does not change warehouse or location",
                    line.item_id
                )));
            }
        }

        let posting = begin_posting(&self.db, "transfer.create", self.lock_timeout).await?;
        MasterDataRepository::get_warehouse(&posting.txn, request.from_warehouse_id).await?;
        MasterDataRepository::get_warehouse(&posting.txn, request.to_warehouse_id).await?;

        let transfer_number =
            next_document_number(&posting.txn, KIND, request.transfer_date).await?;
        let now = Utc::now();
        let header = stock_transfer::ActiveModel {
            id: Set(Uuid::new_v4()),
            transfer_number: Set(transfer_number),
            from_warehouse_id: Set(request.from_warehouse_id),
            to_warehouse_id: Set(request.to_warehouse_id),
            transfer_date: Set(request.transfer_date),
            status: Set(KIND.initial_status()),
            created_by: Set(request.created_by),
            posted_by: Set(None),
            posted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&posting.txn)
        .await?;

        let mut items = Vec::with_capacity(request.items.len());
        for line in request.items {
            let item = stock_transfer_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                stock_transfer_id: Set(header.id),
                item_type: Set(line.item_type),
                item_id: Set(line.item_id),
                from_location_id: Set(line.from_location_id),
                to_location_id: Set(line.to_location_id),
                batch_number: Set(line.batch_number),
                lot_number: Set(line.lot_number),
                quantity: Set(line.quantity),
            }
            .insert(&posting.txn)
            .await?;

            let (from, to) = line_keys(&header, &item);
            MasterDataRepository::resolve_stocking_key(&posting.txn, &from).await?;
            MasterDataRepository::resolve_stocking_key(&posting.txn, &to).await?;
            items.push(item);
        }

        commit_posting(posting).await?;
        info!(
            transfer_id = %header.id,
            transfer_number = %header.transfer_number,
            "Stock transfer created"
        );
        Ok(StockTransferDocument { header, items })
    }

    /// Moves every line out of the source and into the destination at the
    /// source's weighted cost. A failure on any side rolls back both.
    #[instrument(skip(self))]
    pub async fn post(
        &self,
        transfer_id: Uuid,
        actor: &str,
    ) -> Result<StockTransferDocument, ServiceError> {
        let posting = begin_posting(&self.db, "transfer.post", self.lock_timeout).await?;
        let header =
            lock_document::<stock_transfer::Entity>(&posting.txn, transfer_id, "Stock transfer")
                .await?;
        KIND.ensure_postable(header.status)?;

        let items = load_items(&posting.txn, transfer_id).await?;
        let movement = Movement {
            transaction_number: header.transfer_number.clone(),
            transaction_date: header.transfer_date,
            source: DocumentRef::new(KIND.reference_type(), header.id),
            fulfils: None,
            actor: actor.to_string(),
        };

        let (outbound, inbound): (Vec<StockingKey>, Vec<StockingKey>) =
            items.iter().map(|item| line_keys(&header, item)).unzip();
        lock_balances(
            &posting.txn,
            &inbound.iter().collect::<Vec<_>>(),
            &outbound.iter().collect::<Vec<_>>(),
        )
        .await?;

        let mut posted = Vec::with_capacity(items.len() * 2);
        for item in &items {
            let (from, to) = line_keys(&header, item);
            let (outbound, inbound) =
                post_transfer(&posting.txn, &from, &to, item.quantity, None, &movement).await?;
            posted.push(outbound);
            posted.push(inbound);
        }

        let now = Utc::now();
        let mut active: stock_transfer::ActiveModel = header.into();
        active.status = Set(KIND.posted_status());
        active.posted_by = Set(Some(actor.to_string()));
        active.posted_at = Set(Some(now));
        active.updated_at = Set(now);
        let header = active.update(&posting.txn).await?;

        commit_posting(posting).await?;
        info!(transfer_id = %transfer_id, ledger_entries = posted.len(), "Stock transfer posted");

        if let Some(sender) = &self.event_sender {
            sender.publish(Event::DocumentPosted {
                kind: KIND,
                document_id: header.id,
                document_number: header.transfer_number.clone(),
                ledger_entries: posted.len(),
            });
            sender.publish_all(posted.iter().filter_map(|p| p.availability_warning()));
        }
        Ok(StockTransferDocument { header, items })
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, transfer_id: Uuid) -> Result<stock_transfer::Model, ServiceError> {
        let posting = begin_posting(&self.db, "transfer.cancel", self.lock_timeout).await?;
        let header =
            lock_document::<stock_transfer::Entity>(&posting.txn, transfer_id, "Stock transfer")
                .await?;
        KIND.ensure_cancellable(header.status)?;

        let mut active: stock_transfer::ActiveModel = header.into();
        active.status = Set(DocumentStatus::Cancelled);
        active.updated_at = Set(Utc::now());
        let header = active.update(&posting.txn).await?;
        commit_posting(posting).await?;

        if let Some(sender) = &self.event_sender {
            sender.publish(Event::DocumentCancelled {
                kind: KIND,
                document_id: header.id,
                document_number: header.transfer_number.clone(),
            });
        }
        Ok(header)
    }

    pub async fn get(&self, transfer_id: Uuid) -> Result<StockTransferDocument, ServiceError> {
        let header = stock_transfer::Entity::find_by_id(transfer_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Stock transfer {} not found", transfer_id))
            })?;
        let items = load_items(&*self.db, transfer_id).await?;
        Ok(StockTransferDocument { header, items })
    }
}
