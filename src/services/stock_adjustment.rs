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
use validator::{Validate, ValidationError};

use crate::db::{begin_posting, commit_posting};
use crate::entities::{stock_adjustment, stock_adjustment_item};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{DocumentKind, DocumentStatus, ItemType, StockingKey, TransactionType};
use crate::repositories::MasterDataRepository;
use crate::services::document_sequence::next_document_number;
use crate::services::posting::{
    lock_balances, post_consumption, post_receipt, DocumentRef, Movement, StockLine,
};
use crate::services::{lock_document, DEFAULT_LOCK_TIMEOUT};

const KIND: DocumentKind = DocumentKind::StockAdjustment;

fn validate_non_zero(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_zero() {
        let mut err = ValidationError::new("non_zero");
        err.message = Some("Adjustment quantity must not be zero".into());
        return Err(err);
    }
    Ok(())
}

/// One signed adjustment line: positive adds stock, negative removes it.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StockAdjustmentLine {
    pub item_type: ItemType,
    pub item_id: Uuid,
    pub warehouse_location_id: Option<Uuid>,
    pub batch_number: Option<String>,
    pub lot_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    #[validate(custom = "validate_non_zero")]
    pub quantity: Decimal,
    /// Only used by positive lines; defaults to the key's current cost.
    #[validate(custom = "crate::services::validate_non_negative")]
    pub unit_cost: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateStockAdjustment {
    pub warehouse_id: Uuid,
    pub adjustment_date: NaiveDate,
    #[validate(length(min = 1))]
    pub reason: String,
    #[validate(length(min = 1))]
    pub created_by: String,
    #[validate(length(min = 1))]
    pub items: Vec<StockAdjustmentLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockAdjustmentDocument {
    pub header: stock_adjustment::Model,
    pub items: Vec<stock_adjustment_item::Model>,
}

fn line_key(warehouse_id: Uuid, item: &stock_adjustment_item::Model) -> StockingKey {
    StockingKey::new(item.item_type, item.item_id, warehouse_id)
        .with_location(item.warehouse_location_id)
        .with_batch(item.batch_number.clone())
        .with_lot(item.lot_number.clone())
}

async fn load_items<C: ConnectionTrait>(
    db: &C,
    adjustment_id: Uuid,
) -> Result<Vec<stock_adjustment_item::Model>, ServiceError> {
    Ok(stock_adjustment_item::Entity::find()
        .filter(stock_adjustment_item::Column::StockAdjustmentId.eq(adjustment_id))
        .order_by_asc(stock_adjustment_item::Column::Id)
        .all(db)
        .await?)
}

/// Stock adjustments correct physical counts, damage and write-offs.
#[derive(Clone)]
pub struct StockAdjustmentService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<EventSender>,
    lock_timeout: Duration,
}

impl StockAdjustmentService {
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
        request: CreateStockAdjustment,
    ) -> Result<StockAdjustmentDocument, ServiceError> {
        request.validate()?;
        for line in &request.items {
            line.validate()?;
        }

        let posting = begin_posting(&self.db, "adjustment.create", self.lock_timeout).await?;
        MasterDataRepository::get_warehouse(&posting.txn, request.warehouse_id).await?;
        for line in &request.items {
            let key = StockingKey::new(line.item_type, line.item_id, request.warehouse_id)
                .with_location(line.warehouse_location_id);
            MasterDataRepository::resolve_stocking_key(&posting.txn, &key).await?;
        }

        let adjustment_number =
            next_document_number(&posting.txn, KIND, request.adjustment_date).await?;
        let now = Utc::now();
        let header = stock_adjustment::ActiveModel {
            id: Set(Uuid::new_v4()),
            adjustment_number: Set(adjustment_number),
            warehouse_id: Set(request.warehouse_id),
            adjustment_date: Set(request.adjustment_date),
            reason: Set(request.reason),
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
            let item = stock_adjustment_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                stock_adjustment_id: Set(header.id),
                item_type: Set(line.item_type),
                item_id: Set(line.item_id),
                warehouse_location_id: Set(line.warehouse_location_id),
                batch_number: Set(line.batch_number),
                lot_number: Set(line.lot_number),
                expiry_date: Set(line.expiry_date),
                quantity: Set(line.quantity),
                unit_cost: Set(line.unit_cost),
            }
            .insert(&posting.txn)
            .await?;
            items.push(item);
        }

        commit_posting(posting).await?;
        info!(
            adjustment_id = %header.id,
            adjustment_number = %header.adjustment_number,
            "Stock adjustment created"
        );
        Ok(StockAdjustmentDocument { header, items })
    }

    #[instrument(skip(self))]
    pub async fn post(
        &self,
        adjustment_id: Uuid,
        actor: &str,
    ) -> Result<StockAdjustmentDocument, ServiceError> {
        let posting = begin_posting(&self.db, "adjustment.post", self.lock_timeout).await?;
        let header = lock_document::<stock_adjustment::Entity>(
            &posting.txn,
            adjustment_id,
            "Stock adjustment",
        )
        .await?;
        KIND.ensure_postable(header.status)?;

        let items = load_items(&posting.txn, adjustment_id).await?;
        let movement = Movement {
            transaction_number: header.adjustment_number.clone(),
            transaction_date: header.adjustment_date,
            source: DocumentRef::new(KIND.reference_type(), header.id),
            fulfils: None,
            actor: actor.to_string(),
        };

        let (inbound, outbound): (Vec<_>, Vec<_>) =
            items.iter().partition(|i| i.quantity > Decimal::ZERO);
        let inbound: Vec<StockingKey> = inbound
            .into_iter()
            .map(|i| line_key(header.warehouse_id, i))
            .collect();
        let outbound: Vec<StockingKey> = outbound
            .into_iter()
            .map(|i| line_key(header.warehouse_id, i))
            .collect();
        lock_balances(
            &posting.txn,
            &inbound.iter().collect::<Vec<_>>(),
            &outbound.iter().collect::<Vec<_>>(),
        )
        .await?;

        let mut posted = Vec::with_capacity(items.len());
        for item in &items {
            let key = line_key(header.warehouse_id, item);
            let result = if item.quantity > Decimal::ZERO {
                let line = StockLine {
                    key,
                    quantity: item.quantity,
                    unit_cost: item.unit_cost,
                    expiry_date: item.expiry_date,
                };
                post_receipt(&posting.txn, TransactionType::Adjustment, &line, &movement).await?
            } else {
                post_consumption(
                    &posting.txn,
                    TransactionType::Adjustment,
                    &key,
                    -item.quantity,
                    &movement,
                )
                .await?
            };
            posted.push(result);
        }

        let now = Utc::now();
        let mut active: stock_adjustment::ActiveModel = header.into();
        active.status = Set(KIND.posted_status());
        active.posted_by = Set(Some(actor.to_string()));
        active.posted_at = Set(Some(now));
        active.updated_at = Set(now);
        let header = active.update(&posting.txn).await?;

        commit_posting(posting).await?;
        info!(adjustment_id = %adjustment_id, ledger_entries = posted.len(), "Stock adjustment posted");

        if let Some(sender) = &self.event_sender {
            sender.publish(Event::DocumentPosted {
                kind: KIND,
                document_id: header.id,
                document_number: header.adjustment_number.clone(),
                ledger_entries: posted.len(),
            });
            sender.publish_all(posted.iter().filter_map(|p| p.availability_warning()));
        }
        Ok(StockAdjustmentDocument { header, items })
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, adjustment_id: Uuid) -> Result<stock_adjustment::Model, ServiceError> {
        let posting = begin_posting(&self.db, "adjustment.cancel", self.lock_timeout).await?;
        let header = lock_document::<stock_adjustment::Entity>(
            &posting.txn,
            adjustment_id,
            "Stock adjustment",
        )
        .await?;
        KIND.ensure_cancellable(header.status)?;

        let mut active: stock_adjustment::ActiveModel = header.into();
        active.status = Set(DocumentStatus::Cancelled);
        active.updated_at = Set(Utc::now());
        let header = active.update(&posting.txn).await?;
        commit_posting(posting).await?;

        if let Some(sender) = &self.event_sender {
            sender.publish(Event::DocumentCancelled {
                kind: KIND,
                document_id: header.id,
                document_number: header.adjustment_number.clone(),
            });
        }
        Ok(header)
    }

    pub async fn get(&self, adjustment_id: Uuid) -> Result<StockAdjustmentDocument, ServiceError> {
        let header = stock_adjustment::Entity::find_by_id(adjustment_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Stock adjustment {} not found", adjustment_id))
            })?;
        let items = load_items(&*self.db, adjustment_id).await?;
        Ok(StockAdjustmentDocument { header, items })
    }
}
