use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::db::{begin_posting, commit_posting};
use crate::entities::{goods_receipt_note, goods_receipt_note_item};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{DocumentKind, DocumentStatus, StockingKey, TransactionType};
use crate::repositories::MasterDataRepository;
use crate::services::document_sequence::next_document_number;
use crate::services::posting::{lock_balances, post_receipt, DocumentRef, Movement, StockLine};
use crate::services::{lock_document, DEFAULT_LOCK_TIMEOUT};

const KIND: DocumentKind = DocumentKind::GoodsReceiptNote;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GoodsReceiptLine {
    pub material_id: Uuid,
    pub warehouse_location_id: Option<Uuid>,
    pub batch_number: Option<String>,
    pub lot_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    #[validate(custom = "crate::services::validate_positive")]
    pub received_quantity: Decimal,
    #[validate(custom = "crate::services::validate_non_negative")]
    pub unit_cost: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateGoodsReceiptNote {
    pub warehouse_id: Uuid,
    pub purchase_order_reference: Option<String>,
    pub receipt_date: NaiveDate,
    pub notes: Option<String>,
    #[validate(length(min = 1))]
    pub created_by: String,
    #[validate(length(min = 1))]
    pub items: Vec<GoodsReceiptLine>,
}

/// QC outcome for one received line.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QcLine {
    pub item_id: Uuid,
    #[validate(custom = "crate::services::validate_non_negative")]
    pub accepted_quantity: Decimal,
    #[validate(custom = "crate::services::validate_non_negative")]
    pub rejected_quantity: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CompleteQc {
    #[validate(length(min = 1))]
    pub inspected_by: String,
    pub lines: Vec<QcLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoodsReceiptDocument {
    pub header: goods_receipt_note::Model,
    pub items: Vec<goods_receipt_note_item::Model>,
}

fn line_key(warehouse_id: Uuid, item: &goods_receipt_note_item::Model) -> StockingKey {
    StockingKey::material(item.material_id, warehouse_id)
        .with_location(item.warehouse_location_id)
        .with_batch(item.batch_number.clone())
        .with_lot(item.lot_number.clone())
}

/// Goods receipt notes: `pending_qc → qc_completed → posted`.
#[derive(Clone)]
pub struct GoodsReceiptService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<EventSender>,
    lock_timeout: Duration,
}

impl GoodsReceiptService {
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

    async fn load_items(
        txn: &DatabaseTransaction,
        grn_id: Uuid,
    ) -> Result<Vec<goods_receipt_note_item::Model>, ServiceError> {
        Ok(goods_receipt_note_item::Entity::find()
            .filter(goods_receipt_note_item::Column::GoodsReceiptNoteId.eq(grn_id))
            .order_by_asc(goods_receipt_note_item::Column::Id)
            .all(txn)
            .await?)
    }

    /// Records a receipt awaiting QC. Nothing reaches stock yet.
    #[instrument(skip(self, request), fields(warehouse_id = %request.warehouse_id))]
    pub async fn create(
        &self,
        request: CreateGoodsReceiptNote,
    ) -> Result<GoodsReceiptDocument, ServiceError> {
        request.validate()?;
        for line in &request.items {
            line.validate()?;
        }

        let posting = begin_posting(&self.db, "grn.create", self.lock_timeout).await?;
        MasterDataRepository::get_warehouse(&posting.txn, request.warehouse_id).await?;
        for line in &request.items {
            let key = StockingKey::material(line.material_id, request.warehouse_id)
                .with_location(line.warehouse_location_id);
            MasterDataRepository::resolve_stocking_key(&posting.txn, &key).await?;
        }

        let grn_number = next_document_number(&posting.txn, KIND, request.receipt_date).await?;
        let now = Utc::now();
        let header = goods_receipt_note::ActiveModel {
            id: Set(Uuid::new_v4()),
            grn_number: Set(grn_number),
            warehouse_id: Set(request.warehouse_id),
            purchase_order_reference: Set(request.purchase_order_reference),
            receipt_date: Set(request.receipt_date),
            status: Set(KIND.initial_status()),
            notes: Set(request.notes),
            created_by: Set(request.created_by),
            qc_completed_by: Set(None),
            qc_completed_at: Set(None),
            posted_by: Set(None),
            posted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&posting.txn)
        .await?;

        let mut items = Vec::with_capacity(request.items.len());
        for line in request.items {
            let item = goods_receipt_note_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                goods_receipt_note_id: Set(header.id),
                material_id: Set(line.material_id),
                warehouse_location_id: Set(line.warehouse_location_id),
                batch_number: Set(line.batch_number),
                lot_number: Set(line.lot_number),
                expiry_date: Set(line.expiry_date),
                received_quantity: Set(line.received_quantity),
                accepted_quantity: Set(Decimal::ZERO),
                rejected_quantity: Set(Decimal::ZERO),
                unit_cost: Set(line.unit_cost),
            }
            .insert(&posting.txn)
            .await?;
            items.push(item);
        }

        commit_posting(posting).await?;
        info!(grn_id = %header.id, grn_number = %header.grn_number, "Goods receipt note created");
        Ok(GoodsReceiptDocument { header, items })
    }

    /// Splits every received line into accepted and rejected quantities.
    /// Each line must be covered and must add up to what was received.
    #[instrument(skip(self, qc))]
    pub async fn complete_qc(
        &self,
        grn_id: Uuid,
        qc: CompleteQc,
    ) -> Result<GoodsReceiptDocument, ServiceError> {
        qc.validate()?;
        for line in &qc.lines {
            line.validate()?;
        }
        let mut outcomes: HashMap<Uuid, &QcLine> = HashMap::with_capacity(qc.lines.len());
        for line in &qc.lines {
            if outcomes.insert(line.item_id, line).is_some() {
                return Err(ServiceError::ValidationError(format!(
                    "Line {} has more than one QC result",
                    line.item_id
                )));
            }
        }

        let posting = begin_posting(&self.db, "grn.complete_qc", self.lock_timeout).await?;
        let header =
            lock_document::<goods_receipt_note::Entity>(&posting.txn, grn_id, "Goods receipt note")
                .await?;
        KIND.ensure_transition(header.status, DocumentStatus::QcCompleted)?;

        let mut items = Vec::new();
        for item in Self::load_items(&posting.txn, grn_id).await? {
            let outcome = outcomes.get(&item.id).ok_or_else(|| {
                ServiceError::ValidationError(format!("No QC result for line {}", item.id))
            })?;
            if outcome.accepted_quantity + outcome.rejected_quantity != item.received_quantity {
                return Err(ServiceError::ValidationError(format!(
                    "Line {}: accepted {} + rejected {} must equal received {}",
                    item.id,
                    outcome.accepted_quantity,
                    outcome.rejected_quantity,
                    item.received_quantity
                )));
            }
            let mut active: goods_receipt_note_item::ActiveModel = item.into();
            active.accepted_quantity = Set(outcome.accepted_quantity);
            active.rejected_quantity = Set(outcome.rejected_quantity);
            items.push(active.update(&posting.txn).await?);
        }
        if items.len() != outcomes.len() {
            return Err(ServiceError::ValidationError(
                "QC results reference lines outside this receipt".to_string(),
            ));
        }

        let now = Utc::now();
        let mut active: goods_receipt_note::ActiveModel = header.into();
        active.status = Set(DocumentStatus::QcCompleted);
        active.qc_completed_by = Set(Some(qc.inspected_by));
        active.qc_completed_at = Set(Some(now));
        active.updated_at = Set(now);
        let header = active.update(&posting.txn).await?;

        commit_posting(posting).await?;
        info!(grn_id = %grn_id, "Goods receipt QC completed");
        Ok(GoodsReceiptDocument { header, items })
    }

    /// Receives the accepted quantity of every line into stock.
    #[instrument(skip(self))]
    pub async fn post(&self, grn_id: Uuid, actor: &str) -> Result<GoodsReceiptDocument, ServiceError> {
        let posting = begin_posting(&self.db, "grn.post", self.lock_timeout).await?;
        let header =
            lock_document::<goods_receipt_note::Entity>(&posting.txn, grn_id, "Goods receipt note")
                .await?;
        KIND.ensure_postable(header.status)?;

        let items = Self::load_items(&posting.txn, grn_id).await?;
        let movement = Movement {
            transaction_number: header.grn_number.clone(),
            transaction_date: header.receipt_date,
            source: DocumentRef::new(KIND.reference_type(), header.id),
            fulfils: None,
            actor: actor.to_string(),
        };

        let keys: Vec<StockingKey> = items
            .iter()
            .filter(|i| i.accepted_quantity > Decimal::ZERO)
            .map(|i| line_key(header.warehouse_id, i))
            .collect();
        lock_balances(&posting.txn, &keys.iter().collect::<Vec<_>>(), &[]).await?;

        let mut posted = Vec::new();
        for item in items.iter().filter(|i| i.accepted_quantity > Decimal::ZERO) {
            let line = StockLine {
                key: line_key(header.warehouse_id, item),
                quantity: item.accepted_quantity,
                unit_cost: Some(item.unit_cost),
                expiry_date: item.expiry_date,
            };
            posted.push(post_receipt(&posting.txn, TransactionType::Grn, &line, &movement).await?);
        }

        let now = Utc::now();
        let mut active: goods_receipt_note::ActiveModel = header.into();
        active.status = Set(KIND.posted_status());
        active.posted_by = Set(Some(actor.to_string()));
        active.posted_at = Set(Some(now));
        active.updated_at = Set(now);
        let header = active.update(&posting.txn).await?;

        commit_posting(posting).await?;
        info!(grn_id = %grn_id, ledger_entries = posted.len(), "Goods receipt note posted");

        if let Some(sender) = &self.event_sender {
            sender.publish(Event::DocumentPosted {
                kind: KIND,
                document_id: header.id,
                document_number: header.grn_number.clone(),
                ledger_entries: posted.len(),
            });
        }
        Ok(GoodsReceiptDocument { header, items })
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, grn_id: Uuid) -> Result<goods_receipt_note::Model, ServiceError> {
        let posting = begin_posting(&self.db, "grn.cancel", self.lock_timeout).await?;
        let header =
            lock_document::<goods_receipt_note::Entity>(&posting.txn, grn_id, "Goods receipt note")
                .await?;
        KIND.ensure_cancellable(header.status)?;

        let mut active: goods_receipt_note::ActiveModel = header.into();
        active.status = Set(DocumentStatus::Cancelled);
        active.updated_at = Set(Utc::now());
        let header = active.update(&posting.txn).await?;
        commit_posting(posting).await?;

        if let Some(sender) = &self.event_sender {
            sender.publish(Event::DocumentCancelled {
                kind: KIND,
                document_id: header.id,
                document_number: header.grn_number.clone(),
            });
        }
        Ok(header)
    }

    pub async fn get(&self, grn_id: Uuid) -> Result<GoodsReceiptDocument, ServiceError> {
        let db = &*self.db;
        let header = goods_receipt_note::Entity::find_by_id(grn_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Goods receipt note {} not found", grn_id)))?;
        let items = goods_receipt_note_item::Entity::find()
            .filter(goods_receipt_note_item::Column::GoodsReceiptNoteId.eq(grn_id))
            .order_by_asc(goods_receipt_note_item::Column::Id)
            .all(db)
            .await?;
        Ok(GoodsReceiptDocument { header, items })
    }
}
