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
use crate::entities::{material_issue_note, material_issue_note_item};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{DocumentKind, DocumentStatus, ReferenceType, StockingKey, TransactionType};
use crate::repositories::MasterDataRepository;
use crate::services::document_sequence::next_document_number;
use crate::services::posting::{lock_balances, post_consumption, DocumentRef, Movement};
use crate::services::{lock_document, DEFAULT_LOCK_TIMEOUT};

const KIND: DocumentKind = DocumentKind::MaterialIssueNote;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MaterialIssueLine {
    pub material_id: Uuid,
    pub warehouse_location_id: Option<Uuid>,
    pub batch_number: Option<String>,
    pub lot_number: Option<String>,
    #[validate(custom = "crate::services::validate_positive")]
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateMaterialIssueNote {
    pub warehouse_id: Uuid,
    /// Material request whose reservations this issue consumes.
    pub material_request_id: Option<Uuid>,
    pub department: Option<String>,
    pub issue_date: NaiveDate,
    #[validate(length(min = 1))]
    pub created_by: String,
    #[validate(length(min = 1))]
    pub items: Vec<MaterialIssueLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaterialIssueDocument {
    pub header: material_issue_note::Model,
    pub items: Vec<material_issue_note_item::Model>,
}

fn line_key(warehouse_id: Uuid, item: &material_issue_note_item::Model) -> StockingKey {
    StockingKey::material(item.material_id, warehouse_id)
        .with_location(item.warehouse_location_id)
        .with_batch(item.batch_number.clone())
        .with_lot(item.lot_number.clone())
}

async fn load_items<C: ConnectionTrait>(
    db: &C,
    min_id: Uuid,
) -> Result<Vec<material_issue_note_item::Model>, ServiceError> {
    Ok(material_issue_note_item::Entity::find()
        .filter(material_issue_note_item::Column::MaterialIssueNoteId.eq(min_id))
        .order_by_asc(material_issue_note_item::Column::Id)
        .all(db)
        .await?)
}

/// Material issue notes: stock leaves the warehouse for production.
#[derive(Clone)]
pub struct MaterialIssueService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<EventSender>,
    lock_timeout: Duration,
}

impl MaterialIssueService {
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
        request: CreateMaterialIssueNote,
    ) -> Result<MaterialIssueDocument, ServiceError> {
        request.validate()?;
        for line in &request.items {
            line.validate()?;
        }

        let posting = begin_posting(&self.db, "min.create", self.lock_timeout).await?;
        MasterDataRepository::get_warehouse(&posting.txn, request.warehouse_id).await?;
        for line in &request.items {
            let key = StockingKey::material(line.material_id, request.warehouse_id)
                .with_location(line.warehouse_location_id);
            MasterDataRepository::resolve_stocking_key(&posting.txn, &key).await?;
        }

        let min_number = next_document_number(&posting.txn, KIND, request.issue_date).await?;
        let now = Utc::now();
        let header = material_issue_note::ActiveModel {
            id: Set(Uuid::new_v4()),
            min_number: Set(min_number),
            warehouse_id: Set(request.warehouse_id),
            material_request_id: Set(request.material_request_id),
            department: Set(request.department),
            issue_date: Set(request.issue_date),
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
            let item = material_issue_note_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                material_issue_note_id: Set(header.id),
                material_id: Set(line.material_id),
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
        info!(min_id = %header.id, min_number = %header.min_number, "Material issue note created");
        Ok(MaterialIssueDocument { header, items })
    }

    /// Issues every line. Any line short of stock rolls back the whole note.
    #[instrument(skip(self))]
    pub async fn post(&self, min_id: Uuid, actor: &str) -> Result<MaterialIssueDocument, ServiceError> {
        let posting = begin_posting(&self.db, "min.post", self.lock_timeout).await?;
        let header = lock_document::<material_issue_note::Entity>(
            &posting.txn,
            min_id,
            "Material issue note",
        )
        .await?;
        KIND.ensure_postable(header.status)?;

        let items = load_items(&posting.txn, min_id).await?;
        let movement = Movement {
            transaction_number: header.min_number.clone(),
            transaction_date: header.issue_date,
            source: DocumentRef::new(KIND.reference_type(), header.id),
            fulfils: header
                .material_request_id
                .map(|id| DocumentRef::new(ReferenceType::MaterialRequest, id)),
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
                post_consumption(&posting.txn, TransactionType::Issue, &key, item.quantity, &movement)
                    .await?,
            );
        }

        let now = Utc::now();
        let mut active: material_issue_note::ActiveModel = header.into();
        active.status = Set(KIND.posted_status());
        active.posted_by = Set(Some(actor.to_string()));
        active.posted_at = Set(Some(now));
        active.updated_at = Set(now);
        let header = active.update(&posting.txn).await?;

        commit_posting(posting).await?;
        info!(min_id = %min_id, ledger_entries = posted.len(), "Material issue note posted");

        if let Some(sender) = &self.event_sender {
            sender.publish(Event::DocumentPosted {
                kind: KIND,
                document_id: header.id,
                document_number: header.min_number.clone(),
                ledger_entries: posted.len(),
            });
            sender.publish_all(posted.iter().filter_map(|p| p.availability_warning()));
        }
        Ok(MaterialIssueDocument { header, items })
    }

    /// Cancels a draft note. Reservations held by its material request stay open.
    #[instrument(skip(self))]
    pub async fn cancel(&self, min_id: Uuid) -> Result<material_issue_note::Model, ServiceError> {
        let posting = begin_posting(&self.db, "min.cancel", self.lock_timeout).await?;
        let header = lock_document::<material_issue_note::Entity>(
            &posting.txn,
            min_id,
            "Material issue note",
        )
        .await?;
        KIND.ensure_cancellable(header.status)?;

        let mut active: material_issue_note::ActiveModel = header.into();
        active.status = Set(DocumentStatus::Cancelled);
        active.updated_at = Set(Utc::now());
        let header = active.update(&posting.txn).await?;
        commit_posting(posting).await?;

        if let Some(sender) = &self.event_sender {
            sender.publish(Event::DocumentCancelled {
                kind: KIND,
                document_id: header.id,
                document_number: header.min_number.clone(),
            });
        }
        Ok(header)
    }

    pub async fn get(&self, min_id: Uuid) -> Result<MaterialIssueDocument, ServiceError> {
        let header = material_issue_note::Entity::find_by_id(min_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Material issue note {} not found", min_id))
            })?;
        let items = load_items(&*self.db, min_id).await?;
        Ok(MaterialIssueDocument { header, items })
    }
}
