use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::enums::ReferenceType;
use crate::errors::ServiceError;

/// Header status shared by every stock document table.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentStatus {
    #[sea_orm(string_value = "pending_qc")]
    PendingQc,
    #[sea_orm(string_value = "qc_completed")]
    QcCompleted,
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "posted")]
    Posted,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// The five document types that move stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentKind {
    GoodsReceiptNote,
    MaterialIssueNote,
    StockAdjustment,
    StockTransfer,
    DeliveryOrder,
}

impl DocumentKind {
    pub fn initial_status(self) -> DocumentStatus {
        match self {
            DocumentKind::GoodsReceiptNote => DocumentStatus::PendingQc,
            DocumentKind::MaterialIssueNote
            | DocumentKind::StockAdjustment
            | DocumentKind::StockTransfer
            | DocumentKind::DeliveryOrder => DocumentStatus::Draft,
        }
    }

    /// Terminal status reached once stock effects are applied.
    pub fn posted_status(self) -> DocumentStatus {
        match self {
            DocumentKind::DeliveryOrder => DocumentStatus::Shipped,
            DocumentKind::GoodsReceiptNote
            | DocumentKind::MaterialIssueNote
            | DocumentKind::StockAdjustment
            | DocumentKind::StockTransfer => DocumentStatus::Posted,
        }
    }

    pub fn number_prefix(self) -> &'static str {
        match self {
            DocumentKind::GoodsReceiptNote => "GRN",
            DocumentKind::MaterialIssueNote => "MIN",
            DocumentKind::StockAdjustment => "ADJ",
            DocumentKind::StockTransfer => "TRF",
            DocumentKind::DeliveryOrder => "DO",
        }
    }

    /// Reference type written on ledger entries this document produces.
    pub fn reference_type(self) -> ReferenceType {
        match self {
            DocumentKind::GoodsReceiptNote => ReferenceType::GoodsReceiptNote,
            DocumentKind::MaterialIssueNote => ReferenceType::MaterialIssueNote,
            DocumentKind::StockAdjustment => ReferenceType::StockAdjustment,
            DocumentKind::StockTransfer => ReferenceType::StockTransfer,
            DocumentKind::DeliveryOrder => ReferenceType::DeliveryOrder,
        }
    }

    pub fn is_posted(self, status: DocumentStatus) -> bool {
        status == self.posted_status()
    }

    pub fn can_transition(self, from: DocumentStatus, to: DocumentStatus) -> bool {
        use DocumentStatus::*;
        match self {
            DocumentKind::GoodsReceiptNote => matches!(
                (from, to),
                (PendingQc, QcCompleted)
                    | (QcCompleted, Posted)
                    | (PendingQc, Cancelled)
                    | (QcCompleted, Cancelled)
            ),
            DocumentKind::MaterialIssueNote
            | DocumentKind::StockAdjustment
            | DocumentKind::StockTransfer
            | DocumentKind::DeliveryOrder => {
                from == Draft && (to == self.posted_status() || to == Cancelled)
            }
        }
    }

    /// Rejects a transition the lifecycle does not allow. Re-posting a posted
    /// document reports `AlreadyPosted` so callers can tell it from other
    /// workflow mistakes.
    pub fn ensure_transition(
        self,
        from: DocumentStatus,
        to: DocumentStatus,
    ) -> Result<(), ServiceError> {
        if self.is_posted(from) && self.is_posted(to) {
            return Err(ServiceError::AlreadyPosted(format!(
                "{} is already {}",
                self, from
            )));
        }
        if !self.can_transition(from, to) {
            return Err(ServiceError::InvalidStateTransition(format!(
                "{} cannot move from {} to {}",
                self, from, to
            )));
        }
        Ok(())
    }

    pub fn ensure_postable(self, status: DocumentStatus) -> Result<(), ServiceError> {
        self.ensure_transition(status, self.posted_status())
    }

    pub fn ensure_cancellable(self, status: DocumentStatus) -> Result<(), ServiceError> {
        self.ensure_transition(status, DocumentStatus::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use DocumentKind::*;
    use DocumentStatus::*;

    #[rstest]
    #[case(GoodsReceiptNote, PendingQc, QcCompleted, true)]
    #[case(GoodsReceiptNote, QcCompleted, Posted, true)]
    #[case(GoodsReceiptNote, PendingQc, Posted, false)]
    #[case(GoodsReceiptNote, PendingQc, Cancelled, true)]
    #[case(GoodsReceiptNote, QcCompleted, Cancelled, true)]
    #[case(GoodsReceiptNote, Posted, Cancelled, false)]
    #[case(GoodsReceiptNote, Cancelled, PendingQc, false)]
    #[case(MaterialIssueNote, Draft, Posted, true)]
    #[case(MaterialIssueNote, Draft, Cancelled, true)]
    #[case(MaterialIssueNote, Posted, Cancelled, false)]
    #[case(MaterialIssueNote, Cancelled, Posted, false)]
    #[case(StockAdjustment, Draft, Posted, true)]
    #[case(StockTransfer, Draft, Posted, true)]
    #[case(StockTransfer, Posted, Draft, false)]
    #[case(DeliveryOrder, Draft, Shipped, true)]
    #[case(DeliveryOrder, Draft, Posted, false)]
    #[case(DeliveryOrder, Shipped, Cancelled, false)]
    fn lifecycle_transitions(
        #[case] kind: DocumentKind,
        #[case] from: DocumentStatus,
        #[case] to: DocumentStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(kind.can_transition(from, to), allowed);
    }

    #[rstest]
    #[case(GoodsReceiptNote, Posted)]
    #[case(MaterialIssueNote, Posted)]
    #[case(StockAdjustment, Posted)]
    #[case(StockTransfer, Posted)]
    #[case(DeliveryOrder, Shipped)]
    fn reposting_reports_already_posted(#[case] kind: DocumentKind, #[case] status: DocumentStatus) {
        assert_matches!(kind.ensure_postable(status), Err(ServiceError::AlreadyPosted(_)));
    }

    #[test]
    fn posting_unchecked_receipt_is_invalid() {
        assert_matches!(
            GoodsReceiptNote.ensure_postable(PendingQc),
            Err(ServiceError::InvalidStateTransition(_))
        );
        assert_matches!(
            MaterialIssueNote.ensure_postable(Cancelled),
            Err(ServiceError::InvalidStateTransition(_))
        );
        assert!(GoodsReceiptNote.ensure_postable(QcCompleted).is_ok());
    }

    #[test]
    fn prefixes_and_initial_states() {
        assert_eq!(GoodsReceiptNote.number_prefix(), "GRN");
        assert_eq!(DeliveryOrder.number_prefix(), "DO");
        assert_eq!(GoodsReceiptNote.initial_status(), PendingQc);
        assert_eq!(StockTransfer.initial_status(), Draft);
        assert_eq!(
            MaterialIssueNote.reference_type(),
            ReferenceType::MaterialIssueNote
        );
    }
}
