//! Domain types shared by entities, repositories and services.

pub mod document_state;
pub mod enums;
pub mod stocking_key;

pub use document_state::{DocumentKind, DocumentStatus};
pub use enums::{ItemType, LifecycleStatus, ReferenceType, ReservationStatus, TransactionType};
pub use stocking_key::{StockingKey, StockingKeyColumns};
