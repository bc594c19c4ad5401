//! Data access for the stock engine.
//!
//! Every function takes a generic [`sea_orm::ConnectionTrait`] so the same
//! code runs against a pooled connection for reads and against the caller's
//! open transaction for postings.

pub mod master_data_repository;
pub mod stock_balance_repository;
pub mod stock_ledger_repository;
pub mod stock_reservation_repository;

pub use master_data_repository::MasterDataRepository;
pub use stock_balance_repository::{BalanceUpdate, StockBalanceRepository};
pub use stock_ledger_repository::{NewLedgerEntry, StockLedgerRepository};
pub use stock_reservation_repository::{NewReservation, StockReservationRepository};
