//! Warehouse ledger library
//!
//! Inventory ledger and balance consistency engine: stock documents post
//! into an append-only ledger while per-key balances, weighted-average costs
//! and reservations stay consistent with it.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod migrator;
pub mod models;
pub mod repositories;
pub mod services;

pub use errors::ServiceError;
pub use models::StockingKey;
