#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

use warehouse_ledger::{
    db::{self, DbConfig},
    entities::{finished_product, material, warehouse, warehouse_location},
    events::{Event, EventSender},
    models::{LifecycleStatus, StockingKey},
    repositories::{StockBalanceRepository, StockLedgerRepository},
    services::factory::ServiceFactory,
};

pub const ACTOR: &str = "test-user";

/// Helper harness backed by a fresh SQLite database.
///
/// `new()` uses `:memory:`. SQLite keeps one such database per connection,
/// so that pool is pinned to a single connection and concurrent postings
/// queue on it. `file_backed()` gives real writer contention.
pub struct TestDb {
    pub db: Arc<DatabaseConnection>,
    pub factory: ServiceFactory,
    pub events: tokio::sync::mpsc::Receiver<Event>,
}

/// Unmigrated in-memory SQLite pool pinned to one connection.
pub async fn memory_pool() -> DatabaseConnection {
    let cfg = DbConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        acquire_timeout: Duration::from_secs(30),
        ..Default::default()
    };
    db::establish_connection_with_config(&cfg)
        .await
        .expect("failed to create test database")
}

impl TestDb {
    pub async fn new() -> Self {
        Self::with_pool(memory_pool().await).await
    }

    /// Database file under `dir` with several pooled connections, so
    /// concurrent postings really compete for the write lock.
    pub async fn file_backed(dir: &std::path::Path) -> Self {
        let cfg = DbConfig {
            url: format!("sqlite://{}?mode=rwc", dir.join("ledger.db").display()),
            max_connections: 4,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(30),
            ..Default::default()
        };
        let pool = db::establish_connection_with_config(&cfg)
            .await
            .expect("failed to create test database file");
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: DatabaseConnection) -> Self {
        db::run_migrations(&pool).await.expect("migrations");

        let db = Arc::new(pool);
        let (sender, events) = EventSender::channel(256);
        let factory = ServiceFactory::new(db.clone(), Some(sender));
        Self {
            db,
            factory,
            events,
        }
    }

    /// Events published so far, without waiting for more.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    pub async fn warehouse(&self, code: &str) -> Uuid {
        let now = Utc::now();
        warehouse::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.to_string()),
            name: Set(format!("Warehouse {}", code)),
            lifecycle_status: Set(LifecycleStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .expect("seed warehouse")
        .id
    }

    pub async fn location(&self, warehouse_id: Uuid, code: &str) -> Uuid {
        let now = Utc::now();
        warehouse_location::ActiveModel {
            id: Set(Uuid::new_v4()),
            warehouse_id: Set(warehouse_id),
            code: Set(code.to_string()),
            name: Set(format!("Location {}", code)),
            lifecycle_status: Set(LifecycleStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .expect("seed location")
        .id
    }

    pub async fn material(&self, code: &str) -> Uuid {
        let now = Utc::now();
        material::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.to_string()),
            name: Set(format!("Material {}", code)),
            unit_of_measure: Set("kg".to_string()),
            lifecycle_status: Set(LifecycleStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .expect("seed material")
        .id
    }

    pub async fn finished_product(&self, code: &str) -> Uuid {
        let now = Utc::now();
        finished_product::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.to_string()),
            name: Set(format!("Product {}", code)),
            unit_of_measure: Set("pcs".to_string()),
            lifecycle_status: Set(LifecycleStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .expect("seed finished product")
        .id
    }

    /// Soft-deletes a warehouse so new postings against it are refused.
    pub async fn delete_warehouse(&self, warehouse_id: Uuid) {
        let row = warehouse::Entity::find_by_id(warehouse_id)
            .one(&*self.db)
            .await
            .expect("load warehouse")
            .expect("warehouse exists");
        let mut active: warehouse::ActiveModel = row.into();
        active.lifecycle_status = Set(LifecycleStatus::Deleted);
        active.update(&*self.db).await.expect("delete warehouse");
    }

    /// Physical quantity on the balance row, zero when the key never moved.
    pub async fn on_hand(&self, key: &StockingKey) -> Decimal {
        StockBalanceRepository::find(&*self.db, key)
            .await
            .expect("balance lookup")
            .map(|b| b.quantity)
            .unwrap_or(Decimal::ZERO)
    }

    pub async fn reserved(&self, key: &StockingKey) -> Decimal {
        StockBalanceRepository::find(&*self.db, key)
            .await
            .expect("balance lookup")
            .map(|b| b.reserved_quantity)
            .unwrap_or(Decimal::ZERO)
    }

    pub async fn ledger_len(&self, key: &StockingKey) -> usize {
        StockLedgerRepository::entries_for_key(&*self.db, key)
            .await
            .expect("ledger lookup")
            .len()
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Decimals come back from SQLite through `f64`; compare with a tolerance.
pub fn assert_close(actual: Decimal, expected: Decimal) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= Decimal::new(1, 4),
        "expected {} but got {}",
        expected,
        actual
    );
}
