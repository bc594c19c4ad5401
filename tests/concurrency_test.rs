mod common;

use std::future::Future;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use common::{assert_close, date, TestDb, ACTOR};
use warehouse_ledger::{
    models::{ItemType, StockingKey},
    services::{
        material_issue::{CreateMaterialIssueNote, MaterialIssueLine},
        stock_adjustment::{CreateStockAdjustment, StockAdjustmentLine},
        stock_query::{Query, VerifyLedgerQuery},
        stock_transfer::{CreateStockTransfer, StockTransferLine},
    },
    ServiceError,
};

async fn opening_stock(env: &TestDb, warehouse_id: Uuid, material_id: Uuid, quantity: Decimal) {
    let adjustments = env.factory.stock_adjustment_service();
    let seed = adjustments
        .create(CreateStockAdjustment {
            warehouse_id,
            adjustment_date: date(2024, 5, 1),
            reason: "opening stock".into(),
            created_by: ACTOR.into(),
            items: vec![StockAdjustmentLine {
                item_type: ItemType::Material,
                item_id: material_id,
                warehouse_location_id: None,
                batch_number: None,
                lot_number: None,
                expiry_date: None,
                quantity,
                unit_cost: Some(dec!(0.8)),
            }],
        })
        .await
        .unwrap();
    adjustments.post(seed.header.id, ACTOR).await.unwrap();
}

async fn draft_issues(env: &TestDb, warehouse_id: Uuid, material_id: Uuid, count: usize) -> Vec<Uuid> {
    let issues = env.factory.material_issue_service();
    let mut ids = Vec::new();
    for _ in 0..count {
        let doc = issues
            .create(CreateMaterialIssueNote {
                warehouse_id,
                material_request_id: None,
                department: Some("bakery".into()),
                issue_date: date(2024, 5, 2),
                created_by: ACTOR.into(),
                items: vec![MaterialIssueLine {
                    material_id,
                    warehouse_location_id: None,
                    batch_number: None,
                    lot_number: None,
                    quantity: dec!(60),
                }],
            })
            .await
            .unwrap();
        ids.push(doc.header.id);
    }
    ids
}

/// Runs `op` until it stops reporting lock contention.
async fn with_retry<T, F, Fut>(mut op: F) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let mut attempts = 0;
    loop {
        match op().await {
            Err(err) if err.is_retryable() && attempts < 20 => {
                attempts += 1;
                tokio::time::sleep(std::time::Duration::from_millis(10 * attempts)).await;
            }
            other => return other,
        }
    }
}

// The in-memory pool has one connection, so the two posts are serialized
// and this only checks the outcome of back-to-back postings. The
// file-backed tests below put the posts on separate connections.
#[tokio::test]
async fn serialized_issues_cannot_oversell() {
    let env = TestDb::new().await;
    let wh = env.warehouse("WH-A").await;
    let flour = env.material("FLOUR").await;
    let key = StockingKey::material(flour, wh);
    opening_stock(&env, wh, flour, dec!(100)).await;

    let issues = env.factory.material_issue_service();
    let mut tasks = Vec::new();
    for id in draft_issues(&env, wh, flour, 2).await {
        let issues = issues.clone();
        tasks.push(tokio::spawn(async move { issues.post(id, ACTOR).await }));
    }

    let mut successes = 0;
    let mut shortages = 0;
    for task in tasks {
        match task.await.expect("task panicked") {
            Ok(_) => successes += 1,
            Err(ServiceError::InsufficientStock(_)) => shortages += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(shortages, 1);

    assert_close(env.on_hand(&key).await, dec!(40));
    assert_eq!(env.ledger_len(&key).await, 2);
    let report = VerifyLedgerQuery.execute(&env.db).await.unwrap();
    assert!(report.is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn competing_issues_on_separate_connections_cannot_oversell() {
    let dir = tempfile::tempdir().unwrap();
    let env = TestDb::file_backed(dir.path()).await;
    let wh = env.warehouse("WH-A").await;
    let flour = env.material("FLOUR").await;
    let key = StockingKey::material(flour, wh);
    opening_stock(&env, wh, flour, dec!(100)).await;

    let issues = env.factory.material_issue_service();
    let mut tasks = Vec::new();
    for id in draft_issues(&env, wh, flour, 2).await {
        let issues = issues.clone();
        tasks.push(tokio::spawn(async move {
            with_retry(|| issues.post(id, ACTOR)).await
        }));
    }

    let mut successes = 0;
    let mut shortages = 0;
    for task in tasks {
        match task.await.expect("task panicked") {
            Ok(_) => successes += 1,
            Err(ServiceError::InsufficientStock(_)) => shortages += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(shortages, 1);

    assert_close(env.on_hand(&key).await, dec!(40));
    assert_eq!(env.ledger_len(&key).await, 2);
    let report = VerifyLedgerQuery.execute(&env.db).await.unwrap();
    assert!(report.is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn crossing_transfers_both_complete() {
    let dir = tempfile::tempdir().unwrap();
    let env = TestDb::file_backed(dir.path()).await;
    let north = env.warehouse("WH-N").await;
    let south = env.warehouse("WH-S").await;
    let flour = env.material("FLOUR").await;
    opening_stock(&env, north, flour, dec!(100)).await;
    opening_stock(&env, south, flour, dec!(100)).await;

    let transfers = env.factory.stock_transfer_service();
    let mut ids = Vec::new();
    for (from, to) in [(north, south), (south, north)] {
        let doc = transfers
            .create(CreateStockTransfer {
                from_warehouse_id: from,
                to_warehouse_id: to,
                transfer_date: date(2024, 5, 3),
                created_by: ACTOR.into(),
                items: vec![StockTransferLine {
                    item_type: ItemType::Material,
                    item_id: flour,
                    from_location_id: None,
                    to_location_id: None,
                    batch_number: None,
                    lot_number: None,
                    quantity: dec!(25),
                }],
            })
            .await
            .unwrap();
        ids.push(doc.header.id);
    }

    let mut tasks = Vec::new();
    for id in ids {
        let transfers = transfers.clone();
        tasks.push(tokio::spawn(async move {
            with_retry(|| transfers.post(id, ACTOR)).await
        }));
    }
    for task in tasks {
        task.await.expect("task panicked").expect("transfer posts");
    }

    assert_close(env.on_hand(&StockingKey::material(flour, north)).await, dec!(100));
    assert_close(env.on_hand(&StockingKey::material(flour, south)).await, dec!(100));
    let report = VerifyLedgerQuery.execute(&env.db).await.unwrap();
    assert!(report.is_consistent());
}
