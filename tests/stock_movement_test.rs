mod common;

use assert_matches::assert_matches;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use common::{assert_close, date, TestDb, ACTOR};
use warehouse_ledger::{
    models::{DocumentStatus, ItemType, ReferenceType, StockingKey, TransactionType},
    repositories::{StockBalanceRepository, StockLedgerRepository},
    services::{
        delivery_order::{CreateDeliveryOrder, DeliveryOrderLine},
        material_issue::{CreateMaterialIssueNote, MaterialIssueLine},
        stock_adjustment::{CreateStockAdjustment, StockAdjustmentLine},
        stock_query::{LedgerQuery, Query, StockLevelQuery, VerifyLedgerQuery},
        stock_transfer::{CreateStockTransfer, StockTransferLine},
    },
    ServiceError,
};

fn adjustment_line(item_type: ItemType, item_id: Uuid, quantity: Decimal, unit_cost: Option<Decimal>) -> StockAdjustmentLine {
    StockAdjustmentLine {
        item_type,
        item_id,
        warehouse_location_id: None,
        batch_number: None,
        lot_number: None,
        expiry_date: None,
        quantity,
        unit_cost,
    }
}

async fn adjust(env: &TestDb, warehouse_id: Uuid, items: Vec<StockAdjustmentLine>) -> Result<Uuid, ServiceError> {
    let service = env.factory.stock_adjustment_service();
    let doc = service
        .create(CreateStockAdjustment {
            warehouse_id,
            adjustment_date: date(2024, 3, 1),
            reason: "cycle count".into(),
            created_by: ACTOR.into(),
            items,
        })
        .await?;
    service.post(doc.header.id, ACTOR).await?;
    Ok(doc.header.id)
}

fn issue_line(material_id: Uuid, quantity: Decimal) -> MaterialIssueLine {
    MaterialIssueLine {
        material_id,
        warehouse_location_id: None,
        batch_number: None,
        lot_number: None,
        quantity,
    }
}

fn issue(warehouse_id: Uuid, items: Vec<MaterialIssueLine>) -> CreateMaterialIssueNote {
    CreateMaterialIssueNote {
        warehouse_id,
        material_request_id: None,
        department: Some("assembly".into()),
        issue_date: date(2024, 3, 2),
        created_by: ACTOR.into(),
        items,
    }
}

#[tokio::test]
async fn over_consumption_rolls_back_every_line() {
    let env = TestDb::new().await;
    let wh = env.warehouse("WH-A").await;
    let bolts = env.material("BOLT").await;
    let nuts = env.material("NUT").await;
    adjust(
        &env,
        wh,
        vec![
            adjustment_line(ItemType::Material, bolts, dec!(10), Some(dec!(1))),
            adjustment_line(ItemType::Material, nuts, dec!(5), Some(dec!(1))),
        ],
    )
    .await
    .unwrap();

    let service = env.factory.material_issue_service();
    let doc = service
        .create(issue(wh, vec![issue_line(bolts, dec!(4)), issue_line(nuts, dec!(20))]))
        .await
        .unwrap();
    let result = service.post(doc.header.id, ACTOR).await;

    assert_matches!(result, Err(ServiceError::InsufficientStock(_)));
    let bolt_key = StockingKey::material(bolts, wh);
    assert_close(env.on_hand(&bolt_key).await, dec!(10));
    assert_eq!(env.ledger_len(&bolt_key).await, 1);
    assert_eq!(service.get(doc.header.id).await.unwrap().header.status, DocumentStatus::Draft);
}

#[tokio::test]
async fn consuming_a_key_that_never_moved_is_insufficient_stock() {
    let env = TestDb::new().await;
    let wh = env.warehouse("WH-A").await;
    let bolts = env.material("BOLT").await;

    let service = env.factory.material_issue_service();
    let doc = service.create(issue(wh, vec![issue_line(bolts, dec!(1))])).await.unwrap();
    assert_matches!(
        service.post(doc.header.id, ACTOR).await,
        Err(ServiceError::InsufficientStock(_))
    );
}

#[tokio::test]
async fn issue_keeps_cost_and_records_negative_entry() {
    let env = TestDb::new().await;
    let wh = env.warehouse("WH-A").await;
    let bolts = env.material("BOLT").await;
    adjust(&env, wh, vec![adjustment_line(ItemType::Material, bolts, dec!(20), Some(dec!(2.5)))])
        .await
        .unwrap();

    let service = env.factory.material_issue_service();
    let doc = service.create(issue(wh, vec![issue_line(bolts, dec!(8))])).await.unwrap();
    let posted = service.post(doc.header.id, ACTOR).await.unwrap();
    assert_eq!(posted.header.status, DocumentStatus::Posted);

    let key = StockingKey::material(bolts, wh);
    let entries = StockLedgerRepository::entries_for_key(&*env.db, &key).await.unwrap();
    let last = entries.last().unwrap();
    assert_eq!(last.transaction_type, TransactionType::Issue);
    assert_close(last.quantity, dec!(-8));
    assert_close(last.unit_cost, dec!(2.5));
    assert_close(last.balance_quantity, dec!(12));

    let balance = StockBalanceRepository::get(&*env.db, &key).await.unwrap();
    assert_close(balance.unit_cost, dec!(2.5));
    assert_close(balance.total_cost, dec!(30));
}

#[tokio::test]
async fn negative_adjustment_needs_stock_and_positive_defaults_cost() {
    let env = TestDb::new().await;
    let wh = env.warehouse("WH-A").await;
    let paint = env.material("PAINT").await;
    let key = StockingKey::material(paint, wh);

    let short = adjust(&env, wh, vec![adjustment_line(ItemType::Material, paint, dec!(-1), None)]).await;
    assert_matches!(short, Err(ServiceError::InsufficientStock(_)));

    adjust(&env, wh, vec![adjustment_line(ItemType::Material, paint, dec!(10), Some(dec!(4)))])
        .await
        .unwrap();
    adjust(&env, wh, vec![adjustment_line(ItemType::Material, paint, dec!(5), None)])
        .await
        .unwrap();
    adjust(&env, wh, vec![adjustment_line(ItemType::Material, paint, dec!(-3), None)])
        .await
        .unwrap();

    let balance = StockBalanceRepository::get(&*env.db, &key).await.unwrap();
    assert_close(balance.quantity, dec!(12));
    assert_close(balance.unit_cost, dec!(4));
}

#[tokio::test]
async fn zero_quantity_adjustment_line_is_invalid() {
    let env = TestDb::new().await;
    let wh = env.warehouse("WH-A").await;
    let paint = env.material("PAINT").await;

    let result = adjust(&env, wh, vec![adjustment_line(ItemType::Material, paint, Decimal::ZERO, None)]).await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

fn transfer_request(from: Uuid, to: Uuid, material_id: Uuid, quantity: Decimal) -> CreateStockTransfer {
    CreateStockTransfer {
        from_warehouse_id: from,
        to_warehouse_id: to,
        transfer_date: date(2024, 3, 5),
        created_by: ACTOR.into(),
        items: vec![StockTransferLine {
            item_type: ItemType::Material,
            item_id: material_id,
            from_location_id: None,
            to_location_id: None,
            batch_number: Some("B-7".into()),
            lot_number: None,
            quantity,
        }],
    }
}

#[tokio::test]
async fn transfer_moves_stock_and_cost_between_warehouses() {
    let env = TestDb::new().await;
    let wh_a = env.warehouse("WH-A").await;
    let wh_b = env.warehouse("WH-B").await;
    let copper = env.material("COPPER").await;

    let mut seed = adjustment_line(ItemType::Material, copper, dec!(100), Some(dec!(6)));
    seed.batch_number = Some("B-7".into());
    adjust(&env, wh_a, vec![seed]).await.unwrap();

    let service = env.factory.stock_transfer_service();
    let doc = service
        .create(transfer_request(wh_a, wh_b, copper, dec!(30)))
        .await
        .unwrap();
    service.post(doc.header.id, ACTOR).await.unwrap();

    let from = StockingKey::material(copper, wh_a).with_batch(Some("B-7"));
    let to = StockingKey::material(copper, wh_b).with_batch(Some("B-7"));
    assert_close(env.on_hand(&from).await, dec!(70));
    assert_close(env.on_hand(&to).await, dec!(30));

    let destination = StockBalanceRepository::get(&*env.db, &to).await.unwrap();
    assert_close(destination.unit_cost, dec!(6));

    let entries = StockLedgerRepository::entries_for_reference(
        &*env.db,
        ReferenceType::StockTransfer,
        doc.header.id,
    )
    .await
    .unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].transaction_type, TransactionType::TransferOut);
    assert_eq!(entries[1].transaction_type, TransactionType::TransferIn);
    assert_eq!(entries[0].transaction_number, entries[1].transaction_number);
}

#[tokio::test]
async fn failed_transfer_inbound_leaves_source_untouched() {
    let env = TestDb::new().await;
    let wh_a = env.warehouse("WH-A").await;
    let wh_b = env.warehouse("WH-B").await;
    let copper = env.material("COPPER").await;

    let mut seed = adjustment_line(ItemType::Material, copper, dec!(100), Some(dec!(6)));
    seed.batch_number = Some("B-7".into());
    adjust(&env, wh_a, vec![seed]).await.unwrap();

    let service = env.factory.stock_transfer_service();
    let doc = service
        .create(transfer_request(wh_a, wh_b, copper, dec!(30)))
        .await
        .unwrap();
    env.delete_warehouse(wh_b).await;

    let result = service.post(doc.header.id, ACTOR).await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));

    let from = StockingKey::material(copper, wh_a).with_batch(Some("B-7"));
    assert_close(env.on_hand(&from).await, dec!(100));
    assert_eq!(env.ledger_len(&from).await, 1);
    assert_eq!(service.get(doc.header.id).await.unwrap().header.status, DocumentStatus::Draft);
}

#[tokio::test]
async fn transfer_to_the_same_place_is_invalid() {
    let env = TestDb::new().await;
    let wh = env.warehouse("WH-A").await;
    let copper = env.material("COPPER").await;

    let result = env
        .factory
        .stock_transfer_service()
        .create(transfer_request(wh, wh, copper, dec!(1)))
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn transfer_between_bins_of_one_warehouse() {
    let env = TestDb::new().await;
    let wh = env.warehouse("WH-A").await;
    let bin_1 = env.location(wh, "BIN-1").await;
    let bin_2 = env.location(wh, "BIN-2").await;
    let copper = env.material("COPPER").await;

    let mut seed = adjustment_line(ItemType::Material, copper, dec!(12), Some(dec!(1)));
    seed.warehouse_location_id = Some(bin_1);
    adjust(&env, wh, vec![seed]).await.unwrap();

    let service = env.factory.stock_transfer_service();
    let mut request = transfer_request(wh, wh, copper, dec!(12));
    request.items[0].batch_number = None;
    request.items[0].from_location_id = Some(bin_1);
    request.items[0].to_location_id = Some(bin_2);
    let doc = service.create(request).await.unwrap();
    service.post(doc.header.id, ACTOR).await.unwrap();

    let from = StockingKey::material(copper, wh).with_location(Some(bin_1));
    let to = StockingKey::material(copper, wh).with_location(Some(bin_2));
    assert_close(env.on_hand(&from).await, Decimal::ZERO);
    assert_close(env.on_hand(&to).await, dec!(12));
}

#[tokio::test]
async fn delivery_order_ships_finished_goods() {
    let env = TestDb::new().await;
    let wh = env.warehouse("WH-FG").await;
    let chair = env.finished_product("CHAIR").await;
    adjust(&env, wh, vec![adjustment_line(ItemType::FinishedProduct, chair, dec!(8), Some(dec!(45)))])
        .await
        .unwrap();

    let service = env.factory.delivery_order_service();
    let doc = service
        .create(CreateDeliveryOrder {
            warehouse_id: wh,
            sales_order_id: None,
            customer_reference: Some("CUST-9".into()),
            delivery_date: date(2024, 3, 9),
            created_by: ACTOR.into(),
            items: vec![DeliveryOrderLine {
                finished_product_id: chair,
                warehouse_location_id: None,
                batch_number: None,
                lot_number: None,
                quantity: dec!(3),
            }],
        })
        .await
        .unwrap();
    assert!(doc.header.delivery_number.starts_with("DO-202403-"));

    let shipped = service.ship(doc.header.id, ACTOR).await.unwrap();
    assert_eq!(shipped.header.status, DocumentStatus::Shipped);
    assert_eq!(shipped.header.shipped_by.as_deref(), Some(ACTOR));

    let key = StockingKey::finished_product(chair, wh);
    assert_close(env.on_hand(&key).await, dec!(5));
    let entries = StockLedgerRepository::entries_for_key(&*env.db, &key).await.unwrap();
    assert_eq!(entries.last().unwrap().transaction_type, TransactionType::Shipment);

    assert_matches!(
        service.ship(doc.header.id, ACTOR).await,
        Err(ServiceError::AlreadyPosted(_))
    );
}

#[tokio::test]
async fn ledger_replay_matches_balances() {
    let env = TestDb::new().await;
    let wh_a = env.warehouse("WH-A").await;
    let wh_b = env.warehouse("WH-B").await;
    let copper = env.material("COPPER").await;
    let tin = env.material("TIN").await;

    adjust(
        &env,
        wh_a,
        vec![
            adjustment_line(ItemType::Material, copper, dec!(50), Some(dec!(2))),
            adjustment_line(ItemType::Material, tin, dec!(40), Some(dec!(3))),
        ],
    )
    .await
    .unwrap();
    adjust(&env, wh_a, vec![adjustment_line(ItemType::Material, copper, dec!(-7), None)])
        .await
        .unwrap();

    let issues = env.factory.material_issue_service();
    let doc = issues.create(issue(wh_a, vec![issue_line(tin, dec!(15))])).await.unwrap();
    issues.post(doc.header.id, ACTOR).await.unwrap();

    let mut request = transfer_request(wh_a, wh_b, copper, dec!(20));
    request.items[0].batch_number = None;
    let transfers = env.factory.stock_transfer_service();
    let doc = transfers.create(request).await.unwrap();
    transfers.post(doc.header.id, ACTOR).await.unwrap();

    let report = VerifyLedgerQuery.execute(&env.db).await.unwrap();
    assert_eq!(report.keys_checked, 3);
    assert!(report.is_consistent(), "divergences: {:?}", report.divergences);

    for key in [
        StockingKey::material(copper, wh_a),
        StockingKey::material(copper, wh_b),
        StockingKey::material(tin, wh_a),
    ] {
        let replayed = StockLedgerRepository::replay_quantity(&*env.db, &key).await.unwrap();
        let level = StockLevelQuery { key: key.clone() }.execute(&env.db).await.unwrap();
        assert_close(level.quantity, replayed);
        assert_close(level.available_quantity, level.quantity - level.reserved_quantity);
    }

    let transfers_only = LedgerQuery {
        reference_type: Some(ReferenceType::StockTransfer),
        ..Default::default()
    }
    .execute(&env.db)
    .await
    .unwrap();
    assert_eq!(transfers_only.len(), 2);
}
