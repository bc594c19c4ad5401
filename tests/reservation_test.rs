mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use common::{assert_close, date, TestDb, ACTOR};
use warehouse_ledger::{
    events::Event,
    models::{ItemType, ReferenceType, ReservationStatus, StockingKey},
    services::{
        delivery_order::{CreateDeliveryOrder, DeliveryOrderLine},
        material_issue::{CreateMaterialIssueNote, MaterialIssueLine},
        reservations::ReservationRequest,
        stock_adjustment::{CreateStockAdjustment, StockAdjustmentLine},
        stock_query::{Query, VerifyLedgerQuery},
    },
    ServiceError,
};

async fn stock(env: &TestDb, key: &StockingKey, quantity: Decimal) {
    let service = env.factory.stock_adjustment_service();
    let doc = service
        .create(CreateStockAdjustment {
            warehouse_id: key.warehouse_id,
            adjustment_date: date(2024, 4, 1),
            reason: "opening stock".into(),
            created_by: ACTOR.into(),
            items: vec![StockAdjustmentLine {
                item_type: key.item_type,
                item_id: key.item_id,
                warehouse_location_id: key.warehouse_location_id,
                batch_number: key.batch_number.clone(),
                lot_number: key.lot_number.clone(),
                expiry_date: None,
                quantity,
                unit_cost: Some(dec!(1)),
            }],
        })
        .await
        .expect("create adjustment");
    service.post(doc.header.id, ACTOR).await.expect("post adjustment");
}

fn request(key: &StockingKey, quantity: Decimal, reference_type: ReferenceType, reference_id: Uuid) -> ReservationRequest {
    ReservationRequest {
        key: key.clone(),
        quantity,
        reference_type,
        reference_id,
        expires_at: None,
        actor: ACTOR.into(),
    }
}

async fn material_key(env: &TestDb) -> StockingKey {
    let wh = env.warehouse("WH-A").await;
    let glue = env.material("GLUE").await;
    StockingKey::material(glue, wh)
}

#[tokio::test]
async fn reservation_reduces_available_quantity() {
    let mut env = TestDb::new().await;
    let key = material_key(&env).await;
    stock(&env, &key, dec!(100)).await;
    let service = env.factory.reservation_service();

    let reservation = service
        .create(request(&key, dec!(60), ReferenceType::SalesOrder, Uuid::new_v4()))
        .await
        .unwrap();
    assert_eq!(reservation.status, ReservationStatus::Active);
    assert_close(env.reserved(&key).await, dec!(60));

    let over = service
        .create(request(&key, dec!(41), ReferenceType::SalesOrder, Uuid::new_v4()))
        .await;
    assert_matches!(over, Err(ServiceError::InsufficientAvailable(_)));
    assert_close(env.reserved(&key).await, dec!(60));

    assert!(env
        .drain_events()
        .iter()
        .any(|e| matches!(e, Event::ReservationCreated { reservation_id, .. } if *reservation_id == reservation.id)));
}

#[tokio::test]
async fn reserving_a_key_without_stock_fails() {
    let env = TestDb::new().await;
    let key = material_key(&env).await;

    let result = env
        .factory
        .reservation_service()
        .create(request(&key, dec!(1), ReferenceType::MaterialRequest, Uuid::new_v4()))
        .await;
    assert_matches!(result, Err(ServiceError::InsufficientAvailable(_)));
}

#[tokio::test]
async fn cancelling_twice_restores_once() {
    let env = TestDb::new().await;
    let key = material_key(&env).await;
    stock(&env, &key, dec!(100)).await;
    let service = env.factory.reservation_service();

    let reservation = service
        .create(request(&key, dec!(50), ReferenceType::SalesOrder, Uuid::new_v4()))
        .await
        .unwrap();

    let first = service.cancel(reservation.id).await.unwrap();
    assert_eq!(first.status, ReservationStatus::Cancelled);
    assert_close(env.reserved(&key).await, Decimal::ZERO);

    let second = service.cancel(reservation.id).await.unwrap();
    assert_eq!(second.status, ReservationStatus::Cancelled);
    assert_close(env.reserved(&key).await, Decimal::ZERO);
}

#[tokio::test]
async fn partial_fulfilment_keeps_reservation_active() {
    let env = TestDb::new().await;
    let key = material_key(&env).await;
    stock(&env, &key, dec!(100)).await;
    let service = env.factory.reservation_service();

    let reservation = service
        .create(request(&key, dec!(30), ReferenceType::SalesOrder, Uuid::new_v4()))
        .await
        .unwrap();

    let partial = service.fulfill(reservation.id, dec!(10)).await.unwrap();
    assert_eq!(partial.status, ReservationStatus::Active);
    assert_close(partial.fulfilled_quantity, dec!(10));
    assert_close(env.reserved(&key).await, dec!(20));

    let done = service.fulfill(reservation.id, dec!(25)).await.unwrap();
    assert_eq!(done.status, ReservationStatus::Fulfilled);
    assert_close(done.fulfilled_quantity, dec!(30));
    assert_close(env.reserved(&key).await, Decimal::ZERO);

    assert_matches!(
        service.cancel(reservation.id).await,
        Err(ServiceError::InvalidStateTransition(_))
    );
    assert_matches!(
        service.fulfill(reservation.id, dec!(1)).await,
        Err(ServiceError::InvalidStateTransition(_))
    );
}

#[tokio::test]
async fn closing_by_reference_releases_every_active_hold() {
    let mut env = TestDb::new().await;
    let wh = env.warehouse("WH-A").await;
    let glue = env.material("GLUE").await;
    let tape = env.material("TAPE").await;
    let glue_key = StockingKey::material(glue, wh);
    let tape_key = StockingKey::material(tape, wh);
    stock(&env, &glue_key, dec!(10)).await;
    stock(&env, &tape_key, dec!(10)).await;

    let service = env.factory.reservation_service();
    let order = Uuid::new_v4();
    service.create(request(&glue_key, dec!(4), ReferenceType::SalesOrder, order)).await.unwrap();
    service.create(request(&tape_key, dec!(6), ReferenceType::SalesOrder, order)).await.unwrap();
    let other = service
        .create(request(&glue_key, dec!(1), ReferenceType::SalesOrder, Uuid::new_v4()))
        .await
        .unwrap();

    let closed = service
        .close_by_reference(ReferenceType::SalesOrder, order, ReservationStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(closed.count(), 2);
    assert_close(closed.released_quantity, dec!(10));
    assert_close(env.reserved(&glue_key).await, dec!(1));
    assert_close(env.reserved(&tape_key).await, Decimal::ZERO);
    assert_eq!(service.get(other.id).await.unwrap().status, ReservationStatus::Active);

    let again = service
        .close_by_reference(ReferenceType::SalesOrder, order, ReservationStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(again.count(), 0);

    assert!(env
        .drain_events()
        .iter()
        .any(|e| matches!(e, Event::ReservationsClosed { count: 2, .. })));

    let invalid = service
        .close_by_reference(ReferenceType::SalesOrder, order, ReservationStatus::Fulfilled)
        .await;
    assert_matches!(invalid, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn due_reservations_expire() {
    let env = TestDb::new().await;
    let key = material_key(&env).await;
    stock(&env, &key, dec!(20)).await;
    let service = env.factory.reservation_service();

    let mut short_lived = request(&key, dec!(5), ReferenceType::MaterialRequest, Uuid::new_v4());
    short_lived.expires_at = Some(Utc::now() - Duration::minutes(1));
    let expired = service.create(short_lived).await.unwrap();

    let mut long_lived = request(&key, dec!(3), ReferenceType::MaterialRequest, Uuid::new_v4());
    long_lived.expires_at = Some(Utc::now() + Duration::days(1));
    let kept = service.create(long_lived).await.unwrap();

    let closed = service.expire_due(Utc::now()).await.unwrap();
    assert_eq!(closed.reservation_ids, vec![expired.id]);
    assert_close(env.reserved(&key).await, dec!(3));
    assert_eq!(service.get(expired.id).await.unwrap().status, ReservationStatus::Expired);
    assert_eq!(service.get(kept.id).await.unwrap().status, ReservationStatus::Active);

    assert_matches!(
        service.cancel(expired.id).await,
        Err(ServiceError::InvalidStateTransition(_))
    );
}

#[tokio::test]
async fn material_issue_fulfils_its_requests_reservations() {
    let env = TestDb::new().await;
    let wh = env.warehouse("WH-A").await;
    let glue = env.material("GLUE").await;
    let key = StockingKey::material(glue, wh);
    stock(&env, &key, dec!(50)).await;

    let material_request = Uuid::new_v4();
    let reservation = env
        .factory
        .reservation_service()
        .create(request(&key, dec!(20), ReferenceType::MaterialRequest, material_request))
        .await
        .unwrap();

    let issues = env.factory.material_issue_service();
    let doc = issues
        .create(CreateMaterialIssueNote {
            warehouse_id: wh,
            material_request_id: Some(material_request),
            department: None,
            issue_date: date(2024, 4, 2),
            created_by: ACTOR.into(),
            items: vec![MaterialIssueLine {
                material_id: glue,
                warehouse_location_id: None,
                batch_number: None,
                lot_number: None,
                quantity: dec!(15),
            }],
        })
        .await
        .unwrap();
    issues.post(doc.header.id, ACTOR).await.unwrap();

    assert_close(env.on_hand(&key).await, dec!(35));
    assert_close(env.reserved(&key).await, dec!(5));
    let reloaded = env.factory.reservation_service().get(reservation.id).await.unwrap();
    assert_eq!(reloaded.status, ReservationStatus::Active);
    assert_close(reloaded.fulfilled_quantity, dec!(15));

    let report = VerifyLedgerQuery.execute(&env.db).await.unwrap();
    assert!(report.is_consistent(), "divergences: {:?}", report.divergences);
}

#[tokio::test]
async fn shipment_can_push_available_below_zero_and_warns() {
    let mut env = TestDb::new().await;
    let wh = env.warehouse("WH-FG").await;
    let desk = env.finished_product("DESK").await;
    let key = StockingKey::finished_product(desk, wh);
    stock(&env, &key, dec!(10)).await;

    env.factory
        .reservation_service()
        .create(request(&key, dec!(8), ReferenceType::SalesOrder, Uuid::new_v4()))
        .await
        .unwrap();
    env.drain_events();

    let deliveries = env.factory.delivery_order_service();
    let doc = deliveries
        .create(CreateDeliveryOrder {
            warehouse_id: wh,
            sales_order_id: None,
            customer_reference: None,
            delivery_date: date(2024, 4, 3),
            created_by: ACTOR.into(),
            items: vec![DeliveryOrderLine {
                finished_product_id: desk,
                warehouse_location_id: None,
                batch_number: None,
                lot_number: None,
                quantity: dec!(6),
            }],
        })
        .await
        .unwrap();
    deliveries.ship(doc.header.id, ACTOR).await.unwrap();

    assert_close(env.on_hand(&key).await, dec!(4));
    assert_close(env.reserved(&key).await, dec!(8));
    assert!(env.drain_events().iter().any(|e| matches!(
        e,
        Event::StockBelowZeroAvailable { stocking_key, .. } if stocking_key.item_type == ItemType::FinishedProduct
    )));
}
