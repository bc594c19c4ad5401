//! Property-based tests for the stock engine's pure functions.
//!
//! These tests use proptest to verify invariants across a wide range of inputs,
//! helping to catch edge cases that unit tests might miss.

use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use warehouse_ledger::models::{DocumentKind, DocumentStatus, StockingKey};
use warehouse_ledger::services::costing::{weighted_average_cost, COST_SCALE};
use warehouse_ledger::services::document_sequence::format_document_number;

// Strategies for generating test data
fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000, 0u32..3).prop_map(|(units, scale)| Decimal::new(units, scale))
}

fn cost_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

/// Signed movements: positive receipts carry a cost, negative ones consume.
fn movement_strategy() -> impl Strategy<Value = Vec<(Decimal, Decimal)>> {
    prop::collection::vec(
        (-500i64..1_000, cost_strategy()).prop_map(|(q, c)| (Decimal::from(q), c)),
        1..60,
    )
}

fn document_kind_strategy() -> impl Strategy<Value = DocumentKind> {
    prop_oneof![
        Just(DocumentKind::GoodsReceiptNote),
        Just(DocumentKind::MaterialIssueNote),
        Just(DocumentKind::StockAdjustment),
        Just(DocumentKind::StockTransfer),
        Just(DocumentKind::DeliveryOrder),
    ]
}

// Property: weighted average stays between its inputs
proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn average_cost_is_bounded_by_inputs(
        q0 in quantity_strategy(),
        c0 in cost_strategy(),
        qin in quantity_strategy(),
        cin in cost_strategy(),
    ) {
        let cost = weighted_average_cost(q0, c0, qin, cin);
        let tolerance = Decimal::new(1, COST_SCALE);
        prop_assert!(cost >= c0.min(cin) - tolerance, "{} below {} / {}", cost, c0, cin);
        prop_assert!(cost <= c0.max(cin) + tolerance, "{} above {} / {}", cost, c0, cin);
        prop_assert!(cost.scale() <= COST_SCALE);
    }

    #[test]
    fn equal_costs_do_not_drift(q0 in quantity_strategy(), qin in quantity_strategy(), c in cost_strategy()) {
        prop_assert_eq!(weighted_average_cost(q0, c, qin, c), c);
    }

    #[test]
    fn first_receipt_takes_incoming_cost(qin in quantity_strategy(), cin in cost_strategy()) {
        prop_assert_eq!(weighted_average_cost(Decimal::ZERO, Decimal::ZERO, qin, cin), cin.round_dp(COST_SCALE));
    }
}

// Property: a running balance built the way postings build it equals the sum
// of accepted movements and never goes negative
proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn running_balance_equals_sum_of_accepted_movements(movements in movement_strategy()) {
        let mut on_hand = Decimal::ZERO;
        let mut cost = Decimal::ZERO;
        let mut accepted = Vec::new();

        for (quantity, unit_cost) in movements {
            if quantity > Decimal::ZERO {
                cost = weighted_average_cost(on_hand, cost, quantity, unit_cost);
                on_hand += quantity;
                accepted.push(quantity);
            } else if quantity < Decimal::ZERO && on_hand >= -quantity {
                on_hand += quantity;
                accepted.push(quantity);
            }
            prop_assert!(on_hand >= Decimal::ZERO);
            prop_assert!(cost >= Decimal::ZERO);
        }

        let replayed: Decimal = accepted.iter().copied().sum();
        prop_assert_eq!(on_hand, replayed);
    }
}

// Property: stocking key normalization
proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn blank_codes_normalize_to_absent(blank in "[ \t]{0,8}") {
        let key = StockingKey::material(Uuid::new_v4(), Uuid::new_v4())
            .with_batch(Some(blank.clone()))
            .with_lot(Some(blank));
        prop_assert_eq!(key.batch_column(), "");
        prop_assert_eq!(key.lot_column(), "");
        prop_assert_eq!(key.batch_number.as_deref(), None);
        prop_assert_eq!(key.lot_number.as_deref(), None);
    }

    #[test]
    fn codes_are_trimmed(code in "[A-Z0-9-]{1,20}", pad in "[ ]{0,3}") {
        let key = StockingKey::material(Uuid::new_v4(), Uuid::new_v4())
            .with_batch(Some(format!("{pad}{code}{pad}")));
        prop_assert_eq!(key.batch_number.as_deref(), Some(code.as_str()));
    }

    #[test]
    fn keys_round_trip_through_columns(code in "[A-Z0-9]{0,10}") {
        let key = StockingKey::finished_product(Uuid::new_v4(), Uuid::new_v4())
            .with_location(Some(Uuid::new_v4()))
            .with_lot(Some(code));
        let rebuilt = StockingKey::from_columns(
            key.item_type,
            key.item_id,
            key.warehouse_id,
            key.location_column(),
            &key.batch_column(),
            &key.lot_column(),
        );
        prop_assert_eq!(rebuilt, key);
    }
}

// Property: document numbers and lifecycle
proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn document_numbers_have_fixed_shape(
        kind in document_kind_strategy(),
        year in 2000i32..2100,
        month in 1u32..=12,
        value in 1i64..100_000,
    ) {
        let period = format!("{:04}{:02}", year, month);
        let number = format_document_number(kind, &period, value);
        let expected_prefix = format!("{}-{}-", kind.number_prefix(), period);
        prop_assert!(number.starts_with(&expected_prefix));
        prop_assert_eq!(number.len(), expected_prefix.len() + 5);
    }

    #[test]
    fn posted_documents_never_move(kind in document_kind_strategy()) {
        let posted = kind.posted_status();
        for to in [
            DocumentStatus::PendingQc,
            DocumentStatus::QcCompleted,
            DocumentStatus::Draft,
            DocumentStatus::Posted,
            DocumentStatus::Shipped,
            DocumentStatus::Cancelled,
        ] {
            prop_assert!(!kind.can_transition(posted, to));
        }
    }
}
