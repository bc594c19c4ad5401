//! Weighted-average costing.

use rust_decimal::Decimal;

/// Decimal places kept on a stored unit cost.
pub const COST_SCALE: u32 = 4;

/// Blends an inbound `(qty_in, cost_in)` into the on-hand `(qty_on_hand, cost_on_hand)`.
///
/// Returns `cost_on_hand` unchanged when the combined quantity is not
/// positive, since there is nothing to weigh against.
pub fn weighted_average_cost(
    qty_on_hand: Decimal,
    cost_on_hand: Decimal,
    qty_in: Decimal,
    cost_in: Decimal,
) -> Decimal {
    let combined = qty_on_hand + qty_in;
    if combined <= Decimal::ZERO {
        return cost_on_hand;
    }
    ((qty_on_hand * cost_on_hand + qty_in * cost_in) / combined).round_dp(COST_SCALE)
}

/// Cost carried by a positive adjustment: the caller's figure if given,
/// otherwise the current weighted cost.
pub fn adjustment_cost(current_cost: Decimal, supplied: Option<Decimal>) -> Decimal {
    supplied.unwrap_or(current_cost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn blends_two_receipts() {
        let cost = weighted_average_cost(dec!(100), dec!(10), dec!(50), dec!(20));
        assert_eq!(cost, dec!(13.3333));
    }

    #[test]
    fn first_receipt_takes_incoming_cost() {
        assert_eq!(
            weighted_average_cost(Decimal::ZERO, Decimal::ZERO, dec!(5), dec!(7.25)),
            dec!(7.25)
        );
    }

    #[test]
    fn zero_combined_quantity_keeps_cost() {
        assert_eq!(
            weighted_average_cost(Decimal::ZERO, dec!(4), Decimal::ZERO, dec!(9)),
            dec!(4)
        );
    }

    #[test]
    fn same_cost_receipt_is_stable() {
        assert_eq!(
            weighted_average_cost(dec!(30), dec!(12.5), dec!(70), dec!(12.5)),
            dec!(12.5)
        );
    }

    #[test]
    fn adjustment_falls_back_to_current_cost() {
        assert_eq!(adjustment_cost(dec!(3), None), dec!(3));
        assert_eq!(adjustment_cost(dec!(3), Some(dec!(4))), dec!(4));
    }
}
