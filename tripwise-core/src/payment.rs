use serde::{Deserialize, Serialize};
use tripwise_shared::Trip;
use crate::{CoreError, CoreResult};

/// Amounts shown to a joining user. `advance_amount + final_amount` always
/// equals `total_amount`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentBreakdown {
    pub price_per_person: i64,
    pub passengers: u32,
    pub total_amount: i64,
    pub advance_percentage: u32,
    pub advance_amount: i64,
    pub final_amount: i64,
}

/// Round-half-up of `numerator / denominator` for non-negative operands
fn div_round_half_up(numerator: i128, denominator: i128) -> i128 {
    (2 * numerator + denominator) / (2 * denominator)
}

fn to_amount(value: i128) -> CoreResult<i64> {
    i64::try_from(value)
        .map_err(|_| CoreError::ValidationError(format!("amount {} out of range", value)))
}

/// Explicit price if set, otherwise budget split evenly over capacity
pub fn price_per_person(trip: &Trip) -> CoreResult<i64> {
    if let Some(price) = trip.price_per_person {
        if price < 0 {
            return Err(CoreError::ValidationError("price_per_person is negative".to_string()));
        }
        return Ok(price);
    }
    if trip.max_participants == 0 {
        return Err(CoreError::ValidationError(
            "cannot price a trip with zero capacity".to_string(),
        ));
    }
    if trip.budget < 0 {
        return Err(CoreError::ValidationError("budget is negative".to_string()));
    }
    to_amount(div_round_half_up(trip.budget as i128, trip.max_participants as i128))
}

pub fn total_amount(price_per_person: i64, passengers: u32) -> CoreResult<i64> {
    price_per_person
        .checked_mul(passengers as i64)
        .ok_or_else(|| CoreError::ValidationError("total amount overflows".to_string()))
}

/// The only rounding step in the calculation
pub fn advance_amount(total_amount: i64, advance_percentage: u32) -> CoreResult<i64> {
    if advance_percentage > 100 {
        return Err(CoreError::ValidationError(format!(
            "advance percentage {} exceeds 100",
            advance_percentage
        )));
    }
    if total_amount < 0 {
        return Err(CoreError::ValidationError("total amount is negative".to_string()));
    }
    to_amount(div_round_half_up(
        total_amount as i128 * advance_percentage as i128,
        100,
    ))
}

pub fn breakdown(trip: &Trip, passengers: u32) -> CoreResult<PaymentBreakdown> {
    let price = price_per_person(trip)?;
    let total = total_amount(price, passengers)?;
    let advance = advance_amount(total, trip.advance_payment_percentage)?;
    Ok(PaymentBreakdown {
        price_per_person: price,
        passengers,
        total_amount: total,
        advance_percentage: trip.advance_payment_percentage,
        advance_amount: advance,
        final_amount: total - advance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::tests::sample_trip;

    #[test]
    fn test_budget_split_scenario() {
        let trip = sample_trip(10);
        let b = breakdown(&trip, 2).unwrap();
        assert_eq!(b.price_per_person, 2000);
        assert_eq!(b.total_amount, 4000);
        assert_eq!(b.advance_percentage, 20);
        assert_eq!(b.advance_amount, 800);
        assert_eq!(b.final_amount, 3200);
    }

    #[test]
    fn test_explicit_price_wins() {
        let mut trip = sample_trip(10);
        trip.price_per_person = Some(1250);
        assert_eq!(price_per_person(&trip).unwrap(), 1250);
    }

    #[test]
    fn test_rounding_half_up() {
        let mut trip = sample_trip(3);
        trip.budget = 1000; // 333.33
        assert_eq!(price_per_person(&trip).unwrap(), 333);
        trip.budget = 1001; // 333.67
        assert_eq!(price_per_person(&trip).unwrap(), 334);
        trip.max_participants = 2;
        trip.budget = 5; // 2.5
        assert_eq!(price_per_person(&trip).unwrap(), 3);

        assert_eq!(advance_amount(100, 12).unwrap(), 12);
        // 12.5 -> 13
        assert_eq!(advance_amount(125, 10).unwrap(), 13);
        // 12.49 -> 12
        assert_eq!(advance_amount(1249, 1).unwrap(), 12);
    }

    #[test]
    fn test_parts_always_sum_to_total() {
        let mut trip = sample_trip(7);
        for budget in [0_i64, 1, 99, 1001, 33333, 123457] {
            for pct in [0_u32, 1, 15, 20, 33, 50, 99, 100] {
                trip.budget = budget;
                trip.advance_payment_percentage = pct;
                let b = breakdown(&trip, 3).unwrap();
                assert_eq!(b.advance_amount + b.final_amount, b.total_amount);
                assert!(b.advance_amount <= b.total_amount);
            }
        }
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut trip = sample_trip(10);
        trip.max_participants = 0;
        assert_eq!(price_per_person(&trip).unwrap_err().kind(), "validation_failed");
    }

    #[test]
    fn test_percentage_above_hundred_rejected() {
        assert!(advance_amount(1000, 101).is_err());
    }
}
