use serde::{Deserialize, Serialize};
use tripwise_core::PaymentBreakdown;
use tripwise_shared::{Participant, Payment, Trip, TripStatus};

/// Proof of the external payment-confirmation step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub method: String,
    pub transaction_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub trip_id: String,
    pub user_id: String,
    pub passengers: u32,
    pub payment: PaymentConfirmation,
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinReceipt {
    pub participant: Participant,
    pub trip: Trip,
    pub payment: Payment,
    pub breakdown: PaymentBreakdown,
}

/// Seat released; the payment record is left as it was
#[derive(Debug, Clone, Serialize)]
pub struct CancelReceipt {
    pub participant: Participant,
    /// `None` when the trip itself was deleted
    pub trip: Option<Trip>,
}

/// Counters next to what the participant records add up to
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SeatSummary {
    pub trip_id: String,
    pub status: TripStatus,
    pub max_participants: u32,
    pub current_participants: u32,
    pub available_seats: u32,
    pub active_reservations: usize,
    pub reserved_passengers: u32,
}

impl SeatSummary {
    pub fn is_consistent(&self) -> bool {
        self.reserved_passengers == self.current_participants
            && self.available_seats + self.current_participants == self.max_participants
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(current: u32, available: u32, reserved: u32) -> SeatSummary {
        SeatSummary {
            trip_id: "trip-1".to_string(),
            status: TripStatus::Planned,
            max_participants: 10,
            current_participants: current,
            available_seats: available,
            active_reservations: 1,
            reserved_passengers: reserved,
        }
    }

    #[test]
    fn test_summary_consistency() {
        assert!(summary(2, 8, 2).is_consistent());
        // counters balance but a reservation is missing its seats
        assert!(!summary(2, 8, 3).is_consistent());
        assert!(!summary(2, 7, 2).is_consistent());
    }
}
