use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantPaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

/// Reservation status. `Waiting` is reserved for seat waitlists and is not
/// produced by the current join flow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Confirmed,
    Waiting,
    Cancelled,
}

/// One user's reservation against a trip's capacity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    pub id: String,
    pub trip_id: String,
    pub user_id: String,
    pub passenger_count: u32,
    pub total_amount: i64,
    pub advance_amount: i64,
    pub remaining_amount: i64,
    pub payment_status: ParticipantPaymentStatus,
    pub status: ReservationStatus,
    pub joined_at: DateTime<Utc>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Participant {
    pub fn new(
        trip_id: String,
        user_id: String,
        passenger_count: u32,
        total_amount: i64,
        advance_amount: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            trip_id,
            user_id,
            passenger_count,
            total_amount,
            advance_amount,
            remaining_amount: total_amount - advance_amount,
            payment_status: ParticipantPaymentStatus::Paid,
            status: ReservationStatus::Confirmed,
            joined_at: Utc::now(),
            cancelled_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status != ReservationStatus::Cancelled
    }

    /// Mark as cancelled (never delete)
    pub fn cancel(&mut self) {
        self.status = ReservationStatus::Cancelled;
        self.cancelled_at = Some(Utc::now());
    }

    /// Key that allows at most one active reservation per (trip, user)
    pub fn guard_key(trip_id: &str, user_id: &str) -> String {
        format!("{}:{}", trip_id, user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_amounts_and_cancel() {
        let mut p = Participant::new("t-1".into(), "u-2".into(), 2, 4000, 800);
        assert_eq!(p.remaining_amount, 3200);
        assert!(p.is_active());

        p.cancel();
        assert_eq!(p.status, ReservationStatus::Cancelled);
        assert!(p.cancelled_at.is_some());
        assert!(!p.is_active());
    }
}
