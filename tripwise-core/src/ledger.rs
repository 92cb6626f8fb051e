use chrono::NaiveDate;
use tripwise_shared::{Trip, TripStatus};
use crate::{status, CoreError, CoreResult};

/// All seat-counter arithmetic lives here so the
/// `available_seats + current_participants == max_participants` invariant is
/// enforced in exactly one place.
pub struct SeatLedger;

impl SeatLedger {
    /// Decide whether `user_id` may join with `requested` passengers.
    /// Rules are checked in order: trip phase, existing reservation,
    /// ownership, then capacity.
    pub fn check_join_eligibility(
        trip: &Trip,
        user_id: &str,
        has_active_reservation: bool,
        requested: u32,
        today: NaiveDate,
    ) -> CoreResult<()> {
        if status::effective_status(trip, today) != TripStatus::Planned {
            return Err(CoreError::NotJoinable);
        }
        if has_active_reservation || trip.has_member(user_id) {
            return Err(CoreError::AlreadyJoined);
        }
        if trip.owner_id == user_id {
            return Err(CoreError::IsCreator);
        }
        Self::check_capacity(trip, requested)
    }

    /// `requested` must be within `1..=available_seats`
    pub fn check_capacity(trip: &Trip, requested: u32) -> CoreResult<()> {
        if requested == 0 || requested > trip.available_seats {
            return Err(CoreError::InsufficientSeats {
                requested,
                available: trip.available_seats,
            });
        }
        Ok(())
    }

    pub fn check_invariants(trip: &Trip) -> CoreResult<()> {
        let accounted = trip.available_seats as u64 + trip.current_participants as u64;
        if accounted != trip.max_participants as u64 {
            return Err(CoreError::CorruptRecord(format!(
                "trip {} seat counters out of balance: {} available + {} joined != {} max",
                trip.id, trip.available_seats, trip.current_participants, trip.max_participants
            )));
        }
        Ok(())
    }

    /// Reserve `passengers` seats for `user_id`, held by `participant_id`.
    /// Re-checks capacity, so a caller holding a stale copy can never drive
    /// the counters negative.
    pub fn apply_join_delta(
        trip: &Trip,
        user_id: &str,
        participant_id: &str,
        passengers: u32,
    ) -> CoreResult<Trip> {
        Self::check_invariants(trip)?;
        Self::check_capacity(trip, passengers)?;

        let mut updated = trip.clone();
        updated.available_seats -= passengers;
        updated.current_participants += passengers;
        updated
            .joined_users
            .insert(user_id.to_string(), participant_id.to_string());
        updated.touch();
        Ok(updated)
    }

    /// Release the `passengers` seats `participant_id` holds for `user_id`.
    /// `None` if that participant holds no seats on the trip, e.g. because
    /// they were already released or a later reservation holds them now.
    /// `current_participants` is floored at zero and `available_seats`
    /// recomputed from it.
    pub fn apply_cancel_delta(
        trip: &Trip,
        user_id: &str,
        participant_id: &str,
        passengers: u32,
    ) -> Option<Trip> {
        if trip.seat_holder(user_id) != Some(participant_id) {
            return None;
        }

        let mut updated = trip.clone();
        updated.current_participants = trip
            .current_participants
            .saturating_sub(passengers)
            .min(trip.max_participants);
        updated.available_seats = trip.max_participants - updated.current_participants;
        updated.joined_users.remove(user_id);
        updated.touch();
        Some(updated)
    }

    /// Change capacity without disturbing existing reservations
    pub fn resize_capacity(trip: &Trip, max_participants: u32) -> CoreResult<Trip> {
        if max_participants == 0 {
            return Err(CoreError::ValidationError(
                "max_participants must be at least 1".to_string(),
            ));
        }
        if max_participants < trip.current_participants {
            return Err(CoreError::ValidationError(format!(
                "max_participants {} is below the {} seats already taken",
                max_participants, trip.current_participants
            )));
        }

        let mut updated = trip.clone();
        updated.max_participants = max_participants;
        updated.available_seats = max_participants - trip.current_participants;
        Ok(updated)
    }
}
