use tripwise_core::CoreResult;
use tripwise_shared::{Collection, Participant, Payment};
use tripwise_store::Filter;
use crate::coordinator::ParticipationCoordinator;
use crate::models::SeatSummary;

// Read-only views for the admin and booking-history screens
impl ParticipationCoordinator {
    /// All reservations on a trip, cancelled ones included, oldest first
    pub async fn participants(&self, trip_id: &str) -> CoreResult<Vec<Participant>> {
        let filter = Filter::all().eq("trip_id", trip_id);
        let mut found: Vec<Participant> =
            self.gateway().list_as(Collection::Participants, &filter).await?;
        found.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        Ok(found)
    }

    pub async fn bookings_for(&self, user_id: &str) -> CoreResult<Vec<Participant>> {
        let filter = Filter::all().eq("user_id", user_id);
        let mut found: Vec<Participant> =
            self.gateway().list_as(Collection::Participants, &filter).await?;
        found.sort_by(|a, b| b.joined_at.cmp(&a.joined_at));
        Ok(found)
    }

    pub async fn payments_for(&self, trip_id: &str) -> CoreResult<Vec<Payment>> {
        let filter = Filter::all().eq("trip_id", trip_id);
        let mut found: Vec<Payment> = self.gateway().list_as(Collection::Payments, &filter).await?;
        found.sort_by(|a, b| a.paid_at.cmp(&b.paid_at));
        Ok(found)
    }

    pub async fn seat_summary(&self, trip_id: &str) -> CoreResult<SeatSummary> {
        let trip = self.catalog().get_trip(trip_id).await?;
        let active: Vec<Participant> = self
            .participants(trip_id)
            .await?
            .into_iter()
            .filter(|p| p.is_active())
            .collect();

        Ok(SeatSummary {
            trip_id: trip.id,
            status: trip.status,
            max_participants: trip.max_participants,
            current_participants: trip.current_participants,
            available_seats: trip.available_seats,
            active_reservations: active.len(),
            reserved_passengers: active.iter().map(|p| p.passenger_count).sum(),
        })
    }
}
