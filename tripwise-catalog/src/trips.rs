use chrono::Utc;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info};
use uuid::Uuid;
use tripwise_core::{status, CoreError, CoreResult, SeatLedger};
use tripwise_shared::{Collection, NewTrip, Trip, TripPatch, TripStatus, DEFAULT_ADVANCE_PERCENTAGE};
use tripwise_store::{CasOutcome, Filter, PersistenceGateway};
use crate::today;

/// Listing filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TripQuery {
    pub owner_id: Option<String>,
    #[serde(default)]
    pub public_only: bool,
    pub status: Option<TripStatus>,
    /// Case-insensitive substring match
    pub destination: Option<String>,
}

impl TripQuery {
    fn matches(&self, trip: &Trip) -> bool {
        if self.public_only && !trip.is_public {
            return false;
        }
        if let Some(status) = self.status {
            if trip.status != status {
                return false;
            }
        }
        if let Some(dest) = &self.destination {
            if !trip.destination.to_lowercase().contains(&dest.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

fn invalid(msg: impl Into<String>) -> CoreError {
    CoreError::ValidationError(msg.into())
}

/// Reject trips the status resolver and payment calculator cannot handle
fn validate(trip: &Trip) -> CoreResult<()> {
    if trip.title.trim().is_empty() {
        return Err(invalid("title is required"));
    }
    if trip.destination.trim().is_empty() {
        return Err(invalid("destination is required"));
    }
    if trip.end_date < trip.start_date {
        return Err(invalid("end_date is before start_date"));
    }
    if trip.max_participants == 0 {
        return Err(invalid("max_participants must be at least 1"));
    }
    if trip.budget < 0 {
        return Err(invalid("budget must not be negative"));
    }
    if matches!(trip.price_per_person, Some(p) if p < 0) {
        return Err(invalid("price_per_person must not be negative"));
    }
    if trip.advance_payment_percentage > 100 {
        return Err(invalid("advance_payment_percentage must be within 0..=100"));
    }
    Ok(())
}

/// Trip records as the planner, listing and admin flows see them. Every
/// trip handed out has its status resolved against today's date.
#[derive(Clone)]
pub struct TripCatalog {
    gateway: PersistenceGateway,
    default_advance_percentage: u32,
}

impl TripCatalog {
    pub fn new(gateway: PersistenceGateway) -> Self {
        Self {
            gateway,
            default_advance_percentage: DEFAULT_ADVANCE_PERCENTAGE,
        }
    }

    pub fn with_default_advance_percentage(mut self, percentage: u32) -> Self {
        self.default_advance_percentage = percentage;
        self
    }

    pub fn gateway(&self) -> &PersistenceGateway {
        &self.gateway
    }

    pub async fn create_trip(&self, input: NewTrip) -> CoreResult<Trip> {
        let now = Utc::now();
        let mut trip = Trip {
            id: Uuid::new_v4().to_string(),
            owner_id: input.owner_id,
            title: input.title,
            destination: input.destination,
            description: input.description,
            category: input.category,
            start_date: input.start_date,
            end_date: input.end_date,
            max_participants: input.max_participants,
            budget: input.budget,
            price_per_person: input.price_per_person,
            advance_payment_percentage: input
                .advance_payment_percentage
                .unwrap_or(self.default_advance_percentage),
            current_participants: 0,
            available_seats: input.max_participants,
            joined_users: BTreeMap::new(),
            status: TripStatus::Planned,
            is_public: input.is_public,
            highlights: input.highlights,
            tags: input.tags,
            revision: 0,
            created_at: now,
            updated_at: now,
        };
        if trip.owner_id.trim().is_empty() {
            return Err(invalid("owner_id is required"));
        }
        validate(&trip)?;
        status::refresh(&mut trip, today());

        self.gateway
            .insert(Collection::Trips, PersistenceGateway::to_record(&trip)?)
            .await?;
        info!("Trip {} created by {} with {} seats", trip.id, trip.owner_id, trip.max_participants);
        Ok(trip)
    }

    /// Stored trip without status resolution. Only for read-modify-write loops.
    pub async fn load_raw(&self, trip_id: &str) -> CoreResult<Trip> {
        self.gateway
            .get_as::<Trip>(Collection::Trips, trip_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("trip {}", trip_id)))
    }

    pub async fn get_trip(&self, trip_id: &str) -> CoreResult<Trip> {
        let trip = self.load_raw(trip_id).await?;
        Ok(self.present(trip).await)
    }

    pub async fn list_trips(&self, query: &TripQuery) -> CoreResult<Vec<Trip>> {
        let mut filter = Filter::all();
        if let Some(owner) = &query.owner_id {
            filter = filter.eq("owner_id", owner.as_str());
        }
        let stored: Vec<Trip> = self.gateway.list_as(Collection::Trips, &filter).await?;

        let mut trips = Vec::with_capacity(stored.len());
        for trip in stored {
            let trip = self.present(trip).await;
            if query.matches(&trip) {
                trips.push(trip);
            }
        }
        trips.sort_by(|a, b| a.start_date.cmp(&b.start_date).then_with(|| a.id.cmp(&b.id)));
        Ok(trips)
    }

    /// Conditional write keyed on the revision `updated` was derived from
    pub async fn store_trip(
        &self,
        expected_revision: u64,
        updated: &Trip,
    ) -> CoreResult<CasOutcome> {
        let record = PersistenceGateway::to_record(updated)?;
        Ok(self
            .gateway
            .compare_and_swap(Collection::Trips, &updated.id, expected_revision, &record)
            .await?)
    }

    /// Owner edit. Capacity changes go through the seat ledger so existing
    /// reservations are never dropped.
    pub async fn update_trip(
        &self,
        trip_id: &str,
        editor_id: &str,
        patch: TripPatch,
    ) -> CoreResult<Trip> {
        self.modify(trip_id, editor_id, |trip| {
            let mut updated = match patch.max_participants {
                Some(max) => SeatLedger::resize_capacity(trip, max)?,
                None => trip.clone(),
            };
            if let Some(v) = &patch.title {
                updated.title = v.clone();
            }
            if let Some(v) = &patch.destination {
                updated.destination = v.clone();
            }
            if let Some(v) = &patch.description {
                updated.description = Some(v.clone());
            }
            if let Some(v) = &patch.category {
                updated.category = Some(v.clone());
            }
            if let Some(v) = patch.start_date {
                updated.start_date = v;
            }
            if let Some(v) = patch.end_date {
                updated.end_date = v;
            }
            if let Some(v) = patch.budget {
                updated.budget = v;
            }
            if let Some(v) = patch.price_per_person {
                updated.price_per_person = Some(v);
            }
            if let Some(v) = patch.advance_payment_percentage {
                updated.advance_payment_percentage = v;
            }
            if let Some(v) = patch.is_public {
                updated.is_public = v;
            }
            if let Some(v) = &patch.highlights {
                updated.highlights = v.clone();
            }
            if let Some(v) = &patch.tags {
                updated.tags = v.clone();
            }
            validate(&updated)?;
            status::refresh(&mut updated, today());
            Ok(updated)
        })
        .await
    }

    /// Manual cancellation; sticks regardless of dates
    pub async fn cancel_trip(&self, trip_id: &str, editor_id: &str) -> CoreResult<Trip> {
        let trip = self
            .modify(trip_id, editor_id, |trip| {
                let mut updated = trip.clone();
                updated.status = TripStatus::Cancelled;
                Ok(updated)
            })
            .await?;
        info!("Trip {} cancelled by {}", trip_id, editor_id);
        Ok(trip)
    }

    /// Removes the trip only. Participant and payment records stay behind.
    pub async fn delete_trip(&self, trip_id: &str, editor_id: &str) -> CoreResult<()> {
        let trip = self.load_raw(trip_id).await?;
        Self::check_owner(&trip, editor_id)?;
        if !self.gateway.delete(Collection::Trips, trip_id).await? {
            return Err(CoreError::NotFound(format!("trip {}", trip_id)));
        }
        info!("Trip {} deleted by {}", trip_id, editor_id);
        Ok(())
    }

    fn check_owner(trip: &Trip, editor_id: &str) -> CoreResult<()> {
        if trip.owner_id != editor_id {
            return Err(CoreError::Forbidden(format!(
                "only the owner may modify trip {}",
                trip.id
            )));
        }
        Ok(())
    }

    async fn modify<F>(&self, trip_id: &str, editor_id: &str, change: F) -> CoreResult<Trip>
    where
        F: Fn(&Trip) -> CoreResult<Trip>,
    {
        for _ in 0..self.gateway.retry_limit() {
            let trip = self.load_raw(trip_id).await?;
            Self::check_owner(&trip, editor_id)?;

            let mut updated = change(&trip)?;
            updated.touch();
            match self.store_trip(trip.revision, &updated).await? {
                CasOutcome::Swapped => return Ok(updated),
                CasOutcome::Missing => return Err(CoreError::NotFound(format!("trip {}", trip_id))),
                CasOutcome::Conflict => debug!("Trip {} changed during edit, retrying", trip_id),
            }
        }
        Err(CoreError::StorageUnavailable(format!(
            "trip {} kept changing during edit",
            trip_id
        )))
    }

    /// Resolve status for readers and write a drifted value back, best effort
    async fn present(&self, mut trip: Trip) -> Trip {
        let stored_revision = trip.revision;
        if !status::refresh(&mut trip, today()) {
            return trip;
        }

        let mut persisted = trip.clone();
        persisted.touch();
        match self.store_trip(stored_revision, &persisted).await {
            Ok(CasOutcome::Swapped) => persisted,
            Ok(outcome) => {
                debug!("Status write-back for trip {} skipped: {:?}", trip.id, outcome);
                trip
            }
            Err(e) => {
                debug!("Status write-back for trip {} failed: {}", trip.id, e);
                trip
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, NaiveDate};
    use std::sync::Arc;
    use tripwise_store::MemoryStore;

    fn catalog() -> TripCatalog {
        TripCatalog::new(PersistenceGateway::new(Arc::new(MemoryStore::new())))
    }

    fn new_trip(owner: &str, start: NaiveDate, end: NaiveDate) -> NewTrip {
        NewTrip {
            owner_id: owner.to_string(),
            title: "Dolomites hut-to-hut".to_string(),
            destination: "Cortina".to_string(),
            description: None,
            category: Some("hiking".to_string()),
            start_date: start,
            end_date: end,
            max_participants: 10,
            budget: 20000,
            price_per_person: None,
            advance_payment_percentage: None,
            is_public: true,
            highlights: vec![],
            tags: vec![],
        }
    }

    fn upcoming(owner: &str) -> NewTrip {
        let t = today();
        new_trip(owner, t + Days::new(10), t + Days::new(15))
    }

    #[tokio::test]
    async fn test_create_trip_opens_all_seats() {
        let catalog = catalog();
        let trip = catalog.create_trip(upcoming("owner")).await.unwrap();
        assert_eq!(trip.available_seats, 10);
        assert_eq!(trip.current_participants, 0);
        assert_eq!(trip.advance_payment_percentage, 20);
        assert_eq!(trip.status, TripStatus::Planned);

        let fetched = catalog.get_trip(&trip.id).await.unwrap();
        assert_eq!(fetched, trip);
    }

    #[tokio::test]
    async fn test_create_trip_validation() {
        let catalog = catalog();
        let t = today();

        let err = catalog.create_trip(new_trip("o", t + Days::new(5), t + Days::new(1))).await.unwrap_err();
        assert_eq!(err.kind(), "validation_failed");

        let mut input = upcoming("o");
        input.max_participants = 0;
        assert!(catalog.create_trip(input).await.is_err());

        let mut input = upcoming("o");
        input.advance_payment_percentage = Some(150);
        assert!(catalog.create_trip(input).await.is_err());
    }

    #[tokio::test]
    async fn test_status_resolved_on_read() {
        let catalog = catalog();
        let t = today();
        let trip = catalog
            .create_trip(new_trip("o", t - Days::new(1), t + Days::new(1)))
            .await
            .unwrap();
        assert_eq!(trip.status, TripStatus::Ongoing);

        // simulate a stale stored value
        let mut stale = trip.clone();
        stale.status = TripStatus::Planned;
        stale.touch();
        catalog.store_trip(trip.revision, &stale).await.unwrap();

        let read = catalog.get_trip(&trip.id).await.unwrap();
        assert_eq!(read.status, TripStatus::Ongoing);
        // and the drift was written back
        assert_eq!(catalog.load_raw(&trip.id).await.unwrap().status, TripStatus::Ongoing);
    }

    #[tokio::test]
    async fn test_cancelled_trip_stays_cancelled() {
        let catalog = catalog();
        let trip = catalog.create_trip(upcoming("owner")).await.unwrap();

        let err = catalog.cancel_trip(&trip.id, "intruder").await.unwrap_err();
        assert_eq!(err.kind(), "forbidden");

        catalog.cancel_trip(&trip.id, "owner").await.unwrap();
        let read = catalog.get_trip(&trip.id).await.unwrap();
        assert_eq!(read.status, TripStatus::Cancelled);

        // editing dates does not revive it
        let patch = TripPatch { end_date: Some(today() + Days::new(20)), ..Default::default() };
        let edited = catalog.update_trip(&trip.id, "owner", patch).await.unwrap();
        assert_eq!(edited.status, TripStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_update_capacity_through_ledger() {
        let catalog = catalog();
        let trip = catalog.create_trip(upcoming("owner")).await.unwrap();

        let patch = TripPatch { max_participants: Some(14), title: Some("Longer".into()), ..Default::default() };
        let edited = catalog.update_trip(&trip.id, "owner", patch).await.unwrap();
        assert_eq!(edited.max_participants, 14);
        assert_eq!(edited.available_seats, 14);
        assert_eq!(edited.title, "Longer");
        assert_eq!(edited.revision, trip.revision + 1);

        let patch = TripPatch { max_participants: Some(0), ..Default::default() };
        assert!(catalog.update_trip(&trip.id, "owner", patch).await.is_err());
    }

    #[tokio::test]
    async fn test_list_filters() {
        let catalog = catalog();
        catalog.create_trip(upcoming("a")).await.unwrap();
        let mut private = upcoming("a");
        private.is_public = false;
        private.destination = "Reykjavik".into();
        catalog.create_trip(private).await.unwrap();
        catalog.create_trip(upcoming("b")).await.unwrap();

        let all = catalog.list_trips(&TripQuery::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let q = TripQuery { owner_id: Some("a".into()), ..Default::default() };
        assert_eq!(catalog.list_trips(&q).await.unwrap().len(), 2);

        let q = TripQuery { public_only: true, ..Default::default() };
        assert_eq!(catalog.list_trips(&q).await.unwrap().len(), 2);

        let q = TripQuery { destination: Some("reyk".into()), ..Default::default() };
        assert_eq!(catalog.list_trips(&q).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_trip() {
        let catalog = catalog();
        let trip = catalog.create_trip(upcoming("owner")).await.unwrap();
        assert_eq!(catalog.delete_trip(&trip.id, "x").await.unwrap_err().kind(), "forbidden");
        catalog.delete_trip(&trip.id, "owner").await.unwrap();
        assert_eq!(catalog.get_trip(&trip.id).await.unwrap_err().kind(), "not_found");
    }
}
