use chrono::NaiveDate;
use tripwise_shared::{Trip, TripStatus};

/// Derive the lifecycle phase from a date range. Both dates are inclusive,
/// so a trip is `Ongoing` through the whole of its last day.
///
/// Callers validate `start <= end` beforehand and handle the `Cancelled`
/// override themselves (see [`effective_status`]).
pub fn resolve(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> TripStatus {
    if today < start {
        TripStatus::Planned
    } else if today <= end {
        TripStatus::Ongoing
    } else {
        TripStatus::Completed
    }
}

/// Status as presented to readers: `Cancelled` is sticky, everything else is
/// recomputed from the dates.
pub fn effective_status(trip: &Trip, today: NaiveDate) -> TripStatus {
    if trip.is_cancelled() {
        return TripStatus::Cancelled;
    }
    resolve(trip.start_date, trip.end_date, today)
}

/// Overwrite the stored status with the effective one. Returns true if it changed.
pub fn refresh(trip: &mut Trip, today: NaiveDate) -> bool {
    let status = effective_status(trip, today);
    if status == trip.status {
        return false;
    }
    trip.status = status;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, Utc};

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    #[test]
    fn test_future_trip_is_planned() {
        let t = today();
        let start = t + Days::new(1);
        assert_eq!(resolve(start, start + Days::new(5), t), TripStatus::Planned);
    }

    #[test]
    fn test_running_trip_is_ongoing() {
        let t = today();
        assert_eq!(resolve(t - Days::new(1), t + Days::new(1), t), TripStatus::Ongoing);
        // boundaries are inclusive
        assert_eq!(resolve(t, t, t), TripStatus::Ongoing);
    }

    #[test]
    fn test_past_trip_is_completed() {
        let t = today();
        assert_eq!(resolve(t - Days::new(5), t - Days::new(1), t), TripStatus::Completed);
    }

    #[test]
    fn test_cancelled_is_sticky() {
        let t = today();
        let mut trip = crate::ledger::tests::sample_trip(10);
        trip.start_date = t + Days::new(10);
        trip.end_date = t + Days::new(12);
        trip.status = TripStatus::Cancelled;

        assert_eq!(effective_status(&trip, t), TripStatus::Cancelled);
        assert!(!refresh(&mut trip, t));
        assert_eq!(trip.status, TripStatus::Cancelled);
    }

    #[test]
    fn test_refresh_replaces_stale_status() {
        let t = today();
        let mut trip = crate::ledger::tests::sample_trip(10);
        trip.start_date = t - Days::new(3);
        trip.end_date = t - Days::new(1);
        trip.status = TripStatus::Planned;

        assert!(refresh(&mut trip, t));
        assert_eq!(trip.status, TripStatus::Completed);
    }
}
