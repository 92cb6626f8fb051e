pub mod trip;
pub mod participant;
pub mod payment;
pub mod user;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use trip::{NewTrip, Trip, TripPatch, TripStatus, DEFAULT_ADVANCE_PERCENTAGE};
pub use participant::{Participant, ParticipantPaymentStatus, ReservationStatus};
pub use payment::Payment;
pub use user::User;

/// Named record collections held by the record store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Trips,
    Participants,
    Payments,
    Users,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Trips,
        Collection::Participants,
        Collection::Payments,
        Collection::Users,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Trips => "trips",
            Collection::Participants => "participants",
            Collection::Payments => "payments",
            Collection::Users => "users",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
