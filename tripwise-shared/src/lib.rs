pub mod models;
pub mod pii;

pub use models::{
    Collection, NewTrip, Participant, ParticipantPaymentStatus, Payment, ReservationStatus, Trip,
    TripPatch, TripStatus, User, DEFAULT_ADVANCE_PERCENTAGE,
};
pub use pii::Masked;
