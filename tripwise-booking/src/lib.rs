pub mod models;
pub mod coordinator;
pub mod inspection;

pub use models::{CancelReceipt, JoinReceipt, JoinRequest, PaymentConfirmation, SeatSummary};
pub use coordinator::ParticipationCoordinator;
