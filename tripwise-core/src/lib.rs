pub mod status;
pub mod ledger;
pub mod payment;
pub mod repository;

use serde::Serialize;
use std::fmt;

pub use ledger::SeatLedger;
pub use payment::PaymentBreakdown;
pub use repository::{RecordStore, StoreError, StoreResult};

/// The participation error taxonomy. `kind()` is the stable code callers surface.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Trip is not open for joining")]
    NotJoinable,
    #[error("User already holds a reservation on this trip")]
    AlreadyJoined,
    #[error("Trip creator cannot join their own trip")]
    IsCreator,
    #[error("Insufficient seats: requested {requested}, available {available}")]
    InsufficientSeats { requested: u32, available: u32 },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Partially applied: {0}")]
    PartialFailure(PartialFailure),
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Not permitted: {0}")]
    Forbidden(String),
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

impl CoreError {
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::NotJoinable => "not_joinable",
            CoreError::AlreadyJoined => "already_joined",
            CoreError::IsCreator => "is_creator",
            CoreError::InsufficientSeats { .. } => "insufficient_seats",
            CoreError::NotFound(_) => "not_found",
            CoreError::PartialFailure(_) => "partial_failure",
            CoreError::StorageUnavailable(_) => "storage_unavailable",
            CoreError::ValidationError(_) => "validation_failed",
            CoreError::Forbidden(_) => "forbidden",
            CoreError::CorruptRecord(_) => "corrupt_record",
        }
    }

    /// Eligibility failures are decided before any write and may be retried
    /// with different parameters.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            CoreError::NotJoinable
                | CoreError::AlreadyJoined
                | CoreError::IsCreator
                | CoreError::InsufficientSeats { .. }
        )
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => CoreError::StorageUnavailable(msg),
            StoreError::Serialization(e) => CoreError::CorruptRecord(e.to_string()),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Join,
    Cancel,
}

/// The write that failed within a multi-record operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStep {
    Participant,
    TripCounters,
    Payment,
}

/// Everything an operator (or `compensate`) needs to clean up after a
/// multi-record write stopped half way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartialFailure {
    pub operation: Operation,
    pub failed_step: WriteStep,
    pub trip_id: String,
    pub user_id: String,
    pub participant_id: String,
    pub passengers: u32,
    pub cause: String,
}

impl fmt::Display for PartialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} of trip {} by user {} failed at {:?} (participant {}): {}",
            self.operation, self.trip_id, self.user_id, self.failed_step, self.participant_id, self.cause
        )
    }
}
