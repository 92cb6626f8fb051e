use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Financial record written once per successful join
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: String,
    pub trip_id: String,
    pub user_id: String,
    pub participant_id: String,
    pub amount: i64,
    pub method: String,
    pub transaction_id: String,
    pub paid_at: DateTime<Utc>,
    /// Refund annotation; the only field that may change after creation
    #[serde(default)]
    pub refund_note: Option<String>,
}

impl Payment {
    pub fn new(
        trip_id: String,
        user_id: String,
        participant_id: String,
        amount: i64,
        method: String,
        transaction_id: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            trip_id,
            user_id,
            participant_id,
            amount,
            method,
            transaction_id,
            paid_at: Utc::now(),
            refund_note: None,
        }
    }
}
