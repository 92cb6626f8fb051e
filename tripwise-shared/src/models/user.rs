use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use crate::pii::Masked;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: Masked<String>,
    pub created_at: DateTime<Utc>,
}
