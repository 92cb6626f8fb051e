use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_ADVANCE_PERCENTAGE: u32 = 20;

fn default_advance_percentage() -> u32 {
    DEFAULT_ADVANCE_PERCENTAGE
}

fn default_public() -> bool {
    true
}

/// Trip lifecycle phase
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Planned,
    Ongoing,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Planned => "planned",
            TripStatus::Ongoing => "ongoing",
            TripStatus::Completed => "completed",
            TripStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A journey proposal with finite capacity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trip {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub destination: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub max_participants: u32,
    /// Whole currency units
    pub budget: i64,
    #[serde(default)]
    pub price_per_person: Option<i64>,
    #[serde(default = "default_advance_percentage")]
    pub advance_payment_percentage: u32,
    pub current_participants: u32,
    pub available_seats: u32,
    /// Members holding seats, mapped to the participant record that holds them
    #[serde(default)]
    pub joined_users: BTreeMap<String, String>,
    pub status: TripStatus,
    #[serde(default = "default_public")]
    pub is_public: bool,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Bumped on every stored change; guards conditional writes
    #[serde(default)]
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    pub fn is_cancelled(&self) -> bool {
        self.status == TripStatus::Cancelled
    }

    pub fn has_member(&self, user_id: &str) -> bool {
        self.joined_users.contains_key(user_id)
    }

    /// Participant record currently holding `user_id`'s seats
    pub fn seat_holder(&self, user_id: &str) -> Option<&str> {
        self.joined_users.get(user_id).map(String::as_str)
    }

    /// Stamp a modification
    pub fn touch(&mut self) {
        self.revision += 1;
        self.updated_at = Utc::now();
    }
}

/// Planner-flow input for creating a trip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTrip {
    /// Filled from the acting user when created over HTTP
    #[serde(default)]
    pub owner_id: String,
    pub title: String,
    pub destination: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub max_participants: u32,
    pub budget: i64,
    #[serde(default)]
    pub price_per_person: Option<i64>,
    #[serde(default)]
    pub advance_payment_percentage: Option<u32>,
    #[serde(default = "default_public")]
    pub is_public: bool,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Owner edit; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TripPatch {
    pub title: Option<String>,
    pub destination: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub max_participants: Option<u32>,
    pub budget: Option<i64>,
    pub price_per_person: Option<i64>,
    pub advance_payment_percentage: Option<u32>,
    pub is_public: Option<bool>,
    pub highlights: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
}
