pub mod trips;
pub mod users;

pub use trips::{TripCatalog, TripQuery};
pub use users::{NewUser, UserDirectory};

use chrono::{NaiveDate, Utc};

/// Calendar day used for status resolution
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}
