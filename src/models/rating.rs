use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

pub const MIN_STARS: i64 = 1;
pub const MAX_STARS: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: String,
    pub trip_id: String,
    pub stars: i64,
    pub created_at: DateTime<Utc>,
}

pub fn validate_stars(stars: i64) -> Result<i64, AppError> {
    if (MIN_STARS..=MAX_STARS).contains(&stars) {
        Ok(stars)
    } else {
        Err(AppError::validation("Invalid rating (1-5 stars)"))
    }
}
