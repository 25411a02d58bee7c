use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A university as stored. Fee and acceptance-rate fields are free text;
/// only the matching module interprets them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UniversityRow {
    pub id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub country: String,
    pub rank: Option<i32>,
    pub fees: Option<String>,
    pub acceptance_rate: Option<String>,
    pub tags: Vec<String>,
    pub website: Option<String>,
    /// "catalogue" for seeded rows, "directory" for rows imported from discovery search.
    pub source: String,
    pub created_at: DateTime<Utc>,
}
