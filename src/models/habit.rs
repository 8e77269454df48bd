use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Habit {
    #[serde(alias = "$id")]
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub frequency: Frequency,
    /// Stored on the document by older clients; read through, never written back.
    #[serde(default)]
    pub streak_count: i64,
    #[serde(default)]
    pub last_completed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Target recurrence. Carried through to clients; streak arithmetic is day-based for all of them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateHabitRequest {
    #[validate(length(min = 1, max = 100, message = "Title must be 1-100 characters"))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: String,
    #[serde(default)]
    pub frequency: Frequency,
}

#[derive(Debug, Serialize)]
pub struct HabitWithStatus {
    #[serde(flatten)]
    pub habit: Habit,
    pub completed_today: bool,
}
