use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::models::habit::Habit;

/// A completion document exactly as the store hands it back. Nothing is trusted yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CompletionRecord {
    #[serde(default, alias = "$id")]
    pub id: Option<String>,
    #[serde(default)]
    pub habit_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

/// A completion whose timestamp has been validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitCompletion {
    pub habit_id: String,
    pub completed_at: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StreakStats {
    pub current_streak: u32,
    pub best_streak: u32,
    pub total_completions: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RankedHabit {
    pub habit: Habit,
    pub stats: StreakStats,
}

#[derive(Debug, Serialize)]
pub struct StreakReport {
    pub today: chrono::NaiveDate,
    pub rankings: Vec<RankedHabit>,
    pub dropped_records: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HabitStreak {
    pub habit_id: String,
    #[serde(flatten)]
    pub stats: StreakStats,
    pub dropped_records: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CompletionOutcome {
    pub habit_id: String,
    pub created: bool,
    pub completion: Option<CompletionRecord>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LocalDayQuery {
    /// Minutes east of UTC.
    pub tz_offset: Option<i32>,
}
