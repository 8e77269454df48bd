use chrono::NaiveDate;

use crate::error::AppResult;
use crate::models::completion::{HabitStreak, StreakReport};
use crate::services::habits::{completion_records, find_habit, list_habits};
use crate::streak::{build_report, parse_completions, StreakEngine};
use crate::AppState;

/// Fetches the user's full history and ranks every habit by best streak.
pub async fn streak_report(
    state: &AppState,
    user_id: &str,
    engine: &StreakEngine,
    today: NaiveDate,
) -> AppResult<StreakReport> {
    let habits = list_habits(state, user_id).await?;
    let (records, malformed) = completion_records(state, user_id, None, None, None).await?;

    let mut report = build_report(engine, &habits, &records, today);
    report.dropped_records += malformed.len();
    report.warnings.extend(malformed.iter().map(ToString::to_string));

    tracing::debug!(
        user_id = %user_id,
        habits = report.rankings.len(),
        dropped = report.dropped_records,
        "Streak report computed"
    );
    Ok(report)
}

pub async fn habit_streak(
    state: &AppState,
    user_id: &str,
    habit_id: &str,
    engine: &StreakEngine,
    today: NaiveDate,
) -> AppResult<HabitStreak> {
    let habit = find_habit(state, user_id, habit_id).await?;
    let (records, malformed) = completion_records(state, user_id, Some(&habit.id), None, None).await?;
    let mut parsed = parse_completions(&records);
    parsed.rejected.extend(malformed);

    Ok(HabitStreak {
        stats: engine.compute_streak(&habit.id, &parsed.completions, today),
        habit_id: habit.id,
        dropped_records: parsed.dropped(),
        warnings: parsed.rejected.iter().map(ToString::to_string).collect(),
    })
}
