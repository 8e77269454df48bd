use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::models::completion::{CompletionOutcome, CompletionRecord, HabitCompletion};
use crate::models::habit::{CreateHabitRequest, Habit, HabitWithStatus};
use crate::realtime::{ChangeEvent, ChangeKind};
use crate::store::{list_all, Collection, Query};
use crate::streak::{parse_completions, StreakEngine, ValidationError};
use crate::AppState;

/// Timestamp format written to the store; lexical order equals time order.
pub fn store_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn document_id(doc: &Value) -> String {
    doc.get("$id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn to_habit(doc: Value) -> AppResult<Habit> {
    serde_json::from_value(doc)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Unreadable habit document: {}", e)))
}

pub async fn list_habits(state: &AppState, user_id: &str) -> AppResult<Vec<Habit>> {
    let docs = list_all(
        state.store.as_ref(),
        Collection::Habits,
        &[Query::equal("user_id", user_id)],
    )
    .await?;

    let mut habits = Vec::with_capacity(docs.len());
    for doc in docs {
        let id = document_id(&doc);
        match to_habit(doc) {
            Ok(habit) => habits.push(habit),
            Err(e) => tracing::warn!(habit_id = %id, error = %e, "Skipping habit document"),
        }
    }
    Ok(habits)
}

pub async fn find_habit(state: &AppState, user_id: &str, habit_id: &str) -> AppResult<Habit> {
    let doc = state
        .store
        .list_documents(
            Collection::Habits,
            &[
                Query::equal("$id", habit_id),
                Query::equal("user_id", user_id),
                Query::Limit(1),
            ],
        )
        .await?
        .into_iter()
        .next()
        .ok_or(AppError::NotFound("Habit not found".into()))?;

    to_habit(doc)
}

pub async fn create_habit(
    state: &AppState,
    user_id: &str,
    body: CreateHabitRequest,
) -> AppResult<Habit> {
    let doc = state
        .store
        .create_document(
            Collection::Habits,
            json!({
                "user_id": user_id,
                "title": body.title.trim(),
                "description": body.description.trim(),
                "frequency": body.frequency,
                "streak_count": 0,
                "last_completed": null,
                "created_at": store_timestamp(Utc::now()),
            }),
        )
        .await?;
    let habit = to_habit(doc)?;

    tracing::info!(user_id = %user_id, habit_id = %habit.id, "Habit created");
    state.changes.publish(ChangeEvent {
        collection: Collection::Habits,
        kind: ChangeKind::Create,
        document_id: habit.id.clone(),
        user_id: user_id.to_string(),
    });
    Ok(habit)
}

pub async fn delete_habit(state: &AppState, user_id: &str, habit_id: &str) -> AppResult<()> {
    let habit = find_habit(state, user_id, habit_id).await?;
    state
        .store
        .delete_document(Collection::Habits, &habit.id)
        .await?;

    tracing::info!(user_id = %user_id, habit_id = %habit.id, "Habit deleted");
    state.changes.publish(ChangeEvent {
        collection: Collection::Habits,
        kind: ChangeKind::Delete,
        document_id: habit.id,
        user_id: user_id.to_string(),
    });
    Ok(())
}

/// Completion documents for a user, optionally limited to `since <= completed_at < until`.
/// Documents that cannot even be read as records come back as validation errors.
pub async fn completion_records(
    state: &AppState,
    user_id: &str,
    habit_id: Option<&str>,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
) -> AppResult<(Vec<CompletionRecord>, Vec<ValidationError>)> {
    let mut filters = vec![Query::equal("user_id", user_id)];
    if let Some(habit_id) = habit_id {
        filters.push(Query::equal("habit_id", habit_id));
    }
    if let Some(since) = since {
        filters.push(Query::greater_than_equal("completed_at", store_timestamp(since)));
    }
    if let Some(until) = until {
        filters.push(Query::less_than("completed_at", store_timestamp(until)));
    }

    let docs = list_all(state.store.as_ref(), Collection::Completions, &filters).await?;

    let mut records = Vec::with_capacity(docs.len());
    let mut malformed = Vec::new();
    for doc in docs {
        match serde_json::from_value::<CompletionRecord>(doc) {
            Ok(record) => records.push(record),
            Err(e) => {
                let err = ValidationError::MalformedRecord {
                    reason: e.to_string(),
                };
                tracing::warn!(error = %err, "Skipping completion document");
                malformed.push(err);
            }
        }
    }
    Ok((records, malformed))
}

/// Ids of habits completed on the engine's local day containing `now`.
pub async fn completed_today(
    state: &AppState,
    user_id: &str,
    engine: &StreakEngine,
    now: DateTime<Utc>,
) -> AppResult<Vec<String>> {
    let today = engine.today_at(now);
    let since = engine.day_start_utc(today);
    let until = today.succ_opt().map(|tomorrow| engine.day_start_utc(tomorrow));
    let (records, malformed) = completion_records(state, user_id, None, Some(since), until).await?;
    let parsed = parse_completions(&records);
    let skipped = malformed.len() + parsed.dropped();
    if skipped > 0 {
        tracing::debug!(user_id = %user_id, %today, skipped, "Today's completions read without unreadable records");
    }

    let mut ids: Vec<String> = parsed
        .completions
        .iter()
        .filter(|c| engine.local_day(&c.completed_at) == today)
        .map(|c| c.habit_id.clone())
        .collect();
    ids.sort();
    ids.dedup();
    Ok(ids)
}

/// The user's habits with today's status. `streak_count` carries the live
/// current streak, so a lapsed streak reads 0 even if the stored value is stale.
pub async fn habits_with_status(
    state: &AppState,
    user_id: &str,
    engine: &StreakEngine,
    now: DateTime<Utc>,
) -> AppResult<Vec<HabitWithStatus>> {
    let today = engine.today_at(now);
    let habits = list_habits(state, user_id).await?;
    let (records, malformed) = completion_records(state, user_id, None, None, None).await?;
    let parsed = parse_completions(&records);
    let skipped = malformed.len() + parsed.dropped();
    if skipped > 0 {
        tracing::debug!(user_id = %user_id, skipped, "Habit list built without unreadable completions");
    }

    Ok(habits
        .into_iter()
        .map(|mut habit| {
            let stats = engine.compute_streak(&habit.id, &parsed.completions, today);
            habit.streak_count = stats.current_streak.into();
            HabitWithStatus {
                completed_today: engine.completed_on(&habit.id, &parsed.completions, today),
                habit,
            }
        })
        .collect())
}

/// Records a completion at `now` unless the habit is already done on that local day.
pub async fn complete_habit(
    state: &AppState,
    user_id: &str,
    habit_id: &str,
    engine: &StreakEngine,
    now: DateTime<Utc>,
) -> AppResult<CompletionOutcome> {
    let habit = find_habit(state, user_id, habit_id).await?;
    let today = engine.today_at(now);

    let (records, malformed) = completion_records(state, user_id, Some(&habit.id), None, None).await?;
    let mut parsed = parse_completions(&records);
    let skipped = malformed.len() + parsed.dropped();
    if skipped > 0 {
        tracing::debug!(habit_id = %habit.id, skipped, "Completion checked against partial history");
    }
    if engine.completed_on(&habit.id, &parsed.completions, today) {
        tracing::debug!(habit_id = %habit.id, %today, "Habit already completed today");
        return Ok(CompletionOutcome {
            habit_id: habit.id,
            created: false,
            completion: None,
        });
    }

    let completed_at = store_timestamp(now);
    let doc = state
        .store
        .create_document(
            Collection::Completions,
            json!({
                "habit_id": habit.id,
                "user_id": user_id,
                "completed_at": completed_at,
            }),
        )
        .await?;
    let completion_id = document_id(&doc);

    parsed.completions.push(HabitCompletion {
        habit_id: habit.id.clone(),
        completed_at: now.into(),
    });
    let stats = engine.compute_streak(&habit.id, &parsed.completions, today);

    state
        .store
        .update_document(
            Collection::Habits,
            &habit.id,
            json!({
                "last_completed": completed_at,
                "streak_count": stats.current_streak,
            }),
        )
        .await?;

    tracing::info!(
        user_id = %user_id,
        habit_id = %habit.id,
        streak = stats.current_streak,
        "Habit completed"
    );
    state.changes.publish(ChangeEvent {
        collection: Collection::Completions,
        kind: ChangeKind::Create,
        document_id: completion_id,
        user_id: user_id.to_string(),
    });
    state.changes.publish(ChangeEvent {
        collection: Collection::Habits,
        kind: ChangeKind::Update,
        document_id: habit.id.clone(),
        user_id: user_id.to_string(),
    });

    let completion = serde_json::from_value::<CompletionRecord>(doc).ok();
    Ok(CompletionOutcome {
        habit_id: habit.id,
        created: true,
        completion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::habit::Frequency;
    use crate::store::DocumentStore;

    fn request(title: &str) -> CreateHabitRequest {
        CreateHabitRequest {
            title: title.into(),
            description: String::new(),
            frequency: Frequency::Daily,
        }
    }

    fn at(ts: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc)
    }

    #[tokio::test]
    async fn habits_are_scoped_to_their_owner() {
        let state = AppState::in_memory(Config::default());
        let habit = create_habit(&state, "u1", request("Read")).await.unwrap();
        create_habit(&state, "u2", request("Run")).await.unwrap();

        assert_eq!(list_habits(&state, "u1").await.unwrap(), vec![habit.clone()]);
        let err = find_habit(&state, "u2", &habit.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = delete_habit(&state, "u2", &habit.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        delete_habit(&state, "u1", &habit.id).await.unwrap();
        assert!(list_habits(&state, "u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn completing_twice_on_one_local_day_creates_one_record() {
        let state = AppState::in_memory(Config::default());
        let engine = StreakEngine::default();
        let habit = create_habit(&state, "u1", request("Read")).await.unwrap();

        let first = complete_habit(&state, "u1", &habit.id, &engine, at("2025-03-05T08:00:00Z"))
            .await
            .unwrap();
        let second = complete_habit(&state, "u1", &habit.id, &engine, at("2025-03-05T21:00:00Z"))
            .await
            .unwrap();
        let next_day = complete_habit(&state, "u1", &habit.id, &engine, at("2025-03-06T00:05:00Z"))
            .await
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert!(next_day.created);

        let (records, malformed) = completion_records(&state, "u1", None, None, None).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(malformed.is_empty());

        let stored = find_habit(&state, "u1", &habit.id).await.unwrap();
        assert_eq!(stored.last_completed, Some(at("2025-03-06T00:05:00Z")));
        assert_eq!(stored.streak_count, 2);
    }

    #[tokio::test]
    async fn listed_habits_carry_the_live_streak() {
        let state = AppState::in_memory(Config::default());
        let engine = StreakEngine::default();
        let read = create_habit(&state, "u1", request("Read")).await.unwrap();
        let run = create_habit(&state, "u1", request("Run")).await.unwrap();
        for ts in ["2025-03-03T08:00:00Z", "2025-03-04T08:00:00Z", "2025-03-05T08:00:00Z"] {
            complete_habit(&state, "u1", &read.id, &engine, at(ts)).await.unwrap();
        }
        complete_habit(&state, "u1", &run.id, &engine, at("2025-03-01T08:00:00Z"))
            .await
            .unwrap();

        let listed = habits_with_status(&state, "u1", &engine, at("2025-03-05T20:00:00Z"))
            .await
            .unwrap();
        let read_row = listed.iter().find(|h| h.habit.id == read.id).unwrap();
        assert!(read_row.completed_today);
        assert_eq!(read_row.habit.streak_count, 3);

        // Stored as 1 when completed on Mar 1, lapsed since.
        let run_row = listed.iter().find(|h| h.habit.id == run.id).unwrap();
        assert!(!run_row.completed_today);
        assert_eq!(run_row.habit.streak_count, 0);
        assert_eq!(find_habit(&state, "u1", &run.id).await.unwrap().streak_count, 1);
    }

    #[tokio::test]
    async fn completed_today_ignores_later_days() {
        let state = AppState::in_memory(Config::default());
        let engine = StreakEngine::default();
        let habit = create_habit(&state, "u1", request("Read")).await.unwrap();
        complete_habit(&state, "u1", &habit.id, &engine, at("2025-03-06T09:00:00Z"))
            .await
            .unwrap();

        let done = completed_today(&state, "u1", &engine, at("2025-03-05T12:00:00Z"))
            .await
            .unwrap();
        assert!(done.is_empty());
    }

    #[tokio::test]
    async fn completed_today_uses_local_day() {
        let state = AppState::in_memory(Config::default());
        let habit = create_habit(&state, "u1", request("Read")).await.unwrap();
        let utc = StreakEngine::default();
        complete_habit(&state, "u1", &habit.id, &utc, at("2025-03-05T03:00:00Z"))
            .await
            .unwrap();

        // 03:00Z is still Mar 4 in UTC-05:00.
        let new_york = StreakEngine::new(crate::streak::offset_from_minutes(-300).unwrap());
        let done = completed_today(&state, "u1", &new_york, at("2025-03-05T12:00:00Z"))
            .await
            .unwrap();
        assert!(done.is_empty());
        let done = completed_today(&state, "u1", &utc, at("2025-03-05T12:00:00Z"))
            .await
            .unwrap();
        assert_eq!(done, vec![habit.id]);
    }

    #[tokio::test]
    async fn unreadable_completion_documents_are_reported() {
        let state = AppState::in_memory(Config::default());
        state
            .store
            .create_document(
                Collection::Completions,
                json!({ "user_id": "u1", "habit_id": "h1", "completed_at": 12345 }),
            )
            .await
            .unwrap();

        let (records, malformed) = completion_records(&state, "u1", None, None, None).await.unwrap();
        assert!(records.is_empty());
        assert_eq!(malformed.len(), 1);
    }
}
