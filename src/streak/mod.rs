//! Streak statistics derived from a habit's completion history.
//!
//! Everything here is pure: the reference day is passed in, inputs are only
//! read, and all day arithmetic happens on `NaiveDate` after a timestamp has
//! been truncated to its local calendar day.

mod parse;

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};

use crate::models::completion::{
    CompletionRecord, HabitCompletion, RankedHabit, StreakReport, StreakStats,
};
use crate::models::habit::Habit;

pub use parse::{parse_completions, parse_record, parse_timestamp, ParsedCompletions, ValidationError};

/// Number of ranked habits shown on the leaderboard.
pub const LEADERBOARD_SIZE: usize = 3;

/// Offsets outside UTC-12:00..=UTC+14:00 do not exist on real clocks.
pub fn offset_from_minutes(minutes: i32) -> Option<FixedOffset> {
    if !(-720..=840).contains(&minutes) {
        return None;
    }
    FixedOffset::east_opt(minutes * 60)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakEngine {
    offset: FixedOffset,
}

impl Default for StreakEngine {
    fn default() -> Self {
        Self { offset: Utc.fix() }
    }
}

impl StreakEngine {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Calendar day of `ts` as seen on the user's clock.
    pub fn local_day(&self, ts: &DateTime<FixedOffset>) -> NaiveDate {
        ts.with_timezone(&self.offset).date_naive()
    }

    pub fn today_at(&self, now: DateTime<Utc>) -> NaiveDate {
        self.offset.from_utc_datetime(&now.naive_utc()).date_naive()
    }

    /// The UTC instant at which local `day` begins.
    pub fn day_start_utc(&self, day: NaiveDate) -> DateTime<Utc> {
        let local_midnight = day.and_time(NaiveTime::MIN);
        let offset = Duration::seconds(self.offset.local_minus_utc().into());
        Utc.from_utc_datetime(&(local_midnight - offset))
    }

    /// Distinct local days on which `habit_id` was completed, ascending.
    pub fn completion_days(&self, habit_id: &str, completions: &[HabitCompletion]) -> BTreeSet<NaiveDate> {
        completions
            .iter()
            .filter(|c| c.habit_id == habit_id)
            .map(|c| self.local_day(&c.completed_at))
            .collect()
    }

    pub fn completed_on(&self, habit_id: &str, completions: &[HabitCompletion], day: NaiveDate) -> bool {
        completions
            .iter()
            .any(|c| c.habit_id == habit_id && self.local_day(&c.completed_at) == day)
    }

    pub fn compute_streak(
        &self,
        habit_id: &str,
        completions: &[HabitCompletion],
        today: NaiveDate,
    ) -> StreakStats {
        let days = self.completion_days(habit_id, completions);
        let Some(&latest) = days.last() else {
            return StreakStats::default();
        };

        let mut best = 0u32;
        let mut run = 0u32;
        let mut prev: Option<NaiveDate> = None;

        for &day in &days {
            run = match prev {
                Some(p) if p.succ_opt() == Some(day) => run + 1,
                _ => {
                    best = best.max(run);
                    1
                }
            };
            prev = Some(day);
        }
        best = best.max(run);

        // Live if the last completed day is today or yesterday. A day past `today`
        // only happens with client clock skew and is treated as live too.
        let current = if (today - latest).num_days() <= 1 { run } else { 0 };

        StreakStats {
            current_streak: current,
            best_streak: best,
            total_completions: days.len() as u32,
        }
    }

    /// Every habit with its stats, best streak first. Equal best streaks keep input order.
    pub fn rank_habits(
        &self,
        habits: &[Habit],
        completions: &[HabitCompletion],
        today: NaiveDate,
    ) -> Vec<RankedHabit> {
        let mut ranked: Vec<RankedHabit> = habits
            .iter()
            .map(|habit| RankedHabit {
                stats: self.compute_streak(&habit.id, completions, today),
                habit: habit.clone(),
            })
            .collect();

        ranked.sort_by(|a, b| b.stats.best_streak.cmp(&a.stats.best_streak));
        ranked
    }

    pub fn report(&self, habits: &[Habit], parsed: ParsedCompletions, today: NaiveDate) -> StreakReport {
        let rankings = self.rank_habits(habits, &parsed.completions, today);
        if !parsed.rejected.is_empty() {
            tracing::warn!(
                dropped = parsed.rejected.len(),
                "Streak report computed without unreadable completions"
            );
        }
        StreakReport {
            today,
            rankings,
            dropped_records: parsed.rejected.len(),
            warnings: parsed.rejected.iter().map(ToString::to_string).collect(),
        }
    }
}

pub fn build_report(
    engine: &StreakEngine,
    habits: &[Habit],
    records: &[CompletionRecord],
    today: NaiveDate,
) -> StreakReport {
    engine.report(habits, parse_completions(records), today)
}
