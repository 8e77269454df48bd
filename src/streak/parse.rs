use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};

use crate::models::completion::{CompletionRecord, HabitCompletion};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("completion {record} has no habit_id")]
    MissingHabit { record: String },

    #[error("completion {record} has no completed_at timestamp")]
    MissingTimestamp { record: String },

    #[error("completion {record} has unparseable completed_at '{value}'")]
    InvalidTimestamp { record: String, value: String },

    #[error("completion document could not be read: {reason}")]
    MalformedRecord { reason: String },
}

#[derive(Debug, Default)]
pub struct ParsedCompletions {
    pub completions: Vec<HabitCompletion>,
    pub rejected: Vec<ValidationError>,
}

impl ParsedCompletions {
    pub fn dropped(&self) -> usize {
        self.rejected.len()
    }
}

/// Accepts RFC 3339, an offset-less `YYYY-MM-DDTHH:MM:SS[.f]` (read as UTC),
/// or a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }

    let utc = Utc.fix();
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(DateTime::from_naive_utc_and_offset(naive, utc));
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, utc))
}

pub fn parse_record(record: &CompletionRecord) -> Result<HabitCompletion, ValidationError> {
    let label = record.id.clone().unwrap_or_else(|| "<unsaved>".into());

    if record.habit_id.trim().is_empty() {
        return Err(ValidationError::MissingHabit { record: label });
    }

    let raw = match record.completed_at.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Err(ValidationError::MissingTimestamp { record: label }),
    };

    let completed_at = parse_timestamp(raw).ok_or_else(|| ValidationError::InvalidTimestamp {
        record: label,
        value: raw.to_string(),
    })?;

    Ok(HabitCompletion {
        habit_id: record.habit_id.clone(),
        completed_at,
    })
}

/// Splits records into usable completions and rejected ones. One bad record never
/// hides the rest.
pub fn parse_completions(records: &[CompletionRecord]) -> ParsedCompletions {
    let mut parsed = ParsedCompletions::default();
    for record in records {
        match parse_record(record) {
            Ok(completion) => parsed.completions.push(completion),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping completion record");
                parsed.rejected.push(e);
            }
        }
    }
    parsed
}
