//! Due-date editing in local wall-clock terms. Nothing here converts
//! between time zones: the wire format is the naive `YYYY-MM-DDTHH:MM`.

use bucketsync_shared::{Task, TaskId};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::ValidationError;

const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M";
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parses a due string as the wall-clock time it names. An explicit offset
/// is dropped rather than applied.
pub fn parse_wall_clock(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

/// Short row label, e.g. `06 Nov 14:30`. Unparseable values are shown as-is.
pub fn short_label(raw: &str) -> String {
    parse_wall_clock(raw)
        .map(|dt| dt.format("%d %b %H:%M").to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// Builds the wire value from separate date and time fields.
pub fn compose(date: &str, time: &str) -> Result<String, ValidationError> {
    let (date, time) = (date.trim(), time.trim());
    if date.is_empty() || time.is_empty() {
        return Err(ValidationError::MissingDateOrTime);
    }

    let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|_| ValidationError::BadDate(date.to_string()))?;
    let time = NaiveTime::parse_from_str(time, TIME_FORMAT)
        .map_err(|_| ValidationError::BadTime(time.to_string()))?;

    Ok(date.and_time(time).format(WIRE_FORMAT).to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueDraft {
    pub task_id: TaskId,
    pub date: String,
    pub time: String,
}

impl DueDraft {
    /// Pre-fills the fields from the task's current due date, or leaves them
    /// blank when it has none.
    pub fn for_task(task: &Task) -> Self {
        let parsed = task.due_datetime.as_deref().and_then(parse_wall_clock);
        let (date, time) = match parsed {
            Some(dt) => (
                dt.format(DATE_FORMAT).to_string(),
                dt.format(TIME_FORMAT).to_string(),
            ),
            None => (String::new(), String::new()),
        };

        Self {
            task_id: task.id.clone(),
            date,
            time,
        }
    }

    pub fn compose(&self) -> Result<String, ValidationError> {
        compose(&self.date, &self.time)
    }
}

/// The modal: at most one draft open at a time.
#[derive(Debug, Default)]
pub struct DueEditor {
    draft: Option<DueDraft>,
}

impl DueEditor {
    pub fn open(&mut self, task: &Task) -> DueDraft {
        let draft = DueDraft::for_task(task);
        self.draft = Some(draft.clone());
        draft
    }

    pub fn is_open(&self) -> bool {
        self.draft.is_some()
    }

    pub fn draft(&self) -> Option<&DueDraft> {
        self.draft.as_ref()
    }

    pub fn set_fields(&mut self, date: impl Into<String>, time: impl Into<String>) -> bool {
        match self.draft.as_mut() {
            Some(draft) => {
                draft.date = date.into();
                draft.time = time.into();
                true
            }
            None => false,
        }
    }

    pub fn close(&mut self) -> Option<DueDraft> {
        self.draft.take()
    }
}
