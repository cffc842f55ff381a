//! Partial date/time resolution for date leaves
//!
//! A date leaf may pin any subset of year..second and add a signed offset.
//! Units left open fall back either to the identity for their unit (when a
//! more significant unit was pinned) or to the reference instant. The
//! reference is captured once per process so every date leaf in one
//! archiving run compares against the same "now".

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, Timelike};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{ArchiveError, Result};

/// Reference instant for the current run, sampled at first use.
static RUN_STARTED: Lazy<NaiveDateTime> = Lazy::new(|| Local::now().naive_local());

/// Partially specified date/time plus a duration offset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minute: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second: Option<u32>,
    /// Signed offset added after resolution, in seconds.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub offset_seconds: i64,
}

fn is_zero(offset: &i64) -> bool {
    *offset == 0
}

impl DateSpec {
    /// Resolve against the per-run reference instant.
    pub fn resolve_now(&self) -> Result<NaiveDateTime> {
        self.resolve(*RUN_STARTED)
    }

    /// Resolve against an explicit reference instant.
    ///
    /// Each unit uses, in order of preference: the pinned value; the unit's
    /// identity (month/day 1, hour/minute/second 0) when any more
    /// significant unit was pinned; the reference's value. A spec pinning
    /// only `month = 3` therefore means "March 1st of the current year,
    /// midnight".
    pub fn resolve(&self, now: NaiveDateTime) -> Result<NaiveDateTime> {
        let date = now.date();
        let time = now.time();

        let year = self.year.unwrap_or_else(|| date.year());
        let month = self.month.unwrap_or(if self.year.is_some() { 1 } else { date.month() });
        let day = self.day.unwrap_or(if self.year.is_some() || self.month.is_some() {
            1
        } else {
            date.day()
        });
        let hour = self.hour.unwrap_or(
            if self.year.is_some() || self.month.is_some() || self.day.is_some() {
                0
            } else {
                time.hour()
            },
        );
        let minute = self.minute.unwrap_or(
            if self.year.is_some()
                || self.month.is_some()
                || self.day.is_some()
                || self.hour.is_some()
            {
                0
            } else {
                time.minute()
            },
        );
        let second = self.second.unwrap_or(
            if self.year.is_some()
                || self.month.is_some()
                || self.day.is_some()
                || self.hour.is_some()
                || self.minute.is_some()
            {
                0
            } else {
                time.second()
            },
        );

        let resolved = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(hour, minute, second))
            .ok_or_else(|| {
                ArchiveError::InvalidDate(format!(
                    "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02} is not a valid date/time"
                ))
            })?;

        Ok(resolved + Duration::seconds(self.offset_seconds))
    }
}
