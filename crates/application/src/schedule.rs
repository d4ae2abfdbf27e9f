use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use grantwatch_core::{AppError, AppResult};

/// Detection trigger: a fixed interval or a cron expression, never both.
#[derive(Debug, Clone)]
pub enum DetectionSchedule {
    /// Fires a fixed number of seconds after the previous tick.
    Interval(u64),
    /// Fires on a six-field cron expression evaluated in UTC.
    Cron(Schedule),
}

impl DetectionSchedule {
    /// Builds a schedule from optional interval and cron settings.
    ///
    /// The two trigger styles are mutually exclusive; configuring both, or
    /// neither, is a validation error.
    pub fn from_settings(
        interval_seconds: Option<u64>,
        cron_expression: Option<&str>,
    ) -> AppResult<Self> {
        match (interval_seconds, cron_expression) {
            (Some(_), Some(_)) => Err(AppError::Validation(
                "detection interval and cron expression are mutually exclusive".to_owned(),
            )),
            (None, None) => Err(AppError::Validation(
                "a detection interval or cron expression is required".to_owned(),
            )),
            (Some(0), None) => Err(AppError::Validation(
                "detection interval must be greater than zero".to_owned(),
            )),
            (Some(seconds), None) => Ok(Self::Interval(seconds)),
            (None, Some(expression)) => {
                let schedule = Schedule::from_str(expression).map_err(|error| {
                    AppError::Validation(format!(
                        "invalid cron expression '{expression}': {error}"
                    ))
                })?;
                Ok(Self::Cron(schedule))
            }
        }
    }

    /// Returns the next fire instant strictly after `now`.
    #[must_use]
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Interval(seconds) => i64::try_from(*seconds)
                .ok()
                .and_then(Duration::try_seconds)
                .and_then(|step| now.checked_add_signed(step)),
            Self::Cron(schedule) => schedule.after(&now).next(),
        }
    }
}
