use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};
use grantwatch_core::{AppError, AppResult, ResourceId};
use serde::{Deserialize, Serialize};

/// How often a recipient wants detected changes delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationFrequency {
    /// Bundle and deliver on every dispatcher run.
    Immediate,
    /// Bundle changes detected before the most recent daily boundary.
    Daily,
    /// Bundle changes detected before the most recent weekly boundary.
    Weekly,
}

impl NotificationFrequency {
    /// Returns a stable storage value for this frequency.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        }
    }
}

impl FromStr for NotificationFrequency {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "immediate" => Ok(Self::Immediate),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            _ => Err(AppError::Validation(format!(
                "unknown notification frequency '{value}'"
            ))),
        }
    }
}

/// A validated email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Creates a validated email address.
    ///
    /// Performs basic structural validation: non-empty, contains exactly one `@`,
    /// local part and domain are non-empty, domain contains at least one `.`.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim().to_lowercase();

        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "email address must not be empty".to_owned(),
            ));
        }

        let parts: Vec<&str> = trimmed.splitn(2, '@').collect();
        if parts.len() != 2 {
            return Err(AppError::Validation(
                "email address must contain exactly one '@'".to_owned(),
            ));
        }

        let local = parts[0];
        let domain = parts[1];

        if local.is_empty() {
            return Err(AppError::Validation(
                "email local part must not be empty".to_owned(),
            ));
        }

        if domain.is_empty() || !domain.contains('.') {
            return Err(AppError::Validation(
                "email domain must contain at least one '.'".to_owned(),
            ));
        }

        if trimmed.len() > 254 {
            return Err(AppError::Validation(
                "email address must not exceed 254 characters".to_owned(),
            ));
        }

        Ok(Self(trimmed))
    }

    /// Returns the validated email string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

/// Subscription binding one email address to one monitored resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecipient {
    resource_id: ResourceId,
    address: EmailAddress,
    frequency: NotificationFrequency,
}

impl NotificationRecipient {
    /// Creates a recipient subscription.
    #[must_use]
    pub fn new(
        resource_id: ResourceId,
        address: EmailAddress,
        frequency: NotificationFrequency,
    ) -> Self {
        Self {
            resource_id,
            address,
            frequency,
        }
    }

    /// Returns the monitored resource.
    #[must_use]
    pub fn resource_id(&self) -> &ResourceId {
        &self.resource_id
    }

    /// Returns the delivery address.
    #[must_use]
    pub fn address(&self) -> &EmailAddress {
        &self.address
    }

    /// Returns the delivery frequency.
    #[must_use]
    pub fn frequency(&self) -> NotificationFrequency {
        self.frequency
    }
}

/// Boundary rule for daily and weekly bundling periods.
///
/// A daily period closes at the boundary hour (UTC); a weekly period closes
/// at the boundary hour on the configured week start day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodPolicy {
    boundary: NaiveTime,
    week_start: Weekday,
}

impl PeriodPolicy {
    /// Creates a period policy with the given boundary hour and week start.
    pub fn new(boundary_hour_utc: u32, week_start: Weekday) -> AppResult<Self> {
        let boundary = NaiveTime::from_hms_opt(boundary_hour_utc, 0, 0).ok_or_else(|| {
            AppError::Validation(format!(
                "period boundary hour must be between 0 and 23, got {boundary_hour_utc}"
            ))
        })?;

        Ok(Self {
            boundary,
            week_start,
        })
    }

    /// Returns the most recent daily boundary at or before `now`.
    #[must_use]
    pub fn daily_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let candidate = now.date_naive().and_time(self.boundary).and_utc();
        if candidate > now {
            candidate - Duration::days(1)
        } else {
            candidate
        }
    }

    /// Returns the most recent weekly boundary at or before `now`.
    #[must_use]
    pub fn weekly_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let mut cutoff = self.daily_cutoff(now);
        while cutoff.weekday() != self.week_start {
            cutoff -= Duration::days(1);
        }

        cutoff
    }

    /// Returns the change-inclusion cutoff for a frequency.
    ///
    /// Immediate delivery has no period gate, so every unclaimed change
    /// qualifies and the cutoff is `None`.
    #[must_use]
    pub fn cutoff_for(
        &self,
        frequency: NotificationFrequency,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        match frequency {
            NotificationFrequency::Immediate => None,
            NotificationFrequency::Daily => Some(self.daily_cutoff(now)),
            NotificationFrequency::Weekly => Some(self.weekly_cutoff(now)),
        }
    }
}

impl Default for PeriodPolicy {
    fn default() -> Self {
        Self {
            boundary: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
            week_start: Weekday::Mon,
        }
    }
}

/// Parses a configured week start day name.
pub fn parse_week_start(value: &str) -> AppResult<Weekday> {
    value
        .parse::<Weekday>()
        .map_err(|_| AppError::Validation(format!("unknown week start day '{value}'")))
}
