//! Expiry sweeper schedule

use chrono::NaiveTime;
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleKind {
    #[default]
    Interval,
    Daily,
}

/// When the sweeper runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepSchedule {
    Every(Duration),
    /// Once a day at the given UTC time
    DailyAt(NaiveTime),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub schedule: ScheduleKind,

    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// "HH:MM", UTC
    #[serde(default = "default_daily_at")]
    pub daily_at: String,
}

impl SweeperConfig {
    pub fn schedule(&self) -> Result<SweepSchedule, ValidationError> {
        match self.schedule {
            ScheduleKind::Interval => {
                if self.interval_secs == 0 {
                    return Err(ValidationError::InvalidSweepInterval);
                }
                Ok(SweepSchedule::Every(Duration::from_secs(self.interval_secs)))
            }
            ScheduleKind::Daily => NaiveTime::parse_from_str(&self.daily_at, "%H:%M")
                .map(SweepSchedule::DailyAt)
                .map_err(|_| ValidationError::InvalidDailyTime(self.daily_at.clone())),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.schedule().map(|_| ())
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            schedule: ScheduleKind::default(),
            interval_secs: default_interval(),
            daily_at: default_daily_at(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_interval() -> u64 {
    60
}

fn default_daily_at() -> String {
    "03:00".to_string()
}
