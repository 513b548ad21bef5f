//! Persistent entities and the typed views over them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::catalog::BehaviorCode;
use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub onboarded: bool,
    /// IANA zone identifier, always valid when read back from the store.
    pub timezone: String,
    /// `HH:MM`, always valid when read back from the store.
    pub reminder_time: String,
    pub notifications_enabled: bool,
    /// Reminders per day, 1 or 2.
    pub notification_frequency: u8,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

/// Outcome of one day for one tracked behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Clean,
    Relapse,
    Unclear,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Clean => "clean",
            LogStatus::Relapse => "relapse",
            LogStatus::Unclear => "unclear",
        }
    }

    /// Calendar glyph.
    pub fn glyph(&self) -> char {
        match self {
            LogStatus::Clean => '●',
            LogStatus::Relapse => '✗',
            LogStatus::Unclear => '?',
        }
    }

    /// Summary mark shown when today's report is already complete.
    pub fn mark(&self) -> char {
        match self {
            LogStatus::Clean => '✓',
            LogStatus::Relapse => '✗',
            LogStatus::Unclear => '?',
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clean" => Ok(LogStatus::Clean),
            "relapse" => Ok(LogStatus::Relapse),
            "unclear" => Ok(LogStatus::Unclear),
            other => Err(ValidationError::InvalidValue {
                field: "status".into(),
                message: format!("unknown status '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CravingLevel {
    Low,
    Medium,
    High,
}

impl CravingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CravingLevel::Low => "low",
            CravingLevel::Medium => "medium",
            CravingLevel::High => "high",
        }
    }

    pub fn arrow(&self) -> char {
        match self {
            CravingLevel::Low => '↓',
            CravingLevel::Medium => '→',
            CravingLevel::High => '↑',
        }
    }
}

impl fmt::Display for CravingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CravingLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(CravingLevel::Low),
            "medium" => Ok(CravingLevel::Medium),
            "high" => Ok(CravingLevel::High),
            other => Err(ValidationError::InvalidValue {
                field: "craving_level".into(),
                message: format!("unknown craving level '{other}'"),
            }),
        }
    }
}

/// One row of `daily_logs`, unique per (user, date, behavior).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLog {
    pub user_id: i64,
    pub date: NaiveDate,
    pub behavior: BehaviorCode,
    pub status: LogStatus,
    pub craving: Option<CravingLevel>,
}

/// Named reminder slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Reminder,
    Reminder2,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Reminder => "reminder",
            NotificationKind::Reminder2 => "reminder2",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reminder text template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: i64,
    pub text: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastRecord {
    pub id: i64,
    pub text: String,
    pub sent: u32,
    pub failed: u32,
    pub sent_at: DateTime<Utc>,
}

/// Per-user free-form setting with a known shape.
///
/// Stored as plain strings in `user_settings`; lists are comma-joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserSetting {
    DailyGoal(String),
    Triggers(Vec<String>),
    Reasons(Vec<String>),
}

/// Storage key of a [`UserSetting`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    DailyGoal,
    Triggers,
    Reasons,
}

impl SettingKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::DailyGoal => "daily_goal",
            SettingKey::Triggers => "triggers",
            SettingKey::Reasons => "reasons",
        }
    }
}

impl UserSetting {
    pub fn key(&self) -> SettingKey {
        match self {
            UserSetting::DailyGoal(_) => SettingKey::DailyGoal,
            UserSetting::Triggers(_) => SettingKey::Triggers,
            UserSetting::Reasons(_) => SettingKey::Reasons,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            UserSetting::DailyGoal(goal) => goal.clone(),
            UserSetting::Triggers(items) | UserSetting::Reasons(items) => items.join(","),
        }
    }

    pub fn decode(key: SettingKey, raw: &str) -> Self {
        let list = || {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect::<Vec<_>>()
        };
        match key {
            SettingKey::DailyGoal => UserSetting::DailyGoal(raw.to_string()),
            SettingKey::Triggers => UserSetting::Triggers(list()),
            SettingKey::Reasons => UserSetting::Reasons(list()),
        }
    }

    /// Selected entries for list settings, empty for scalar ones.
    pub fn items(&self) -> &[String] {
        match self {
            UserSetting::Triggers(items) | UserSetting::Reasons(items) => items,
            UserSetting::DailyGoal(_) => &[],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminStats {
    pub total_users: u64,
    pub active_users_7d: u64,
    pub total_logs: u64,
    pub logs_7d: u64,
}

/// Structured per-user export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserExport {
    pub user: Option<User>,
    pub behaviors: Vec<BehaviorCode>,
    pub daily_logs: Vec<DailyLog>,
    pub settings: BTreeMap<String, String>,
    pub exported_at: DateTime<Utc>,
}

/// Row counts of every user-keyed table, for checking erasure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footprint {
    pub users: u64,
    pub tracked_behaviors: u64,
    pub daily_logs: u64,
    pub settings: u64,
    pub notifications: u64,
}

impl Footprint {
    pub fn is_empty(&self) -> bool {
        *self == Footprint::default()
    }
}
