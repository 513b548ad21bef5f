//! Static reference data: the behavior catalog and preset content lists.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// A category of activity a user can choose to track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorCode {
    Alcohol,
    Nicotine,
    Gambling,
    Porn,
    SocialMedia,
    Food,
    Substances,
    Other,
}

impl BehaviorCode {
    /// Catalog order, used for seeding and for selection keyboards.
    pub const ALL: [BehaviorCode; 8] = [
        BehaviorCode::Alcohol,
        BehaviorCode::Nicotine,
        BehaviorCode::Gambling,
        BehaviorCode::Porn,
        BehaviorCode::SocialMedia,
        BehaviorCode::Food,
        BehaviorCode::Substances,
        BehaviorCode::Other,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            BehaviorCode::Alcohol => "alcohol",
            BehaviorCode::Nicotine => "nicotine",
            BehaviorCode::Gambling => "gambling",
            BehaviorCode::Porn => "porn",
            BehaviorCode::SocialMedia => "social_media",
            BehaviorCode::Food => "food",
            BehaviorCode::Substances => "substances",
            BehaviorCode::Other => "other",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BehaviorCode::Alcohol => "🍷 Alcohol",
            BehaviorCode::Nicotine => "🚬 Nicotine",
            BehaviorCode::Gambling => "🎰 Gambling",
            BehaviorCode::Porn => "📵 Porn / compulsive sexual behavior",
            BehaviorCode::SocialMedia => "📱 Social media / scrolling",
            BehaviorCode::Food => "🍔 Food / overeating",
            BehaviorCode::Substances => "💊 Substances",
            BehaviorCode::Other => "📋 Other",
        }
    }
}

impl fmt::Display for BehaviorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for BehaviorCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BehaviorCode::ALL
            .iter()
            .copied()
            .find(|b| b.code() == s)
            .ok_or_else(|| ValidationError::UnknownBehavior(s.to_string()))
    }
}

/// Preset reminder slots offered during onboarding and in settings.
pub const REMINDER_TIMES: [&str; 6] = ["07:00", "09:00", "12:00", "18:00", "21:00", "23:00"];

/// Secondary reminder slot for users who asked for two reminders a day.
pub const SECOND_REMINDER_TIME: &str = "12:00";
/// Used instead of [`SECOND_REMINDER_TIME`] when the base reminder already sits there.
pub const SECOND_REMINDER_ALT_TIME: &str = "18:00";

/// Reminder texts seeded into the template table on first start.
pub const SUPPORT_MESSAGES: [&str; 15] = [
    "If today was hard, note it anyway. The data shows the trend.",
    "A small check-in today is an investment in tomorrow.",
    "Tracking helps you notice patterns.",
    "Every day is data. Even the difficult ones matter.",
    "Time to fill in your daily report. It takes less than a minute.",
    "Today's check-in will help you see your progress.",
    "Consistency matters more than perfect results.",
    "A relapse is information too. Log it and keep going.",
    "Your data is your tool.",
    "Even on hard days a check-in keeps you aware.",
    "Tracking is observation, not judgement.",
    "One day at a time.",
    "No judgement, just data.",
    "Tracking is a way of taking care of yourself.",
    "Time for your daily check-in.",
];

/// Number of seeded messages used when every template has been disabled.
pub const FALLBACK_TEMPLATE_COUNT: usize = 5;

pub const DAILY_GOALS: [&str; 7] = [
    "Hold on for 24 hours",
    "Avoid known triggers",
    "Call someone close",
    "Walk for at least 20 minutes",
    "Go to bed on time",
    "Drink enough water",
    "Don't stay alone",
];

pub const COMMON_TRIGGERS: [&str; 10] = [
    "Stress at work",
    "Relationship conflicts",
    "Loneliness",
    "Boredom",
    "Fatigue",
    "A certain time of day",
    "Certain places",
    "Certain people",
    "Money problems",
    "Holidays / weekends",
];

pub const REASONS: [&str; 10] = [
    "Health",
    "Family",
    "Work / career",
    "Finances",
    "Self-respect",
    "Relationships",
    "Physical shape",
    "Clear thinking",
    "Future goals",
    "Children",
];
