//! Wall-clock access and per-user timezone resolution.
//!
//! Every per-day key in the store (daily logs, notification records) is a
//! date in the *user's* zone. [`TimezoneResolver`] is the single place that
//! turns a stored zone identifier into that date, substituting the process
//! default for anything the zone database does not know.

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use std::sync::Mutex;
use tracing::warn;

/// Minutes in a day; the ring on which reminder distances are measured.
pub const MINUTES_PER_DAY: u32 = 1440;

/// Source of "now". Injected so scheduler and flows are testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a settable instant.
#[derive(Debug)]
pub struct FixedClock {
    at: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { at: Mutex::new(at) }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        let mut guard = self.at.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = at;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.at.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.at.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Local wall-clock reading for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalNow {
    pub date: NaiveDate,
    pub hour: u32,
    pub minute: u32,
}

impl LocalNow {
    pub fn minute_of_day(&self) -> u32 {
        self.hour * 60 + self.minute
    }
}

/// Resolves IANA identifiers with a fallback zone.
#[derive(Debug, Clone)]
pub struct TimezoneResolver {
    default: Tz,
}

impl TimezoneResolver {
    pub fn new(default: Tz) -> Self {
        Self { default }
    }

    /// Build from a configured name; an unknown name falls back to UTC.
    pub fn from_name(name: &str) -> Self {
        match name.parse::<Tz>() {
            Ok(tz) => Self::new(tz),
            Err(_) => {
                warn!(timezone = name, "invalid default timezone, using UTC");
                Self::new(Tz::UTC)
            }
        }
    }

    pub fn default_zone(&self) -> Tz {
        self.default
    }

    /// Whether `id` names a zone in the database.
    pub fn is_valid(id: &str) -> bool {
        !id.is_empty() && id.parse::<Tz>().is_ok()
    }

    /// Zone for `id`, or the default zone with a warning. Never fails.
    pub fn resolve(&self, id: &str) -> Tz {
        if id.is_empty() {
            return self.default;
        }
        match id.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                warn!(timezone = id, fallback = %self.default.name(), "invalid timezone, using default");
                self.default
            }
        }
    }

    /// Canonical identifier to store for `id`.
    pub fn sanitize(&self, id: &str) -> String {
        self.resolve(id).name().to_string()
    }

    pub fn local_now(&self, id: &str, now: DateTime<Utc>) -> LocalNow {
        let local = now.with_timezone(&self.resolve(id));
        LocalNow {
            date: local.date_naive(),
            hour: local.hour(),
            minute: local.minute(),
        }
    }

    /// Date key for per-day uniqueness in the user's zone.
    pub fn local_date(&self, id: &str, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.resolve(id)).date_naive()
    }
}

impl Default for TimezoneResolver {
    fn default() -> Self {
        Self::new(chrono_tz::Europe::Moscow)
    }
}

/// Parse `HH:MM` into (hour, minute).
pub fn parse_hhmm(value: &str) -> Option<(u32, u32)> {
    let (h, m) = value.split_once(':')?;
    if m.contains(':') {
        return None;
    }
    let h: u32 = h.trim().parse().ok()?;
    let m: u32 = m.trim().parse().ok()?;
    (h <= 23 && m <= 59).then_some((h, m))
}

pub fn hhmm_to_minutes(value: &str) -> Option<u32> {
    parse_hhmm(value).map(|(h, m)| h * 60 + m)
}

/// Canonical zero-padded form, or `None` when unparsable.
pub fn normalize_hhmm(value: &str) -> Option<String> {
    parse_hhmm(value).map(|(h, m)| format!("{h:02}:{m:02}"))
}

/// Distance between two minute-of-day values on the 1440-minute ring.
pub fn minutes_diff(a: u32, b: u32) -> u32 {
    let d = a.abs_diff(b) % MINUTES_PER_DAY;
    d.min(MINUTES_PER_DAY - d)
}
