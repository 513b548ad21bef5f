//! Read-only views derived from the daily logs.
//!
//! The pure builders live in the submodules; the functions here fetch what
//! they need from the [`Store`] for one user and a given local "today".

pub mod calendar;
pub mod period;
pub mod streak;

pub use calendar::{CalendarDay, CalendarWindow, DEFAULT_CALENDAR_DAYS};
pub use period::{PeriodStats, StatusCounts};
pub use streak::{streak_bar, streak_from_history, StreakLine};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::catalog::BehaviorCode;
use crate::error::Result;
use crate::model::{CravingLevel, LogStatus};
use crate::storage::Store;

/// Current clean streak for one behavior.
pub async fn streak(store: &Store, user_id: i64, behavior: BehaviorCode) -> Result<u32> {
    let history = store.behavior_history(user_id, behavior).await?;
    Ok(streak_from_history(&history))
}

/// Streaks for every tracked behavior.
pub async fn streaks(store: &Store, user_id: i64) -> Result<Vec<StreakLine>> {
    let mut lines = Vec::new();
    for behavior in store.tracked_behaviors(user_id).await? {
        let days = streak(store, user_id, behavior).await?;
        lines.push(StreakLine { behavior, days });
    }
    Ok(lines)
}

/// The last `days` local dates ending at `today`.
pub async fn calendar_window(
    store: &Store,
    user_id: i64,
    today: NaiveDate,
    days: u32,
) -> Result<CalendarWindow> {
    let behaviors = store.tracked_behaviors(user_id).await?;
    let start = window_start(today, days);
    let logs = store.logs_for_period(user_id, start, today).await?;
    Ok(CalendarWindow::build(&logs, &behaviors, today, days))
}

pub async fn period_stats(
    store: &Store,
    user_id: i64,
    today: NaiveDate,
    days: u32,
) -> Result<PeriodStats> {
    let behaviors = store.tracked_behaviors(user_id).await?;
    let logs = store
        .logs_for_period(user_id, window_start(today, days), today)
        .await?;
    Ok(PeriodStats::build(&logs, &behaviors, days))
}

fn window_start(today: NaiveDate, days: u32) -> NaiveDate {
    today - Duration::days(i64::from(days.max(1)) - 1)
}

/// One line of the "today's report is already filled" summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub behavior: BehaviorCode,
    pub status: Option<LogStatus>,
    pub craving: Option<CravingLevel>,
}

impl SummaryRow {
    pub fn render(&self) -> String {
        let status = self.status.map_or('-', |s| s.mark());
        let craving = self.craving.map(|c| c.arrow().to_string()).unwrap_or_default();
        format!("{}: {} {}", self.behavior.display_name(), status, craving)
            .trim_end()
            .to_string()
    }
}

/// Today's logs for each tracked behavior, and whether every one is present.
pub async fn report_summary(
    store: &Store,
    user_id: i64,
    date: NaiveDate,
) -> Result<(Vec<SummaryRow>, bool)> {
    let behaviors = store.tracked_behaviors(user_id).await?;
    let logs = store.logs_for_date(user_id, date).await?;
    let rows: Vec<SummaryRow> = behaviors
        .iter()
        .map(|b| {
            let log = logs.iter().find(|l| l.behavior == *b);
            SummaryRow {
                behavior: *b,
                status: log.map(|l| l.status),
                craving: log.and_then(|l| l.craving),
            }
        })
        .collect();
    let complete = !rows.is_empty() && rows.iter().all(|r| r.status.is_some());
    Ok((rows, complete))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_start_is_inclusive() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 10).unwrap();
        assert_eq!(window_start(today, 7), NaiveDate::from_ymd_opt(2026, 8, 4).unwrap());
        assert_eq!(window_start(today, 1), today);
        assert_eq!(window_start(today, 0), today);
    }

    #[test]
    fn summary_row_marks() {
        let row = SummaryRow {
            behavior: BehaviorCode::Alcohol,
            status: Some(LogStatus::Clean),
            craving: Some(CravingLevel::High),
        };
        assert!(row.render().ends_with("✓ ↑"));
        let row = SummaryRow {
            behavior: BehaviorCode::Alcohol,
            status: None,
            craving: None,
        };
        assert!(row.render().ends_with(": -"));
    }
}
