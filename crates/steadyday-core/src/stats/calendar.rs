//! Per-day glyph grid over the last N local dates.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::catalog::BehaviorCode;
use crate::model::{DailyLog, LogStatus};

pub const DEFAULT_CALENDAR_DAYS: u32 = 14;

const NO_DATA: char = '·';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    /// One cell per tracked behavior, in the window's behavior order.
    pub cells: Vec<Option<LogStatus>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarWindow {
    pub behaviors: Vec<BehaviorCode>,
    /// Oldest first, ending at `today`.
    pub days: Vec<CalendarDay>,
}

impl CalendarWindow {
    pub fn build(
        logs: &[DailyLog],
        behaviors: &[BehaviorCode],
        today: NaiveDate,
        days: u32,
    ) -> Self {
        let by_key: HashMap<(NaiveDate, BehaviorCode), LogStatus> = logs
            .iter()
            .map(|l| ((l.date, l.behavior), l.status))
            .collect();

        let days = (0..days)
            .rev()
            .map(|back| {
                let date = today - Duration::days(i64::from(back));
                let cells = behaviors
                    .iter()
                    .map(|b| by_key.get(&(date, *b)).copied())
                    .collect();
                CalendarDay { date, cells }
            })
            .collect();

        Self {
            behaviors: behaviors.to_vec(),
            days,
        }
    }

    /// First day covered by the window.
    pub fn start(&self) -> Option<NaiveDate> {
        self.days.first().map(|d| d.date)
    }

    pub fn render(&self) -> String {
        let mut lines = vec![format!("📅 Last {} days:", self.days.len()), String::new()];
        for day in &self.days {
            let glyphs: Vec<String> = day
                .cells
                .iter()
                .map(|c| c.map_or(NO_DATA, |s| s.glyph()).to_string())
                .collect();
            lines.push(format!("{}: {}", day.date.format("%d.%m"), glyphs.join(" ")));
        }
        lines.push(String::new());
        lines.push("● clean  ✗ relapse  ? unclear  · no data".to_string());
        lines.join("\n")
    }
}
