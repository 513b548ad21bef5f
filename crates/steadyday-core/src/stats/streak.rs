//! Clean-day streaks.
//!
//! A streak counts consecutive *logged* clean days, newest first, and stops
//! at the first non-clean row. Days without a log are not rows, so a gap in
//! logging does not break a streak.

use serde::{Deserialize, Serialize};

use crate::catalog::BehaviorCode;
use crate::model::{DailyLog, LogStatus};

const BAR_CELLS: u32 = 10;

/// Leading clean rows of `history`, which must be ordered newest first.
pub fn streak_from_history(history: &[DailyLog]) -> u32 {
    history
        .iter()
        .take_while(|log| log.status == LogStatus::Clean)
        .count() as u32
}

/// Ten-cell progress bar, saturating at ten days.
pub fn streak_bar(days: u32) -> String {
    let filled = days.min(BAR_CELLS) as usize;
    let empty = BAR_CELLS as usize - filled;
    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakLine {
    pub behavior: BehaviorCode,
    pub days: u32,
}

impl StreakLine {
    pub fn render(&self) -> String {
        let name = self.behavior.display_name();
        match self.days {
            0 => format!("{name}: start today"),
            1 => format!("{name}: {} 1 day", streak_bar(1)),
            n => format!("{name}: {} {n} days", streak_bar(n)),
        }
    }
}
