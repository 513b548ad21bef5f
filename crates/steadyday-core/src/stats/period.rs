use serde::{Deserialize, Serialize};

use crate::catalog::BehaviorCode;
use crate::model::{DailyLog, LogStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub clean: u32,
    pub relapse: u32,
    pub unclear: u32,
}

impl StatusCounts {
    fn bump(&mut self, status: LogStatus) {
        match status {
            LogStatus::Clean => self.clean += 1,
            LogStatus::Relapse => self.relapse += 1,
            LogStatus::Unclear => self.unclear += 1,
        }
    }
}

/// Status counts per tracked behavior over a window of days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodStats {
    pub days: u32,
    pub rows: Vec<(BehaviorCode, StatusCounts)>,
    /// Whether the window contained any log at all.
    pub has_data: bool,
}

impl PeriodStats {
    /// Logs for behaviors no longer tracked are ignored.
    pub fn build(logs: &[DailyLog], behaviors: &[BehaviorCode], days: u32) -> Self {
        let mut rows: Vec<(BehaviorCode, StatusCounts)> = behaviors
            .iter()
            .map(|b| (*b, StatusCounts::default()))
            .collect();
        for log in logs {
            if let Some((_, counts)) = rows.iter_mut().find(|(b, _)| *b == log.behavior) {
                counts.bump(log.status);
            }
        }
        Self {
            days,
            rows,
            has_data: !logs.is_empty(),
        }
    }

    pub fn render(&self) -> String {
        if !self.has_data {
            return "No data yet.".to_string();
        }
        let mut lines = vec![format!("📊 Last {} days:", self.days), String::new()];
        for (behavior, counts) in &self.rows {
            lines.push(format!("{}:", behavior.display_name()));
            lines.push(format!("  ● Clean: {}", counts.clean));
            lines.push(format!("  ✗ Relapses: {}", counts.relapse));
            if counts.unclear > 0 {
                lines.push(format!("  ? Unclear: {}", counts.unclear));
            }
            lines.push(String::new());
        }
        lines.join("\n").trim_end().to_string()
    }
}
