//! Callback payloads carried by inline buttons.
//!
//! Each [`Action`] has one colon-separated wire form (`report:status:clean`,
//! `time:21:00`, ...). Payloads that do not parse are treated by the router
//! as stale buttons.

use std::fmt;
use std::str::FromStr;

use crate::catalog::BehaviorCode;
use crate::error::ValidationError;
use crate::model::{CravingLevel, LogStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Menu {
    Main,
    DailyReport,
    Progress,
    Plan,
    Tools,
    Settings,
    Emergency,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnboardStep {
    Continue,
    Privacy,
    /// Back to the welcome preview.
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportAction {
    Status(LogStatus),
    /// Acknowledge the relapse notice and move on.
    Continue,
    /// `None` means the craving question was skipped.
    Craving(Option<CravingLevel>),
    Support(bool),
    Edit,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressView {
    Week,
    Streaks,
    Calendar,
    Export,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Breathing,
    Pause,
    TenMinutes,
    Cognitive,
    Distraction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsAction {
    Behaviors,
    ReminderTime,
    Notifications,
    ToggleNotifications,
    Frequency(u8),
    Delete,
    ConfirmDelete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Stats,
    Export,
    Broadcast,
    ConfirmBroadcast,
    Templates(usize),
    ToggleTemplate(i64),
    AddTemplate,
    Scheduler,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Menu(Menu),
    Onboard(OnboardStep),
    ToggleBehavior(BehaviorCode),
    BehaviorsDone,
    SelectTime(String),
    TimeBack,
    Report(ReportAction),
    Progress(ProgressView),
    PlanGoal,
    PlanCoping,
    PlanTriggers,
    SelectGoal(usize),
    ToggleTrigger(usize),
    SaveTriggers,
    Tool(ToolKind),
    OpenReasons,
    ToggleReason(usize),
    SaveReasons,
    Settings(SettingsAction),
    Admin(AdminAction),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Menu(m) => {
                let name = match m {
                    Menu::Main => "main",
                    Menu::DailyReport => "daily_report",
                    Menu::Progress => "progress",
                    Menu::Plan => "plan",
                    Menu::Tools => "tools",
                    Menu::Settings => "settings",
                    Menu::Emergency => "emergency",
                    Menu::Admin => "admin",
                };
                write!(f, "menu:{name}")
            }
            Action::Onboard(step) => {
                let name = match step {
                    OnboardStep::Continue => "continue",
                    OnboardStep::Privacy => "privacy",
                    OnboardStep::Back => "back",
                };
                write!(f, "onboard:{name}")
            }
            Action::ToggleBehavior(code) => write!(f, "behavior:toggle:{code}"),
            Action::BehaviorsDone => f.write_str("behavior:done"),
            Action::SelectTime(time) => write!(f, "time:{time}"),
            Action::TimeBack => f.write_str("time:back"),
            Action::Report(r) => match r {
                ReportAction::Status(s) => write!(f, "report:status:{s}"),
                ReportAction::Continue => f.write_str("report:continue"),
                ReportAction::Craving(Some(c)) => write!(f, "report:craving:{c}"),
                ReportAction::Craving(None) => f.write_str("report:craving:skip"),
                ReportAction::Support(yes) => {
                    write!(f, "report:support:{}", if *yes { "yes" } else { "no" })
                }
                ReportAction::Edit => f.write_str("report:edit"),
                ReportAction::Cancel => f.write_str("report:cancel"),
            },
            Action::Progress(view) => {
                let name = match view {
                    ProgressView::Week => "7days",
                    ProgressView::Streaks => "streaks",
                    ProgressView::Calendar => "calendar",
                    ProgressView::Export => "export",
                };
                write!(f, "progress:{name}")
            }
            Action::PlanGoal => f.write_str("plan:goal"),
            Action::PlanCoping => f.write_str("plan:coping"),
            Action::PlanTriggers => f.write_str("plan:triggers"),
            Action::SelectGoal(i) => write!(f, "goal:select:{i}"),
            Action::ToggleTrigger(i) => write!(f, "trigger:toggle:{i}"),
            Action::SaveTriggers => f.write_str("trigger:save"),
            Action::Tool(kind) => {
                let name = match kind {
                    ToolKind::Breathing => "breathing",
                    ToolKind::Pause => "pause",
                    ToolKind::TenMinutes => "ten_minutes",
                    ToolKind::Cognitive => "cognitive",
                    ToolKind::Distraction => "distraction",
                };
                write!(f, "tool:{name}")
            }
            Action::OpenReasons => f.write_str("tool:reasons"),
            Action::ToggleReason(i) => write!(f, "reason:toggle:{i}"),
            Action::SaveReasons => f.write_str("reason:save"),
            Action::Settings(s) => match s {
                SettingsAction::Behaviors => f.write_str("settings:behaviors"),
                SettingsAction::ReminderTime => f.write_str("settings:reminder_time"),
                SettingsAction::Notifications => f.write_str("settings:notifications"),
                SettingsAction::ToggleNotifications => {
                    f.write_str("settings:notifications:toggle")
                }
                SettingsAction::Frequency(n) => write!(f, "settings:notifications:freq:{n}"),
                SettingsAction::Delete => f.write_str("settings:delete"),
                SettingsAction::ConfirmDelete => f.write_str("settings:delete:confirm"),
            },
            Action::Admin(a) => match a {
                AdminAction::Stats => f.write_str("admin:stats"),
                AdminAction::Export => f.write_str("admin:export"),
                AdminAction::Broadcast => f.write_str("admin:broadcast"),
                AdminAction::ConfirmBroadcast => f.write_str("broadcast:confirm"),
                AdminAction::Templates(page) => write!(f, "template:page:{page}"),
                AdminAction::ToggleTemplate(id) => write!(f, "template:toggle:{id}"),
                AdminAction::AddTemplate => f.write_str("template:add"),
                AdminAction::Scheduler => f.write_str("admin:scheduler"),
            },
        }
    }
}

fn invalid(data: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: "callback".into(),
        message: format!("unrecognised payload '{data}'"),
    }
}

impl FromStr for Action {
    type Err = ValidationError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = data.split(':').collect();
        let index = |s: &str| s.parse::<usize>().map_err(|_| invalid(data));

        let action = match parts.as_slice() {
            ["menu", name] => Action::Menu(match *name {
                "main" => Menu::Main,
                "daily_report" => Menu::DailyReport,
                "progress" => Menu::Progress,
                "plan" => Menu::Plan,
                "tools" => Menu::Tools,
                "settings" => Menu::Settings,
                "emergency" => Menu::Emergency,
                "admin" => Menu::Admin,
                _ => return Err(invalid(data)),
            }),
            ["onboard", "continue"] => Action::Onboard(OnboardStep::Continue),
            ["onboard", "privacy"] => Action::Onboard(OnboardStep::Privacy),
            ["onboard", "back"] => Action::Onboard(OnboardStep::Back),
            ["behavior", "toggle", code] => Action::ToggleBehavior(code.parse()?),
            ["behavior", "done"] => Action::BehaviorsDone,
            ["time", "back"] => Action::TimeBack,
            ["time", h, m] => Action::SelectTime(format!("{h}:{m}")),
            ["report", "status", status] => Action::Report(ReportAction::Status(status.parse()?)),
            ["report", "continue"] => Action::Report(ReportAction::Continue),
            ["report", "craving", "skip"] => Action::Report(ReportAction::Craving(None)),
            ["report", "craving", level] => {
                Action::Report(ReportAction::Craving(Some(level.parse()?)))
            }
            ["report", "support", "yes"] => Action::Report(ReportAction::Support(true)),
            ["report", "support", "no"] => Action::Report(ReportAction::Support(false)),
            ["report", "edit"] => Action::Report(ReportAction::Edit),
            ["report", "cancel"] => Action::Report(ReportAction::Cancel),
            ["progress", "7days"] => Action::Progress(ProgressView::Week),
            ["progress", "streaks"] => Action::Progress(ProgressView::Streaks),
            ["progress", "calendar"] => Action::Progress(ProgressView::Calendar),
            ["progress", "export"] => Action::Progress(ProgressView::Export),
            ["plan", "goal"] => Action::PlanGoal,
            ["plan", "coping"] => Action::PlanCoping,
            ["plan", "triggers"] => Action::PlanTriggers,
            ["goal", "select", i] => Action::SelectGoal(index(*i)?),
            ["trigger", "toggle", i] => Action::ToggleTrigger(index(*i)?),
            ["trigger", "save"] => Action::SaveTriggers,
            ["tool", "reasons"] => Action::OpenReasons,
            ["tool", name] => Action::Tool(match *name {
                "breathing" => ToolKind::Breathing,
                "pause" => ToolKind::Pause,
                "ten_minutes" => ToolKind::TenMinutes,
                "cognitive" => ToolKind::Cognitive,
                "distraction" => ToolKind::Distraction,
                _ => return Err(invalid(data)),
            }),
            ["reason", "toggle", i] => Action::ToggleReason(index(*i)?),
            ["reason", "save"] => Action::SaveReasons,
            ["settings", "behaviors"] => Action::Settings(SettingsAction::Behaviors),
            ["settings", "reminder_time"] => Action::Settings(SettingsAction::ReminderTime),
            ["settings", "notifications"] => Action::Settings(SettingsAction::Notifications),
            ["settings", "notifications", "toggle"] => {
                Action::Settings(SettingsAction::ToggleNotifications)
            }
            ["settings", "notifications", "freq", n] => Action::Settings(
                SettingsAction::Frequency(n.parse().map_err(|_| invalid(data))?),
            ),
            ["settings", "delete"] => Action::Settings(SettingsAction::Delete),
            ["settings", "delete", "confirm"] => Action::Settings(SettingsAction::ConfirmDelete),
            ["admin", "stats"] => Action::Admin(AdminAction::Stats),
            ["admin", "export"] => Action::Admin(AdminAction::Export),
            ["admin", "broadcast"] => Action::Admin(AdminAction::Broadcast),
            ["admin", "templates"] => Action::Admin(AdminAction::Templates(0)),
            ["admin", "scheduler"] => Action::Admin(AdminAction::Scheduler),
            ["broadcast", "confirm"] => Action::Admin(AdminAction::ConfirmBroadcast),
            ["template", "page", page] => Action::Admin(AdminAction::Templates(index(*page)?)),
            ["template", "toggle", id] => Action::Admin(AdminAction::ToggleTemplate(
                id.parse().map_err(|_| invalid(data))?,
            )),
            ["template", "add"] => Action::Admin(AdminAction::AddTemplate),
            _ => return Err(invalid(data)),
        };
        Ok(action)
    }
}
