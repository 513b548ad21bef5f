//! What the bot shows in response to an inbound event.
//!
//! Screens carry data only. Wording and keyboards belong to the transport,
//! which turns each [`Screen`] into a message; the core only decides which
//! screen comes next.

use crate::catalog::BehaviorCode;
use crate::conversation::action::ToolKind;
use crate::conversation::onboarding::SelectionPurpose;
use crate::model::{AdminStats, Template};
use crate::scheduler::SchedulerStatus;
use crate::stats::{CalendarWindow, PeriodStats, StreakLine, SummaryRow};

/// Templates listed per page on the admin template screen.
pub const TEMPLATES_PER_PAGE: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    // Onboarding
    Welcome,
    Privacy,
    SelectBehaviors {
        selected: Vec<BehaviorCode>,
        purpose: SelectionPurpose,
    },
    SelectTime {
        purpose: SelectionPurpose,
    },
    OnboardingComplete {
        admin: bool,
    },

    MainMenu {
        admin: bool,
    },

    // Daily report
    ReportQuestion {
        behavior: BehaviorCode,
        index: usize,
        total: usize,
    },
    RelapseSupport {
        behavior: BehaviorCode,
    },
    CravingQuestion,
    SupportNeedQuestion,
    ReportSaved {
        admin: bool,
    },
    /// Today is already fully reported; offers an edit button.
    ReportSummary {
        rows: Vec<SummaryRow>,
    },
    Emergency,

    // Tools
    Tools,
    Tool(ToolKind),
    Reasons {
        selected: Vec<usize>,
    },
    ReasonsSaved {
        reasons: Vec<String>,
    },

    // Progress
    Progress,
    Week(PeriodStats),
    Streaks(Vec<StreakLine>),
    Calendar(CalendarWindow),

    // Plan
    Plan,
    GoalSelection {
        current: Option<String>,
    },
    GoalSet {
        goal: String,
    },
    Coping,
    Triggers {
        selected: Vec<usize>,
    },
    TriggersSaved,

    // Settings
    Settings,
    NotificationSettings {
        enabled: bool,
        frequency: u8,
    },
    ReminderTimeSet {
        time: String,
    },
    BehaviorsSaved,
    DeleteConfirm,
    DataDeleted,
    TimezoneSet {
        timezone: String,
        local_time: String,
    },
    TimezoneUsage {
        current: String,
    },

    // Admin
    Admin,
    AdminStats(AdminStats),
    SchedulerStatus(SchedulerStatus),
    BroadcastPrompt,
    BroadcastConfirm {
        text: String,
    },
    /// The broadcast runs in the background; the admin gets a summary later.
    BroadcastStarted {
        recipients: usize,
    },
    Templates {
        templates: Vec<Template>,
        page: usize,
    },
    TemplatePrompt,
    TemplateAdded {
        templates: Vec<Template>,
    },
    PermissionDenied,

    // Recovery
    /// Stale button or lost session; back to the menu, or the `/start`
    /// hint when the user has not finished onboarding.
    SessionExpired {
        onboarded: bool,
        admin: bool,
    },
    /// A store fault aborted the request.
    Failure {
        admin: bool,
    },
    Pong,
}

/// Short notice shown next to the current screen without replacing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    SelectAtLeastOne,
    NoTrackedBehaviors,
    EmptyText,
    TemplateExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    UserExport,
    Backup,
}

/// One outbound item produced for an inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Screen(Screen),
    Notice(Notice),
    Document {
        kind: DocumentKind,
        filename: String,
        content: Vec<u8>,
    },
}

impl From<Screen> for Reply {
    fn from(screen: Screen) -> Self {
        Reply::Screen(screen)
    }
}

impl From<Notice> for Reply {
    fn from(notice: Notice) -> Self {
        Reply::Notice(notice)
    }
}

/// Number of template pages, at least one.
pub fn template_pages(count: usize) -> usize {
    count.div_ceil(TEMPLATES_PER_PAGE).max(1)
}

/// Templates shown on `page`; empty past the end.
pub fn template_page(templates: &[Template], page: usize) -> &[Template] {
    let start = page.saturating_mul(TEMPLATES_PER_PAGE).min(templates.len());
    let end = (start + TEMPLATES_PER_PAGE).min(templates.len());
    &templates[start..end]
}
