//! Wording and keyboards for every screen the core can produce.

use steadyday_core::catalog::{BehaviorCode, COMMON_TRIGGERS, DAILY_GOALS, REASONS, REMINDER_TIMES};
use steadyday_core::conversation::action::{
    Action, AdminAction, Menu, OnboardStep, ProgressView, ReportAction, SettingsAction, ToolKind,
};
use steadyday_core::conversation::screen::{template_page, template_pages};
use steadyday_core::conversation::SelectionPurpose;
use steadyday_core::messenger::{Button, Keyboard};
use steadyday_core::model::{CravingLevel, LogStatus, Template};
use steadyday_core::{DocumentKind, Notice, Screen};

/// Longest template excerpt shown on a toggle button.
const TEMPLATE_LABEL_CHARS: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    pub keyboard: Keyboard,
}

impl Rendered {
    fn new(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: text.into(),
            keyboard,
        }
    }

    fn plain(text: impl Into<String>) -> Self {
        Self::new(text, Keyboard::new())
    }

    /// The keyboard, or `None` when there are no buttons.
    pub fn markup(&self) -> Option<&Keyboard> {
        (!self.keyboard.is_empty()).then_some(&self.keyboard)
    }
}

const WELCOME: &str = "👋 Hello!\n\n\
    This is a tool for daily self-tracking while working on habits and addictions.\n\n\
    • Your data is stored locally\n\
    • You can track several behaviors\n\
    • Nothing is shared with third parties\n\n\
    ⚠️ This bot does not replace professional help.";

const PRIVACY: &str = "🔒 Privacy\n\n\
    • Data is kept in a local database\n\
    • Your Telegram ID is used only to identify you\n\
    • Nothing is shared with third parties\n\
    • You can delete everything at any time";

const RELAPSE_SUPPORT: &str = "💙 A relapse is not the end of the road.\n\n\
    What matters right now:\n\
    1. Take a pause\n\
    2. Breathe (in for 4s, hold for 4s, out for 6s)\n\
    3. Make a plan for the next hour";

const EMERGENCY: &str = "🆘 Emergency support\n\n\
    1. Pause. Breathe slowly.\n\
    2. Remove access to the trigger if you can.\n\
    3. Reach out to someone you trust.\n\
    4. If you are in danger, call emergency services.\n\n\
    ⚠️ This bot does not replace professional help.";

const BREATHING: &str = "🌬 Breathing (2 minutes)\n\n\
    • In for 4 seconds\n\
    • Hold for 4 seconds\n\
    • Out for 6 seconds\n\n\
    Repeat 8 to 10 cycles.";

const PAUSE: &str = "⏸ 90-second pause\n\n\
    An urge usually loses intensity after about 90 seconds without reinforcement.\n\n\
    Just wait. Observe.";

const TEN_MINUTES: &str = "🚶 10-minute plan\n\n\
    • A short walk\n\
    • A glass of water\n\
    • Call someone\n\
    • 10 squats\n\
    • Take a shower\n\n\
    The goal is to shift your attention.";

const COGNITIVE: &str = "🧠 Reframe\n\n\
    Ask yourself:\n\
    • What am I feeling right now?\n\
    • Is this a fact or an interpretation?\n\
    • How will I feel in an hour?\n\
    • What would I tell a friend?";

const DISTRACTION: &str = "🔄 Switch focus\n\n\
    • Put on a song and listen to it to the end\n\
    • Wash the dishes or tidy one shelf\n\
    • Name five things you can see around you\n\
    • Step outside for fresh air";

const COPING: &str = "💪 When the urge hits\n\n\
    Pick one tool and use it right away. The urge will pass.";

pub fn screen(screen: &Screen) -> Rendered {
    match screen {
        Screen::Welcome => Rendered::new(
            WELCOME,
            Keyboard::new()
                .button("Continue →", Action::Onboard(OnboardStep::Continue))
                .button("🔒 Privacy", Action::Onboard(OnboardStep::Privacy))
                .button("🆘 Emergency help", Action::Menu(Menu::Emergency)),
        ),
        Screen::Privacy => Rendered::new(
            PRIVACY,
            Keyboard::new().button("← Back", Action::Onboard(OnboardStep::Back)),
        ),
        Screen::SelectBehaviors { selected, purpose } => Rendered::new(
            "Choose what you want to track.\nYou can pick several; tap to select or unselect.",
            behaviors_keyboard(selected, *purpose),
        ),
        Screen::SelectTime { .. } => {
            Rendered::new("⏰ Choose a reminder time", time_keyboard())
        }
        Screen::OnboardingComplete { admin } => Rendered::new(
            "✅ All set!\n\nReminders will arrive at the time you picked.",
            main_menu(*admin),
        ),
        Screen::MainMenu { admin } => Rendered::new("📋 Menu", main_menu(*admin)),

        Screen::ReportQuestion {
            behavior,
            index,
            total,
        } => Rendered::new(
            format!(
                "📝 Daily report ({}/{total})\n\nToday, for «{}»:",
                index + 1,
                behavior.display_name()
            ),
            Keyboard::new()
                .button("✓ No relapse", Action::Report(ReportAction::Status(LogStatus::Clean)))
                .button("✗ Relapse", Action::Report(ReportAction::Status(LogStatus::Relapse)))
                .button(
                    "? Hard to say",
                    Action::Report(ReportAction::Status(LogStatus::Unclear)),
                )
                .button("← Cancel", Action::Report(ReportAction::Cancel)),
        ),
        Screen::RelapseSupport { .. } => Rendered::new(
            RELAPSE_SUPPORT,
            Keyboard::new()
                .button("🆘 Support", Action::Menu(Menu::Emergency))
                .button("🌬 Breathing", Action::Tool(ToolKind::Breathing))
                .button("→ Continue", Action::Report(ReportAction::Continue)),
        ),
        Screen::CravingQuestion => Rendered::new(
            "How strong was the craving today?",
            Keyboard::new()
                .row(vec![
                    Button::new("Low", craving(CravingLevel::Low)),
                    Button::new("Medium", craving(CravingLevel::Medium)),
                    Button::new("High", craving(CravingLevel::High)),
                ])
                .button("Skip", Action::Report(ReportAction::Craving(None))),
        ),
        Screen::SupportNeedQuestion => Rendered::new(
            "Do you need support right now?",
            Keyboard::new().row(vec![
                Button::new("Yes", Action::Report(ReportAction::Support(true))),
                Button::new("No", Action::Report(ReportAction::Support(false))),
            ]),
        ),
        Screen::ReportSaved { admin } => Rendered::new(
            "✅ Report saved.\n\nThis data will help you see the trend.",
            main_menu(*admin),
        ),
        Screen::ReportSummary { rows } => {
            let mut text = String::from("📊 Today's report is already filled in:\n");
            for row in rows {
                text.push('\n');
                text.push_str(&row.render());
            }
            Rendered::new(
                text,
                Keyboard::new()
                    .button("✏️ Edit", Action::Report(ReportAction::Edit))
                    .button("📈 History", Action::Menu(Menu::Progress))
                    .button("← Menu", Action::Menu(Menu::Main)),
            )
        }
        Screen::Emergency => Rendered::new(EMERGENCY, emergency_keyboard()),

        Screen::Tools => Rendered::new(
            "🧰 Tools",
            Keyboard::new()
                .button("🌬 Breathing", Action::Tool(ToolKind::Breathing))
                .button("⏸ 90-second pause", Action::Tool(ToolKind::Pause))
                .button("🧠 Reframe", Action::Tool(ToolKind::Cognitive))
                .button("💭 My reasons", Action::OpenReasons)
                .button("← Menu", Action::Menu(Menu::Main)),
        ),
        Screen::Tool(kind) => Rendered::new(
            tool_text(*kind),
            Keyboard::new().button("← Back", Action::Menu(Menu::Tools)),
        ),
        Screen::Reasons { selected } => Rendered::new(
            "💭 Why does this matter to you? Pick your reasons.",
            checklist(&REASONS, selected, Action::ToggleReason)
                .row(vec![
                    Button::new("✓ Save", Action::SaveReasons),
                    Button::new("← Back", Action::Menu(Menu::Tools)),
                ]),
        ),
        Screen::ReasonsSaved { reasons } => Rendered::new(
            if reasons.is_empty() {
                "💭 No reasons selected.".to_string()
            } else {
                format!("💭 Your reasons:\n\n{}", bullets(reasons))
            },
            Keyboard::new().button("← Back", Action::Menu(Menu::Tools)),
        ),

        Screen::Progress => Rendered::new(
            "📈 Progress",
            Keyboard::new()
                .button("📊 7 days", Action::Progress(ProgressView::Week))
                .button("🔥 Streaks", Action::Progress(ProgressView::Streaks))
                .button("📅 Calendar", Action::Progress(ProgressView::Calendar))
                .button("💾 Export", Action::Progress(ProgressView::Export))
                .button("← Menu", Action::Menu(Menu::Main)),
        ),
        Screen::Week(stats) => Rendered::new(stats.render(), back_to_progress()),
        Screen::Streaks(lines) => {
            let text = if lines.is_empty() {
                "No data yet.".to_string()
            } else {
                let body: Vec<String> = lines.iter().map(|l| l.render()).collect();
                format!("🔥 Streaks\n\n{}", body.join("\n\n"))
            };
            Rendered::new(text, back_to_progress())
        }
        Screen::Calendar(window) => Rendered::new(window.render(), back_to_progress()),

        Screen::Plan => Rendered::new(
            "📅 Plan",
            Keyboard::new()
                .button("🎯 Goal for the day", Action::PlanGoal)
                .button("💪 When the urge hits", Action::PlanCoping)
                .button("⚠️ My triggers", Action::PlanTriggers)
                .button("← Menu", Action::Menu(Menu::Main)),
        ),
        Screen::GoalSelection { current } => {
            let mut keyboard = Keyboard::new();
            for (i, goal) in DAILY_GOALS.iter().enumerate() {
                let mark = if current.as_deref() == Some(*goal) { "●" } else { "○" };
                keyboard = keyboard.button(format!("{mark} {goal}"), Action::SelectGoal(i));
            }
            Rendered::new(
                "🎯 Pick a goal for today",
                keyboard.button("← Back", Action::Menu(Menu::Plan)),
            )
        }
        Screen::GoalSet { goal } => Rendered::new(
            format!("🎯 Today's goal: {goal}"),
            Keyboard::new().button("← Back", Action::Menu(Menu::Plan)),
        ),
        Screen::Coping => Rendered::new(
            COPING,
            Keyboard::new()
                .button("🌬 Breathing", Action::Tool(ToolKind::Breathing))
                .button("🚶 10-minute plan", Action::Tool(ToolKind::TenMinutes))
                .button("🔄 Switch focus", Action::Tool(ToolKind::Distraction))
                .button("💭 My reasons", Action::OpenReasons)
                .button("← Back", Action::Menu(Menu::Plan)),
        ),
        Screen::Triggers { selected } => Rendered::new(
            "⚠️ What usually sets off the urge? Pick your triggers.",
            checklist(&COMMON_TRIGGERS, selected, Action::ToggleTrigger).row(vec![
                Button::new("✓ Save", Action::SaveTriggers),
                Button::new("← Back", Action::Menu(Menu::Plan)),
            ]),
        ),
        Screen::TriggersSaved => Rendered::new(
            "✅ Triggers saved.",
            Keyboard::new().button("← Back", Action::Menu(Menu::Plan)),
        ),

        Screen::Settings => Rendered::new("⚙️ Settings", settings_keyboard()),
        Screen::NotificationSettings { enabled, frequency } => {
            let status = if *enabled { "On" } else { "Off" };
            let dot = |n: u8| if *frequency == n { "●" } else { "○" };
            Rendered::new(
                "🔔 Reminders",
                Keyboard::new()
                    .button(
                        format!("🔔 Reminders: {status}"),
                        Action::Settings(SettingsAction::ToggleNotifications),
                    )
                    .row(vec![
                        Button::new(
                            format!("{} once a day", dot(1)),
                            Action::Settings(SettingsAction::Frequency(1)),
                        ),
                        Button::new(
                            format!("{} twice a day", dot(2)),
                            Action::Settings(SettingsAction::Frequency(2)),
                        ),
                    ])
                    .button("← Back", Action::Menu(Menu::Settings)),
            )
        }
        Screen::ReminderTimeSet { time } => Rendered::new(
            format!("⏰ Reminders will now arrive at {time}."),
            settings_keyboard(),
        ),
        Screen::BehaviorsSaved => Rendered::new("✅ Tracked behaviors updated.", settings_keyboard()),
        Screen::DeleteConfirm => Rendered::new(
            "⚠️ Delete all your data?\nThis cannot be undone.",
            Keyboard::new().row(vec![
                Button::new("Yes, delete", Action::Settings(SettingsAction::ConfirmDelete)),
                Button::new("Cancel", Action::Menu(Menu::Settings)),
            ]),
        ),
        Screen::DataDeleted => {
            Rendered::plain("🗑 Your data has been deleted.\n\nSend /start to begin again.")
        }
        Screen::TimezoneSet {
            timezone,
            local_time,
        } => Rendered::plain(format!(
            "🌍 Timezone set to {timezone}.\nYour local time is {local_time}."
        )),
        Screen::TimezoneUsage { current } => Rendered::plain(format!(
            "🌍 Current timezone: {current}\n\n\
             To change it, send /timezone followed by an IANA name, \
             for example /timezone Europe/Berlin"
        )),

        Screen::Admin => Rendered::new("🔐 Admin panel", admin_keyboard()),
        Screen::AdminStats(stats) => Rendered::new(
            format!(
                "📊 Statistics\n\n\
                 Users: {}\nActive in 7 days: {}\nReports: {}\nReports in 7 days: {}",
                stats.total_users, stats.active_users_7d, stats.total_logs, stats.logs_7d
            ),
            back_to_admin(),
        ),
        Screen::SchedulerStatus(status) => {
            let when = |t: Option<chrono::DateTime<chrono::Utc>>| {
                t.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| "-".into())
            };
            Rendered::new(
                format!(
                    "⚙️ Scheduler\n\n\
                     Running: {}\nInterval: {}s\nLast tick: {}\nNext tick: {}\n\
                     Bot time: {} ({})\nUsers with reminders: {}",
                    if status.running { "yes" } else { "no" },
                    status.interval_secs,
                    when(status.last_tick),
                    when(status.next_tick),
                    status.bot_time,
                    status.timezone,
                    status.enabled_users
                ),
                back_to_admin(),
            )
        }
        Screen::BroadcastPrompt => Rendered::new(
            "📢 Send the text of the broadcast.",
            Keyboard::new().button("← Cancel", Action::Menu(Menu::Admin)),
        ),
        Screen::BroadcastConfirm { text } => Rendered::new(
            format!("Send this broadcast to everyone?\n\n{text}"),
            Keyboard::new().row(vec![
                Button::new("✓ Send", Action::Admin(AdminAction::ConfirmBroadcast)),
                Button::new("Cancel", Action::Menu(Menu::Admin)),
            ]),
        ),
        Screen::BroadcastStarted { recipients } => Rendered::new(
            format!("📢 Broadcast started for {recipients} users. A summary follows when it is done."),
            back_to_admin(),
        ),
        Screen::Templates { templates, page } => Rendered::new(
            templates_text(templates),
            templates_keyboard(templates, *page),
        ),
        Screen::TemplatePrompt => Rendered::new(
            "📝 Send the text of the new reminder template.",
            Keyboard::new().button("← Cancel", Action::Admin(AdminAction::Templates(0))),
        ),
        Screen::TemplateAdded { templates } => Rendered::new(
            format!("✅ Template added.\n\n{}", templates_text(templates)),
            templates_keyboard(templates, 0),
        ),
        Screen::PermissionDenied => Rendered::plain("⛔ Access denied."),

        Screen::SessionExpired { onboarded, admin } => {
            if *onboarded {
                Rendered::new("Session expired. Back to the menu.", main_menu(*admin))
            } else {
                Rendered::plain("Session expired. Send /start to begin.")
            }
        }
        Screen::Failure { admin } => Rendered::new(
            "Something went wrong. Please try again.",
            main_menu(*admin),
        ),
        Screen::Pong => Rendered::plain("pong"),
    }
}

pub fn notice(notice: Notice) -> &'static str {
    match notice {
        Notice::SelectAtLeastOne => "Select at least one item.",
        Notice::NoTrackedBehaviors => "You are not tracking anything yet. Pick behaviors in Settings.",
        Notice::EmptyText => "The text is empty. Send it again.",
        Notice::TemplateExists => "This template already exists.",
    }
}

pub fn document_caption(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::UserExport => "💾 Your data export",
        DocumentKind::Backup => "💾 Database backup",
    }
}

fn main_menu(admin: bool) -> Keyboard {
    let keyboard = Keyboard::new()
        .button("📝 Report", Action::Menu(Menu::DailyReport))
        .button("📈 Progress", Action::Menu(Menu::Progress))
        .button("📅 Plan", Action::Menu(Menu::Plan))
        .button("🧰 Tools", Action::Menu(Menu::Tools))
        .button("⚙️ Settings", Action::Menu(Menu::Settings))
        .button("🆘 Help", Action::Menu(Menu::Emergency));
    if admin {
        keyboard.button("🔐 Admin", Action::Menu(Menu::Admin))
    } else {
        keyboard
    }
}

fn behaviors_keyboard(selected: &[BehaviorCode], purpose: SelectionPurpose) -> Keyboard {
    let mut keyboard = Keyboard::new();
    for code in BehaviorCode::ALL {
        let mark = if selected.contains(&code) { "✓" } else { "○" };
        keyboard = keyboard.button(
            format!("{mark} {}", code.display_name()),
            Action::ToggleBehavior(code),
        );
    }
    let back = match purpose {
        SelectionPurpose::Onboarding => Action::Onboard(OnboardStep::Back),
        SelectionPurpose::Settings => Action::Menu(Menu::Settings),
    };
    keyboard.row(vec![
        Button::new("← Back", back),
        Button::new("Done ✓", Action::BehaviorsDone),
    ])
}

fn time_keyboard() -> Keyboard {
    let mut keyboard = Keyboard::new();
    for chunk in REMINDER_TIMES.chunks(3) {
        keyboard = keyboard.row(
            chunk
                .iter()
                .map(|t| Button::new(*t, Action::SelectTime(t.to_string())))
                .collect(),
        );
    }
    keyboard.button("← Back", Action::TimeBack)
}

fn craving(level: CravingLevel) -> Action {
    Action::Report(ReportAction::Craving(Some(level)))
}

fn emergency_keyboard() -> Keyboard {
    Keyboard::new()
        .button("🌬 Breathing", Action::Tool(ToolKind::Breathing))
        .button("🚶 10-minute plan", Action::Tool(ToolKind::TenMinutes))
        .button("⏸ 90-second pause", Action::Tool(ToolKind::Pause))
        .button("← Menu", Action::Menu(Menu::Main))
}

fn tool_text(kind: ToolKind) -> &'static str {
    match kind {
        ToolKind::Breathing => BREATHING,
        ToolKind::Pause => PAUSE,
        ToolKind::TenMinutes => TEN_MINUTES,
        ToolKind::Cognitive => COGNITIVE,
        ToolKind::Distraction => DISTRACTION,
    }
}

/// One toggle button per list item, marked when its index is selected.
fn checklist(items: &[&str], selected: &[usize], action: fn(usize) -> Action) -> Keyboard {
    let mut keyboard = Keyboard::new();
    for (i, item) in items.iter().enumerate() {
        let mark = if selected.contains(&i) { "✓" } else { "○" };
        keyboard = keyboard.button(format!("{mark} {item}"), action(i));
    }
    keyboard
}

fn bullets(items: &[String]) -> String {
    items
        .iter()
        .map(|i| format!("• {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn back_to_progress() -> Keyboard {
    Keyboard::new().button("← Back", Action::Menu(Menu::Progress))
}

fn back_to_admin() -> Keyboard {
    Keyboard::new().button("← Back", Action::Menu(Menu::Admin))
}

fn settings_keyboard() -> Keyboard {
    Keyboard::new()
        .button("📋 Tracked behaviors", Action::Settings(SettingsAction::Behaviors))
        .button("⏰ Reminder time", Action::Settings(SettingsAction::ReminderTime))
        .button("🔔 Reminders", Action::Settings(SettingsAction::Notifications))
        .button("🗑 Delete my data", Action::Settings(SettingsAction::Delete))
        .button("← Menu", Action::Menu(Menu::Main))
}

fn admin_keyboard() -> Keyboard {
    Keyboard::new()
        .button("📊 Statistics", Action::Admin(AdminAction::Stats))
        .button("💾 Download database", Action::Admin(AdminAction::Export))
        .button("📢 Broadcast", Action::Admin(AdminAction::Broadcast))
        .button("📝 Templates", Action::Admin(AdminAction::Templates(0)))
        .button("⚙️ Scheduler", Action::Admin(AdminAction::Scheduler))
        .button("← Menu", Action::Menu(Menu::Main))
}

fn templates_text(templates: &[Template]) -> String {
    let active = templates.iter().filter(|t| t.active).count();
    format!(
        "📝 Reminder templates: {} ({active} active)\nTap a template to switch it on or off.",
        templates.len()
    )
}

fn templates_keyboard(templates: &[Template], page: usize) -> Keyboard {
    let mut keyboard = Keyboard::new();
    for template in template_page(templates, page) {
        let status = if template.active { "●" } else { "○" };
        keyboard = keyboard.button(
            format!("{status} {}", excerpt(&template.text)),
            Action::Admin(AdminAction::ToggleTemplate(template.id)),
        );
    }
    let mut nav = Vec::new();
    if page > 0 {
        nav.push(Button::new("◀", Action::Admin(AdminAction::Templates(page - 1))));
    }
    if page + 1 < template_pages(templates.len()) {
        nav.push(Button::new("▶", Action::Admin(AdminAction::Templates(page + 1))));
    }
    keyboard
        .row(nav)
        .button("+ Add", Action::Admin(AdminAction::AddTemplate))
        .button("← Back", Action::Menu(Menu::Admin))
}

fn excerpt(text: &str) -> String {
    if text.chars().count() > TEMPLATE_LABEL_CHARS {
        let cut: String = text.chars().take(TEMPLATE_LABEL_CHARS).collect();
        format!("{cut}…")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steadyday_core::model::AdminStats;

    fn templates(n: usize) -> Vec<Template> {
        (0..n)
            .map(|i| Template {
                id: i as i64 + 1,
                text: format!("Template number {i} with a fairly long text"),
                active: i % 2 == 0,
            })
            .collect()
    }

    fn sample_screens() -> Vec<Screen> {
        vec![
            Screen::Welcome,
            Screen::Privacy,
            Screen::SelectBehaviors {
                selected: vec![BehaviorCode::Food],
                purpose: SelectionPurpose::Onboarding,
            },
            Screen::SelectBehaviors {
                selected: vec![],
                purpose: SelectionPurpose::Settings,
            },
            Screen::SelectTime {
                purpose: SelectionPurpose::Onboarding,
            },
            Screen::MainMenu { admin: true },
            Screen::ReportQuestion {
                behavior: BehaviorCode::Alcohol,
                index: 0,
                total: 2,
            },
            Screen::RelapseSupport {
                behavior: BehaviorCode::Alcohol,
            },
            Screen::CravingQuestion,
            Screen::SupportNeedQuestion,
            Screen::ReportSummary { rows: vec![] },
            Screen::Emergency,
            Screen::Tools,
            Screen::Tool(ToolKind::Distraction),
            Screen::Reasons { selected: vec![1] },
            Screen::Progress,
            Screen::Plan,
            Screen::GoalSelection { current: None },
            Screen::Coping,
            Screen::Triggers { selected: vec![0] },
            Screen::Settings,
            Screen::NotificationSettings {
                enabled: true,
                frequency: 2,
            },
            Screen::DeleteConfirm,
            Screen::Admin,
            Screen::AdminStats(AdminStats::default()),
            Screen::BroadcastConfirm { text: "hi".into() },
            Screen::BroadcastStarted { recipients: 3 },
            Screen::Templates {
                templates: templates(12),
                page: 1,
            },
            Screen::TemplatePrompt,
            Screen::SessionExpired {
                onboarded: true,
                admin: false,
            },
        ]
    }

    #[test]
    fn every_button_parses_back_into_an_action() {
        for s in sample_screens() {
            let rendered = screen(&s);
            assert!(!rendered.text.is_empty(), "{s:?}");
            for data in rendered.keyboard.callback_data() {
                assert!(data.parse::<Action>().is_ok(), "{data} on {s:?}");
                assert!(data.len() <= 64, "{data} exceeds the callback size limit");
            }
        }
    }

    #[test]
    fn admin_button_only_for_admin() {
        let has_admin = |admin| {
            screen(&Screen::MainMenu { admin })
                .keyboard
                .callback_data()
                .any(|d| d == "menu:admin")
        };
        assert!(has_admin(true));
        assert!(!has_admin(false));
    }

    #[test]
    fn template_paging_buttons() {
        let data: Vec<String> = screen(&Screen::Templates {
            templates: templates(12),
            page: 1,
        })
        .keyboard
        .callback_data()
        .map(String::from)
        .collect();
        assert!(data.contains(&"template:page:0".to_string()));
        assert!(data.contains(&"template:page:2".to_string()));
        assert_eq!(
            data.iter().filter(|d| d.starts_with("template:toggle:")).count(),
            5
        );
        assert_eq!(data[0], "template:toggle:6");
    }

    #[test]
    fn long_template_text_is_shortened() {
        assert_eq!(excerpt("short"), "short");
        let long = "x".repeat(40);
        assert_eq!(excerpt(&long).chars().count(), TEMPLATE_LABEL_CHARS + 1);
    }

    #[test]
    fn expired_without_onboarding_has_no_buttons() {
        let rendered = screen(&Screen::SessionExpired {
            onboarded: false,
            admin: false,
        });
        assert!(rendered.markup().is_none());
        assert!(rendered.text.contains("/start"));
    }
}
