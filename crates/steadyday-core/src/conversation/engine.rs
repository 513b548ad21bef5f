//! Per-user conversation sessions and action dispatch.
//!
//! Sessions live in memory only. A process restart drops them, and the next
//! button press on an old message resolves to [`Screen::SessionExpired`].
//! The store is touched when a flow completes or a setting is saved, never
//! while answers are still being collected.

use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::action::{Action, Menu, OnboardStep, ProgressView, ReportAction, SettingsAction};
use super::onboarding::{
    toggle, toggle_index, OnboardingEvent, OnboardingState, OnboardingStep, SelectionPurpose,
};
use super::report::{Prompt, ReportEvent, ReportSession, Transition};
use super::screen::{DocumentKind, Notice, Reply, Screen};
use crate::catalog::{BehaviorCode, COMMON_TRIGGERS, DAILY_GOALS, REASONS};
use crate::clock::TimezoneResolver;
use crate::error::Result;
use crate::model::{SettingKey, User, UserSetting};
use crate::stats::{self, DEFAULT_CALENDAR_DAYS};
use crate::storage::Store;

/// Days covered by the "last week" progress view.
pub const WEEK_DAYS: u32 = 7;

/// Transient per-user state between two inbound events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    Onboarding(OnboardingState),
    Report(ReportSession),
    EditingBehaviors { selected: Vec<BehaviorCode> },
    PickingTime,
    PickingTriggers { selected: Vec<usize> },
    PickingReasons { selected: Vec<usize> },
    ConfirmingDelete,
    ComposingBroadcast,
    ConfirmingBroadcast { text: String },
    ViewingTemplates { page: usize },
    AddingTemplate,
}

/// Who an event comes from, as seen after user refresh and the admin check.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user: User,
    pub admin: bool,
}

impl Caller {
    pub fn id(&self) -> i64 {
        self.user.id
    }

    fn expired(&self) -> Vec<Reply> {
        vec![Screen::SessionExpired {
            onboarded: self.user.onboarded,
            admin: self.admin,
        }
        .into()]
    }

    fn main_menu(&self) -> Screen {
        Screen::MainMenu { admin: self.admin }
    }
}

pub struct ConversationEngine {
    store: Store,
    sessions: Mutex<HashMap<i64, Session>>,
}

impl ConversationEngine {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    // ── Session map ──────────────────────────────────────────────────────

    pub async fn session(&self, user_id: i64) -> Option<Session> {
        self.sessions.lock().await.get(&user_id).cloned()
    }

    pub async fn set_session(&self, user_id: i64, session: Session) {
        self.sessions.lock().await.insert(user_id, session);
    }

    pub async fn take_session(&self, user_id: i64) -> Option<Session> {
        self.sessions.lock().await.remove(&user_id)
    }

    pub async fn clear(&self, user_id: i64) {
        if self.sessions.lock().await.remove(&user_id).is_some() {
            debug!(user_id, "session cleared");
        }
    }

    // ── Entry points ─────────────────────────────────────────────────────

    /// `/start` and `/menu`: drop any session, then onboarding or the menu.
    pub async fn restart(&self, caller: &Caller) -> Vec<Reply> {
        self.clear(caller.id()).await;
        if caller.user.onboarded {
            vec![caller.main_menu().into()]
        } else {
            self.set_session(caller.id(), Session::Onboarding(OnboardingState::Preview))
                .await;
            vec![Screen::Welcome.into()]
        }
    }

    /// Handle one non-admin action.
    ///
    /// # Errors
    /// Store faults abort the action and propagate; invalid transitions do
    /// not, they resolve to the expired-session screen.
    pub async fn handle(&self, caller: &Caller, action: Action) -> Result<Vec<Reply>> {
        match action {
            Action::Onboard(step) => self.onboard(caller, step).await,
            Action::ToggleBehavior(code) => self.toggle_behavior(caller, code).await,
            Action::BehaviorsDone => self.behaviors_done(caller).await,
            Action::SelectTime(time) => self.select_time(caller, time).await,
            Action::TimeBack => self.time_back(caller).await,
            _ if !caller.user.onboarded => {
                self.clear(caller.id()).await;
                Ok(caller.expired())
            }
            Action::Menu(menu) => self.menu(caller, menu).await,
            Action::Report(report) => self.report(caller, report).await,
            Action::Progress(view) => self.progress(caller, view).await,
            Action::PlanGoal => {
                let current = self
                    .store
                    .get_setting(caller.id(), SettingKey::DailyGoal)
                    .await?
                    .map(|s| s.encode())
                    .filter(|g| !g.is_empty());
                Ok(vec![Screen::GoalSelection { current }.into()])
            }
            Action::SelectGoal(index) => {
                let Some(goal) = DAILY_GOALS.get(index) else {
                    return Ok(caller.expired());
                };
                self.store
                    .set_setting(caller.id(), &UserSetting::DailyGoal(goal.to_string()))
                    .await?;
                Ok(vec![Screen::GoalSet {
                    goal: goal.to_string(),
                }
                .into()])
            }
            Action::PlanCoping => Ok(vec![Screen::Coping.into()]),
            Action::PlanTriggers => {
                let selected = self
                    .load_indexes(caller.id(), SettingKey::Triggers, &COMMON_TRIGGERS)
                    .await?;
                self.set_session(
                    caller.id(),
                    Session::PickingTriggers {
                        selected: selected.clone(),
                    },
                )
                .await;
                Ok(vec![Screen::Triggers { selected }.into()])
            }
            Action::ToggleTrigger(index) => {
                let Some(Session::PickingTriggers { mut selected }) =
                    self.take_session(caller.id()).await
                else {
                    return Ok(caller.expired());
                };
                if index < COMMON_TRIGGERS.len() {
                    toggle_index(&mut selected, index);
                }
                self.set_session(
                    caller.id(),
                    Session::PickingTriggers {
                        selected: selected.clone(),
                    },
                )
                .await;
                Ok(vec![Screen::Triggers { selected }.into()])
            }
            Action::SaveTriggers => {
                let Some(Session::PickingTriggers { selected }) =
                    self.take_session(caller.id()).await
                else {
                    return Ok(caller.expired());
                };
                let names = pick(&COMMON_TRIGGERS, &selected);
                self.store
                    .set_setting(caller.id(), &UserSetting::Triggers(names))
                    .await?;
                Ok(vec![Screen::TriggersSaved.into()])
            }
            Action::Tool(kind) => Ok(vec![Screen::Tool(kind).into()]),
            Action::OpenReasons => {
                let selected = self
                    .load_indexes(caller.id(), SettingKey::Reasons, &REASONS)
                    .await?;
                self.set_session(
                    caller.id(),
                    Session::PickingReasons {
                        selected: selected.clone(),
                    },
                )
                .await;
                Ok(vec![Screen::Reasons { selected }.into()])
            }
            Action::ToggleReason(index) => {
                let Some(Session::PickingReasons { mut selected }) =
                    self.take_session(caller.id()).await
                else {
                    return Ok(caller.expired());
                };
                if index < REASONS.len() {
                    toggle_index(&mut selected, index);
                }
                self.set_session(
                    caller.id(),
                    Session::PickingReasons {
                        selected: selected.clone(),
                    },
                )
                .await;
                Ok(vec![Screen::Reasons { selected }.into()])
            }
            Action::SaveReasons => {
                let Some(Session::PickingReasons { selected }) =
                    self.take_session(caller.id()).await
                else {
                    return Ok(caller.expired());
                };
                let reasons = pick(&REASONS, &selected);
                self.store
                    .set_setting(caller.id(), &UserSetting::Reasons(reasons.clone()))
                    .await?;
                Ok(vec![Screen::ReasonsSaved { reasons }.into()])
            }
            Action::Settings(settings) => self.settings(caller, settings).await,
            // Admin actions are routed before reaching the engine.
            Action::Admin(_) => Ok(caller.expired()),
        }
    }

    async fn menu(&self, caller: &Caller, menu: Menu) -> Result<Vec<Reply>> {
        let screen = match menu {
            Menu::Main => {
                self.clear(caller.id()).await;
                caller.main_menu()
            }
            Menu::DailyReport => return self.start_report(caller, false).await,
            Menu::Progress => Screen::Progress,
            Menu::Plan => {
                self.clear(caller.id()).await;
                Screen::Plan
            }
            Menu::Tools => {
                self.clear(caller.id()).await;
                Screen::Tools
            }
            Menu::Settings => {
                self.clear(caller.id()).await;
                Screen::Settings
            }
            // Reachable mid-report; the session is kept.
            Menu::Emergency => Screen::Emergency,
            Menu::Admin => return Ok(caller.expired()),
        };
        Ok(vec![screen.into()])
    }

    // ── Onboarding and behavior selection ────────────────────────────────

    async fn onboard(&self, caller: &Caller, step: OnboardStep) -> Result<Vec<Reply>> {
        let screen = match step {
            OnboardStep::Continue => {
                let mut state = OnboardingState::Preview;
                let Some(OnboardingStep::Behaviors { selected }) =
                    state.apply(OnboardingEvent::Continue)
                else {
                    return Ok(caller.expired());
                };
                self.set_session(caller.id(), Session::Onboarding(state)).await;
                Screen::SelectBehaviors {
                    selected,
                    purpose: SelectionPurpose::Onboarding,
                }
            }
            OnboardStep::Privacy => Screen::Privacy,
            OnboardStep::Back => {
                let state = match self.take_session(caller.id()).await {
                    Some(Session::Onboarding(state)) => state,
                    // Old welcome message after a restart.
                    _ => OnboardingState::Preview,
                };
                return self
                    .step_onboarding(caller, state, OnboardingEvent::Back)
                    .await;
            }
        };
        Ok(vec![screen.into()])
    }

    async fn toggle_behavior(&self, caller: &Caller, code: BehaviorCode) -> Result<Vec<Reply>> {
        match self.take_session(caller.id()).await {
            Some(Session::Onboarding(state)) => {
                self.step_onboarding(caller, state, OnboardingEvent::Toggle(code))
                    .await
            }
            Some(Session::EditingBehaviors { mut selected }) => {
                toggle(&mut selected, code);
                self.set_session(
                    caller.id(),
                    Session::EditingBehaviors {
                        selected: selected.clone(),
                    },
                )
                .await;
                Ok(vec![Screen::SelectBehaviors {
                    selected,
                    purpose: SelectionPurpose::Settings,
                }
                .into()])
            }
            _ => Ok(caller.expired()),
        }
    }

    async fn behaviors_done(&self, caller: &Caller) -> Result<Vec<Reply>> {
        match self.take_session(caller.id()).await {
            Some(Session::Onboarding(state)) => {
                self.step_onboarding(caller, state, OnboardingEvent::Done)
                    .await
            }
            Some(Session::EditingBehaviors { selected }) if selected.is_empty() => {
                self.set_session(caller.id(), Session::EditingBehaviors { selected })
                    .await;
                Ok(vec![Notice::SelectAtLeastOne.into()])
            }
            Some(Session::EditingBehaviors { selected }) => {
                self.store
                    .replace_tracked_behaviors(caller.id(), &selected)
                    .await?;
                info!(user_id = caller.id(), count = selected.len(), "tracked behaviors changed");
                Ok(vec![Screen::BehaviorsSaved.into()])
            }
            _ => Ok(caller.expired()),
        }
    }

    async fn select_time(&self, caller: &Caller, time: String) -> Result<Vec<Reply>> {
        match self.take_session(caller.id()).await {
            Some(Session::Onboarding(state)) => {
                self.step_onboarding(caller, state, OnboardingEvent::Time(time))
                    .await
            }
            Some(Session::PickingTime) => {
                let time = self.store.set_reminder_time(caller.id(), &time).await?;
                Ok(vec![Screen::ReminderTimeSet { time }.into()])
            }
            _ => Ok(caller.expired()),
        }
    }

    async fn time_back(&self, caller: &Caller) -> Result<Vec<Reply>> {
        match self.take_session(caller.id()).await {
            Some(Session::Onboarding(state)) => {
                self.step_onboarding(caller, state, OnboardingEvent::TimeBack)
                    .await
            }
            Some(Session::PickingTime) => Ok(vec![Screen::Settings.into()]),
            _ => Ok(caller.expired()),
        }
    }

    /// Apply an onboarding event to a session already taken out of the map.
    async fn step_onboarding(
        &self,
        caller: &Caller,
        mut state: OnboardingState,
        event: OnboardingEvent,
    ) -> Result<Vec<Reply>> {
        let Some(step) = state.apply(event) else {
            debug!(user_id = caller.id(), "onboarding event out of order");
            return Ok(caller.expired());
        };
        let screen = match step {
            OnboardingStep::Complete {
                behaviors,
                reminder_time,
            } => {
                let id = caller.id();
                self.store.replace_tracked_behaviors(id, &behaviors).await?;
                self.store.set_reminder_time(id, &reminder_time).await?;
                self.store.set_onboarded(id, true).await?;
                info!(user_id = id, reminder_time = %reminder_time, "onboarding complete");
                return Ok(vec![Screen::OnboardingComplete {
                    admin: caller.admin,
                }
                .into()]);
            }
            OnboardingStep::Preview => Screen::Welcome,
            OnboardingStep::Behaviors { selected } => Screen::SelectBehaviors {
                selected,
                purpose: SelectionPurpose::Onboarding,
            },
            OnboardingStep::Time => Screen::SelectTime {
                purpose: SelectionPurpose::Onboarding,
            },
            OnboardingStep::EmptySelection => {
                self.set_session(caller.id(), Session::Onboarding(state)).await;
                return Ok(vec![Notice::SelectAtLeastOne.into()]);
            }
        };
        self.set_session(caller.id(), Session::Onboarding(state)).await;
        Ok(vec![screen.into()])
    }

    // ── Daily report ─────────────────────────────────────────────────────

    /// Begin a report run for the caller's local today.
    ///
    /// Unless `edit` is set, a fully reported day shows the summary instead.
    async fn start_report(&self, caller: &Caller, edit: bool) -> Result<Vec<Reply>> {
        let behaviors = self.store.tracked_behaviors(caller.id()).await?;
        if behaviors.is_empty() {
            return Ok(vec![Notice::NoTrackedBehaviors.into()]);
        }
        let today = self.store.local_date(&caller.user);

        if !edit {
            let (rows, complete) = stats::report_summary(&self.store, caller.id(), today).await?;
            if complete {
                self.clear(caller.id()).await;
                return Ok(vec![Screen::ReportSummary { rows }.into()]);
            }
        }

        let session = ReportSession::start(today, behaviors)?;
        let screen = prompt_screen(session.prompt());
        debug!(user_id = caller.id(), date = %today, edit, "report started");
        self.set_session(caller.id(), Session::Report(session)).await;
        Ok(vec![screen.into()])
    }

    async fn report(&self, caller: &Caller, action: ReportAction) -> Result<Vec<Reply>> {
        let event = match action {
            ReportAction::Status(status) => ReportEvent::Status(status),
            ReportAction::Continue => ReportEvent::Continue,
            ReportAction::Craving(level) => ReportEvent::Craving(level),
            ReportAction::Support(yes) => ReportEvent::SupportNeed(yes),
            ReportAction::Edit => return self.start_report(caller, true).await,
            ReportAction::Cancel => {
                self.clear(caller.id()).await;
                return Ok(vec![caller.main_menu().into()]);
            }
        };

        let Some(Session::Report(mut session)) = self.take_session(caller.id()).await else {
            debug!(user_id = caller.id(), "report callback without a session");
            return Ok(caller.expired());
        };

        match session.apply(event) {
            Ok(Transition::Next(prompt)) => {
                self.set_session(caller.id(), Session::Report(session)).await;
                Ok(vec![prompt_screen(prompt).into()])
            }
            Ok(Transition::Complete {
                entries,
                needs_support,
            }) => {
                self.store
                    .record_report(caller.id(), session.date(), &entries)
                    .await?;
                info!(
                    user_id = caller.id(),
                    date = %session.date(),
                    entries = entries.len(),
                    needs_support,
                    "report saved"
                );
                let next = if needs_support {
                    Screen::Emergency
                } else {
                    Screen::ReportSaved {
                        admin: caller.admin,
                    }
                };
                Ok(vec![next.into()])
            }
            Err(err) => {
                debug!(user_id = caller.id(), error = %err, "stale report callback");
                Ok(caller.expired())
            }
        }
    }

    // ── Progress ─────────────────────────────────────────────────────────

    async fn progress(&self, caller: &Caller, view: ProgressView) -> Result<Vec<Reply>> {
        let id = caller.id();
        let today = self.store.local_date(&caller.user);
        let reply: Reply = match view {
            ProgressView::Week => {
                Screen::Week(stats::period_stats(&self.store, id, today, WEEK_DAYS).await?).into()
            }
            ProgressView::Streaks => Screen::Streaks(stats::streaks(&self.store, id).await?).into(),
            ProgressView::Calendar => Screen::Calendar(
                stats::calendar_window(&self.store, id, today, DEFAULT_CALENDAR_DAYS).await?,
            )
            .into(),
            ProgressView::Export => {
                let export = self.store.export_user(id).await?;
                Reply::Document {
                    kind: DocumentKind::UserExport,
                    filename: format!("steadyday-export-{today}.json"),
                    content: serde_json::to_vec_pretty(&export)?,
                }
            }
        };
        Ok(vec![reply])
    }

    // ── Settings ─────────────────────────────────────────────────────────

    async fn settings(&self, caller: &Caller, action: SettingsAction) -> Result<Vec<Reply>> {
        let id = caller.id();
        let screen = match action {
            SettingsAction::Behaviors => {
                let selected = self.store.tracked_behaviors(id).await?;
                self.set_session(
                    id,
                    Session::EditingBehaviors {
                        selected: selected.clone(),
                    },
                )
                .await;
                Screen::SelectBehaviors {
                    selected,
                    purpose: SelectionPurpose::Settings,
                }
            }
            SettingsAction::ReminderTime => {
                self.set_session(id, Session::PickingTime).await;
                Screen::SelectTime {
                    purpose: SelectionPurpose::Settings,
                }
            }
            SettingsAction::Notifications => Screen::NotificationSettings {
                enabled: caller.user.notifications_enabled,
                frequency: caller.user.notification_frequency,
            },
            SettingsAction::ToggleNotifications => {
                self.store
                    .set_notification_settings(id, Some(!caller.user.notifications_enabled), None)
                    .await?;
                self.notification_screen(caller).await?
            }
            SettingsAction::Frequency(n) => {
                self.store
                    .set_notification_settings(id, None, Some(n))
                    .await?;
                self.notification_screen(caller).await?
            }
            SettingsAction::Delete => {
                self.set_session(id, Session::ConfirmingDelete).await;
                Screen::DeleteConfirm
            }
            SettingsAction::ConfirmDelete => {
                if self.take_session(id).await != Some(Session::ConfirmingDelete) {
                    return Ok(caller.expired());
                }
                self.store.delete_user(id).await?;
                info!(user_id = id, "user data deleted on request");
                Screen::DataDeleted
            }
        };
        Ok(vec![screen.into()])
    }

    async fn notification_screen(&self, caller: &Caller) -> Result<Screen> {
        let user = self
            .store
            .get_user(caller.id())
            .await?
            .unwrap_or_else(|| caller.user.clone());
        Ok(Screen::NotificationSettings {
            enabled: user.notifications_enabled,
            frequency: user.notification_frequency,
        })
    }

    /// `/timezone <id>`: store a valid zone, or show usage.
    pub async fn set_timezone(&self, caller: &Caller, raw: &str) -> Result<Vec<Reply>> {
        let raw = raw.trim();
        if !TimezoneResolver::is_valid(raw) {
            return Ok(vec![Screen::TimezoneUsage {
                current: caller.user.timezone.clone(),
            }
            .into()]);
        }
        let timezone = self.store.set_timezone(caller.id(), raw).await?;
        let local = self
            .store
            .resolver()
            .local_now(&timezone, self.store.clock().now());
        Ok(vec![Screen::TimezoneSet {
            timezone,
            local_time: format!("{:02}:{:02}", local.hour, local.minute),
        }
        .into()])
    }

    async fn load_indexes(&self, user_id: i64, key: SettingKey, list: &[&str]) -> Result<Vec<usize>> {
        let saved = self.store.get_setting(user_id, key).await?;
        let items = saved.as_ref().map(UserSetting::items).unwrap_or_default();
        Ok(list
            .iter()
            .enumerate()
            .filter(|(_, name)| items.iter().any(|i| i == *name))
            .map(|(idx, _)| idx)
            .collect())
    }
}

fn prompt_screen(prompt: Prompt) -> Screen {
    match prompt {
        Prompt::Status {
            behavior,
            index,
            total,
        } => Screen::ReportQuestion {
            behavior,
            index,
            total,
        },
        Prompt::RelapseAck { behavior } => Screen::RelapseSupport { behavior },
        Prompt::Craving => Screen::CravingQuestion,
        Prompt::SupportNeed => Screen::SupportNeedQuestion,
    }
}

fn pick(list: &[&str], indexes: &[usize]) -> Vec<String> {
    indexes
        .iter()
        .filter_map(|i| list.get(*i))
        .map(|s| s.to_string())
        .collect()
}
