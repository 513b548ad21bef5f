//! Transport-agnostic entry point for inbound chat events.
//!
//! A transport decodes its updates into [`Inbound`] values and renders the
//! returned [`Reply`] list. Everything in between (anti-flood, user refresh,
//! the admin gate, command and callback dispatch) happens here.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::antiflood::AntiFlood;
use crate::conversation::action::{Action, AdminAction, Menu};
use crate::conversation::engine::{Caller, ConversationEngine, Session};
use crate::conversation::screen::{template_pages, DocumentKind, Notice, Reply, Screen};
use crate::error::{CoreError, Result};
use crate::scheduler::ReminderScheduler;
use crate::storage::{Config, Store};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// `/name args`, with any `@botname` suffix stripped from the name.
    Command { name: String, args: String },
    /// Inline button payload.
    Callback(String),
    /// Plain text message.
    Text(String),
}

impl InboundEvent {
    /// Classify a text message as a command or free text.
    pub fn from_message(text: &str) -> Self {
        let trimmed = text.trim();
        let Some(rest) = trimmed.strip_prefix('/') else {
            return InboundEvent::Text(text.to_string());
        };
        let (head, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let name = head.split('@').next().unwrap_or(head).to_lowercase();
        InboundEvent::Command {
            name,
            args: args.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub event: InboundEvent,
}

impl Inbound {
    pub fn new(user_id: i64, event: InboundEvent) -> Self {
        Self {
            user_id,
            username: None,
            first_name: None,
            event,
        }
    }
}

pub struct Router {
    engine: ConversationEngine,
    scheduler: ReminderScheduler,
    antiflood: AntiFlood,
    admin_user_id: i64,
}

impl Router {
    pub fn new(store: Store, scheduler: ReminderScheduler, config: &Config) -> Self {
        Self {
            engine: ConversationEngine::new(store),
            scheduler,
            antiflood: AntiFlood::new(config.antiflood_delay()),
            admin_user_id: config.admin_user_id,
        }
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn engine(&self) -> &ConversationEngine {
        &self.engine
    }

    pub fn store(&self) -> &Store {
        self.engine.store()
    }

    pub fn scheduler(&self) -> &ReminderScheduler {
        &self.scheduler
    }

    /// 0 means nobody is admin.
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_user_id != 0 && user_id == self.admin_user_id
    }

    /// Handle one inbound event. Never fails: faults become a screen.
    pub async fn handle(&self, inbound: Inbound) -> Vec<Reply> {
        let user_id = inbound.user_id;
        let admin = self.is_admin(user_id);

        if matches!(inbound.event, InboundEvent::Callback(_)) && !self.antiflood.check(user_id).await
        {
            debug!(user_id, "callback dropped by anti-flood");
            return Vec::new();
        }

        let user = match self
            .store()
            .get_or_create_user(
                user_id,
                inbound.username.as_deref(),
                inbound.first_name.as_deref(),
            )
            .await
        {
            Ok(user) => user,
            Err(e) => {
                error!(user_id, error = %e, "could not load user");
                return vec![Screen::Failure { admin }.into()];
            }
        };
        let caller = Caller { user, admin };

        match self.dispatch(&caller, inbound.event).await {
            Ok(replies) => replies,
            Err(CoreError::PermissionDenied { user_id }) => {
                warn!(user_id, "admin action rejected");
                vec![Screen::PermissionDenied.into()]
            }
            Err(e) => {
                error!(user_id, error = %e, "request failed");
                vec![Screen::Failure { admin }.into()]
            }
        }
    }

    async fn dispatch(&self, caller: &Caller, event: InboundEvent) -> Result<Vec<Reply>> {
        match event {
            InboundEvent::Command { name, args } => self.command(caller, &name, &args).await,
            InboundEvent::Callback(data) => {
                let action = match data.parse::<Action>() {
                    Ok(action) => action,
                    Err(e) => {
                        debug!(user_id = caller.id(), data = %data, error = %e, "unknown callback");
                        self.engine.clear(caller.id()).await;
                        return Ok(expired(caller));
                    }
                };
                match action {
                    Action::Admin(admin_action) => self.admin(caller, admin_action).await,
                    Action::Menu(Menu::Admin) => self.open_admin(caller).await,
                    other => self.engine.handle(caller, other).await,
                }
            }
            InboundEvent::Text(text) => self.text(caller, text).await,
        }
    }

    async fn command(&self, caller: &Caller, name: &str, args: &str) -> Result<Vec<Reply>> {
        match name {
            "start" | "menu" => Ok(self.engine.restart(caller).await),
            "ping" => Ok(vec![Screen::Pong.into()]),
            "admin" => self.open_admin(caller).await,
            "timezone" if args.is_empty() => Ok(vec![Screen::TimezoneUsage {
                current: caller.user.timezone.clone(),
            }
            .into()]),
            "timezone" => self.engine.set_timezone(caller, args).await,
            other => {
                debug!(user_id = caller.id(), command = other, "unknown command ignored");
                Ok(Vec::new())
            }
        }
    }

    /// Free text is only meaningful while an admin is composing something.
    async fn text(&self, caller: &Caller, text: String) -> Result<Vec<Reply>> {
        let id = caller.id();
        match self.engine.session(id).await {
            Some(Session::ComposingBroadcast) => {
                require_admin(caller)?;
                let text = text.trim().to_string();
                if text.is_empty() {
                    return Ok(vec![Notice::EmptyText.into()]);
                }
                self.engine
                    .set_session(id, Session::ConfirmingBroadcast { text: text.clone() })
                    .await;
                Ok(vec![Screen::BroadcastConfirm { text }.into()])
            }
            Some(Session::AddingTemplate) => {
                require_admin(caller)?;
                let text = text.trim();
                if text.is_empty() {
                    return Ok(vec![Notice::EmptyText.into()]);
                }
                let added = self.store().add_template(text).await?;
                let templates = self.store().list_templates().await?;
                self.engine
                    .set_session(id, Session::ViewingTemplates { page: 0 })
                    .await;
                if added {
                    info!(user_id = id, "template added");
                    Ok(vec![Screen::TemplateAdded { templates }.into()])
                } else {
                    Ok(vec![
                        Notice::TemplateExists.into(),
                        Screen::Templates { templates, page: 0 }.into(),
                    ])
                }
            }
            _ => Ok(self.engine.restart(caller).await),
        }
    }

    async fn open_admin(&self, caller: &Caller) -> Result<Vec<Reply>> {
        require_admin(caller)?;
        self.engine.clear(caller.id()).await;
        Ok(vec![Screen::Admin.into()])
    }

    async fn admin(&self, caller: &Caller, action: AdminAction) -> Result<Vec<Reply>> {
        require_admin(caller)?;
        let id = caller.id();
        let store = self.store();

        let reply: Reply = match action {
            AdminAction::Stats => Screen::AdminStats(store.admin_stats().await?).into(),
            AdminAction::Export => self.backup_document().await?,
            AdminAction::Scheduler => Screen::SchedulerStatus(self.scheduler.status().await?).into(),
            AdminAction::Broadcast => {
                self.engine.set_session(id, Session::ComposingBroadcast).await;
                Screen::BroadcastPrompt.into()
            }
            AdminAction::ConfirmBroadcast => {
                let Some(Session::ConfirmingBroadcast { text }) = self.engine.take_session(id).await
                else {
                    return Ok(expired(caller));
                };
                let job = self.scheduler.spawn_broadcast(text, id).await?;
                info!(user_id = id, recipients = job.recipients, "broadcast started");
                Screen::BroadcastStarted {
                    recipients: job.recipients,
                }
                .into()
            }
            AdminAction::Templates(page) => {
                let templates = store.list_templates().await?;
                let page = page.min(template_pages(templates.len()) - 1);
                self.engine
                    .set_session(id, Session::ViewingTemplates { page })
                    .await;
                Screen::Templates { templates, page }.into()
            }
            AdminAction::ToggleTemplate(template_id) => {
                if store.toggle_template(template_id).await?.is_none() {
                    debug!(template_id, "toggle on missing template");
                }
                let page = match self.engine.session(id).await {
                    Some(Session::ViewingTemplates { page }) => page,
                    _ => 0,
                };
                let templates = store.list_templates().await?;
                let page = page.min(template_pages(templates.len()) - 1);
                Screen::Templates { templates, page }.into()
            }
            AdminAction::AddTemplate => {
                self.engine.set_session(id, Session::AddingTemplate).await;
                Screen::TemplatePrompt.into()
            }
        };
        Ok(vec![reply])
    }

    /// Snapshot the whole database into a document reply.
    async fn backup_document(&self) -> Result<Reply> {
        let stamp = self.store().clock().now().format("%Y%m%d-%H%M%S");
        let path = std::env::temp_dir().join(format!(
            "steadyday-backup-{}-{stamp}.sqlite",
            std::process::id()
        ));
        self.store().backup_to(&path).await?;
        let content = tokio::fs::read(&path).await;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %e, "could not remove backup copy");
        }
        Ok(Reply::Document {
            kind: DocumentKind::Backup,
            filename: format!("steadyday-backup-{stamp}.sqlite"),
            content: content?,
        })
    }
}

fn require_admin(caller: &Caller) -> Result<()> {
    if caller.admin {
        Ok(())
    } else {
        Err(CoreError::PermissionDenied {
            user_id: caller.id(),
        })
    }
}

fn expired(caller: &Caller) -> Vec<Reply> {
    vec![Screen::SessionExpired {
        onboarded: caller.user.onboarded,
        admin: caller.admin,
    }
    .into()]
}
