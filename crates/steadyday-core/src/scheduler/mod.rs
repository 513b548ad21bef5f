//! Timezone-aware reminder scheduler.
//!
//! On every tick each onboarded user with reminders enabled is checked
//! against their own local clock. A due reminder is first recorded in the
//! notification log; only a successful insert leads to a send, so the log,
//! not wall-clock bookkeeping, is what prevents double delivery.
//!
//! ## Lifecycle
//!
//! [`ReminderScheduler::start`] spawns the periodic loop and
//! [`ReminderScheduler::stop`] ends it after the in-flight tick finishes.
//! [`ReminderScheduler::tick`] can also be driven directly (the `tick`
//! admin command and the tests do). Ticks never overlap: a tick requested
//! while another runs is coalesced into it.

pub mod delivery;
pub mod due;

pub use delivery::{deliver, DeliveryOutcome};
pub use due::{due_slots, is_due, slots, Slot, TOLERANCE_MINUTES};

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::catalog::{FALLBACK_TEMPLATE_COUNT, SUPPORT_MESSAGES};
use crate::conversation::action::{Action, Menu};
use crate::error::Result;
use crate::messenger::{Keyboard, Messenger};
use crate::storage::{Config, Store};

/// Timing knobs, usually taken from [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub interval: Duration,
    /// Pause between reminder sends inside one tick.
    pub send_pacing: Duration,
    /// Pause between broadcast sends.
    pub broadcast_pacing: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            send_pacing: Duration::from_millis(50),
            broadcast_pacing: Duration::from_millis(100),
        }
    }
}

impl SchedulerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.tick_interval(),
            send_pacing: Duration::from_millis(config.send_pacing_ms),
            broadcast_pacing: Duration::from_millis(config.broadcast_pacing_ms),
        }
    }
}

/// Counters for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub users_scanned: u32,
    pub due: u32,
    pub recorded: u32,
    /// Due but already recorded for this local date.
    pub duplicates: u32,
    pub sent: u32,
    pub transient_failures: u32,
    pub permanent_failures: u32,
}

impl TickReport {
    pub fn failed(&self) -> u32 {
        self.transient_failures + self.permanent_failures
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Ran(TickReport),
    /// Another tick was in flight; this one was folded into it.
    Coalesced,
}

/// Snapshot for the admin status screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub interval_secs: u64,
    pub last_tick: Option<DateTime<Utc>>,
    pub next_tick: Option<DateTime<Utc>>,
    /// Bot wall-clock time in the default zone, `HH:MM:SS`.
    pub bot_time: String,
    pub timezone: String,
    pub enabled_users: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastReport {
    pub sent: u32,
    pub failed: u32,
    /// Row id in the broadcast audit log.
    pub record_id: i64,
}

/// A broadcast running in the background.
pub struct BroadcastJob {
    pub recipients: usize,
    pub handle: JoinHandle<Result<BroadcastReport>>,
}

struct Runner {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct Inner {
    store: Store,
    messenger: Arc<dyn Messenger>,
    config: SchedulerConfig,
    in_flight: AtomicBool,
    running: AtomicBool,
    started_at: std::sync::Mutex<Option<DateTime<Utc>>>,
    last_tick: std::sync::Mutex<Option<DateTime<Utc>>>,
    runner: Mutex<Option<Runner>>,
}

/// Clears the in-flight flag when a tick ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Explicitly constructed scheduler handle. Clones share state.
#[derive(Clone)]
pub struct ReminderScheduler {
    inner: Arc<Inner>,
}

impl ReminderScheduler {
    pub fn new(store: Store, messenger: Arc<dyn Messenger>, config: SchedulerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                messenger,
                config,
                in_flight: AtomicBool::new(false),
                running: AtomicBool::new(false),
                started_at: std::sync::Mutex::new(None),
                last_tick: std::sync::Mutex::new(None),
                runner: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> SchedulerConfig {
        self.inner.config
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Spawn the periodic loop. Returns `false` if it is already running.
    pub async fn start(&self) -> bool {
        let mut runner = self.inner.runner.lock().await;
        if runner.is_some() {
            return false;
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let this = self.clone();
        let interval = self.inner.config.interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match this.tick().await {
                            Ok(TickOutcome::Ran(_)) => {}
                            Ok(TickOutcome::Coalesced) => debug!("tick coalesced"),
                            Err(e) => error!(error = %e, "scheduler tick failed"),
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("scheduler loop exited");
        });

        *runner = Some(Runner { shutdown, handle });
        *lock(&self.inner.started_at) = Some(self.inner.store.clock().now());
        self.inner.running.store(true, Ordering::Release);
        info!(interval_secs = interval.as_secs(), "scheduler started");
        true
    }

    /// Stop the loop, letting an in-flight tick finish first.
    /// Returns `false` if it was not running.
    pub async fn stop(&self) -> bool {
        let Some(runner) = self.inner.runner.lock().await.take() else {
            return false;
        };
        // A closed channel also ends the loop, so a send error is harmless.
        let _ = runner.shutdown.send(true);
        if let Err(e) = runner.handle.await {
            warn!(error = %e, "scheduler task ended abnormally");
        }
        self.inner.running.store(false, Ordering::Release);
        info!("scheduler stopped");
        true
    }

    /// Run one due-check over all users, unless one is already running.
    ///
    /// # Errors
    /// A store fault aborts the tick. Delivery faults never do; they are
    /// counted in the report.
    pub async fn tick(&self) -> Result<TickOutcome> {
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(TickOutcome::Coalesced);
        }
        let _guard = InFlight(&self.inner.in_flight);

        let now = self.inner.store.clock().now();
        *lock(&self.inner.last_tick) = Some(now);
        let report = self.run_tick(now).await?;
        if report.due > 0 {
            info!(
                scanned = report.users_scanned,
                due = report.due,
                sent = report.sent,
                duplicates = report.duplicates,
                failed = report.failed(),
                "tick finished"
            );
        } else {
            debug!(scanned = report.users_scanned, "tick finished, nothing due");
        }
        Ok(TickOutcome::Ran(report))
    }

    async fn run_tick(&self, now: DateTime<Utc>) -> Result<TickReport> {
        let store = &self.inner.store;
        let users = store.users_for_reminder().await?;
        let texts = self.reminder_texts().await?;
        let keyboard = reminder_keyboard();
        let mut report = TickReport::default();

        for user in users {
            report.users_scanned += 1;
            let local = store.resolver().local_now(&user.timezone, now);
            let due = due_slots(
                &user.reminder_time,
                user.notification_frequency,
                local.minute_of_day(),
            );

            for slot in due {
                report.due += 1;
                if !store
                    .try_record_notification(user.id, slot.kind, local.date)
                    .await?
                {
                    report.duplicates += 1;
                    continue;
                }
                report.recorded += 1;

                let text = texts
                    .choose(&mut rand::thread_rng())
                    .cloned()
                    .unwrap_or_else(|| SUPPORT_MESSAGES[0].to_string());

                match deliver(self.inner.messenger.as_ref(), user.id, &text, Some(&keyboard)).await
                {
                    DeliveryOutcome::Sent | DeliveryOutcome::SentAfterRetry => {
                        report.sent += 1;
                        info!(user_id = user.id, kind = %slot.kind, date = %local.date, "reminder sent");
                    }
                    // The record stays: recorded but not confirmed delivered.
                    DeliveryOutcome::Failed {
                        transient: true, ..
                    } => report.transient_failures += 1,
                    DeliveryOutcome::Failed { .. } => report.permanent_failures += 1,
                }
                tokio::time::sleep(self.inner.config.send_pacing).await;
            }
        }
        Ok(report)
    }

    /// Active template texts, or the built-in fallback set.
    async fn reminder_texts(&self) -> Result<Vec<String>> {
        let texts: Vec<String> = self
            .inner
            .store
            .active_templates()
            .await?
            .into_iter()
            .map(|t| t.text)
            .collect();
        if texts.is_empty() {
            return Ok(SUPPORT_MESSAGES[..FALLBACK_TEMPLATE_COUNT]
                .iter()
                .map(|s| s.to_string())
                .collect());
        }
        Ok(texts)
    }

    pub async fn status(&self) -> Result<SchedulerStatus> {
        let store = &self.inner.store;
        let enabled_users = store.users_for_reminder().await?.len();
        let running = self.is_running();
        let last_tick = *lock(&self.inner.last_tick);
        let interval = self.inner.config.interval;
        let next_tick = if running {
            last_tick
                .or(*lock(&self.inner.started_at))
                .and_then(|t| chrono::Duration::from_std(interval).ok().map(|d| t + d))
        } else {
            None
        };
        let zone = store.resolver().default_zone();
        let now = store.clock().now();
        Ok(SchedulerStatus {
            running,
            interval_secs: interval.as_secs(),
            last_tick,
            next_tick,
            bot_time: now.with_timezone(&zone).format("%H:%M:%S").to_string(),
            timezone: zone.name().to_string(),
            enabled_users,
        })
    }

    /// Send `text` to every known user and audit the totals.
    ///
    /// Uses the same retry-once policy as reminders.
    pub async fn broadcast(&self, text: &str) -> Result<BroadcastReport> {
        let ids = self.inner.store.all_user_ids().await?;
        self.send_broadcast(ids, text).await
    }

    /// Run a broadcast in the background.
    ///
    /// The recipient list is fixed before this returns. When the run ends,
    /// `notify` receives a one-line summary.
    pub async fn spawn_broadcast(&self, text: String, notify: i64) -> Result<BroadcastJob> {
        let ids = self.inner.store.all_user_ids().await?;
        let recipients = ids.len();
        let scheduler = self.clone();
        let handle = tokio::spawn(async move {
            let result = scheduler.send_broadcast(ids, &text).await;
            let summary = match &result {
                Ok(report) => format!(
                    "📢 Broadcast finished: {} sent, {} failed.",
                    report.sent, report.failed
                ),
                Err(e) => {
                    error!(error = %e, "broadcast could not be recorded");
                    "⚠️ Broadcast was sent but could not be recorded.".to_string()
                }
            };
            if !deliver(scheduler.inner.messenger.as_ref(), notify, &summary, None)
                .await
                .delivered()
            {
                warn!(user_id = notify, "broadcast summary not delivered");
            }
            result
        });
        Ok(BroadcastJob { recipients, handle })
    }

    async fn send_broadcast(&self, ids: Vec<i64>, text: &str) -> Result<BroadcastReport> {
        let total = ids.len();
        let mut report = BroadcastReport::default();

        for (i, user_id) in ids.into_iter().enumerate() {
            if deliver(self.inner.messenger.as_ref(), user_id, text, None)
                .await
                .delivered()
            {
                report.sent += 1;
            } else {
                report.failed += 1;
            }
            if (i + 1) % 100 == 0 {
                info!(progress = i + 1, total, sent = report.sent, failed = report.failed, "broadcast progress");
            }
            tokio::time::sleep(self.inner.config.broadcast_pacing).await;
        }

        report.record_id = self
            .inner
            .store
            .log_broadcast(text, report.sent, report.failed)
            .await?;
        info!(sent = report.sent, failed = report.failed, "broadcast finished");
        Ok(report)
    }
}

/// Buttons attached to every reminder.
pub fn reminder_keyboard() -> Keyboard {
    Keyboard::new()
        .button("📝 Fill in today's report", Action::Menu(Menu::DailyReport))
        .button("📋 Menu", Action::Menu(Menu::Main))
}

fn lock<T>(m: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reminder_keyboard_opens_report() {
        let keyboard = reminder_keyboard();
        let data: Vec<&str> = keyboard.callback_data().collect();
        assert_eq!(data, vec!["menu:daily_report", "menu:main"]);
    }

    #[test]
    fn config_from_settings() {
        let config = Config::default();
        let sc = SchedulerConfig::from_config(&config);
        assert_eq!(sc.interval, Duration::from_secs(60));
        assert_eq!(sc.broadcast_pacing, Duration::from_millis(100));
    }
}
