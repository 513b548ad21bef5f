//! SQLite-backed persistence for users, daily logs, and the notification log.
//!
//! A single connection sits behind a mutex. Every operation runs on the
//! blocking pool and holds the lock for its whole duration, so the store is
//! the one logical writer and the check-and-insert in
//! [`Store::try_record_notification`] is race-free however many
//! conversations and ticks interleave.
//!
//! Uniqueness is enforced by the schema, not by callers:
//! - `daily_logs` is unique on (user, date, behavior); writes are upserts
//! - `notifications_log` is unique on (user, kind, date)
//! - `notification_templates` is unique on text

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::migrations;
use super::Config;
use crate::catalog::BehaviorCode;
use crate::clock::{normalize_hhmm, Clock, SystemClock, TimezoneResolver};
use crate::error::{DatabaseError, Result, ValidationError};
use crate::model::{
    AdminStats, BroadcastRecord, CravingLevel, DailyLog, Footprint, LogStatus, NotificationKind,
    SettingKey, Template, User, UserExport, UserSetting,
};

/// Fallback values written when a user's own value is missing or invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDefaults {
    pub timezone: String,
    pub reminder_time: String,
}

impl Default for UserDefaults {
    fn default() -> Self {
        Self {
            timezone: "Europe/Moscow".into(),
            reminder_time: "21:00".into(),
        }
    }
}

impl UserDefaults {
    /// Take the (already validated) defaults from the process config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            timezone: config.default_timezone.clone(),
            reminder_time: config.default_reminder_time.clone(),
        }
    }
}

/// One answered behavior in a completed report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportEntry {
    pub behavior: BehaviorCode,
    pub status: LogStatus,
    pub craving: Option<CravingLevel>,
}

#[derive(Debug, Clone, Copy)]
enum LogFilter {
    Date(NaiveDate),
    Period(NaiveDate, NaiveDate),
    Behavior(BehaviorCode),
    All,
}

const USER_COLUMNS: &str = "user_id, username, first_name, is_onboarded, timezone, reminder_time,
     notifications_enabled, notification_frequency, created_at, last_active";

/// Shared handle to the database. Cloning is cheap; clones share the connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    defaults: Arc<UserDefaults>,
    resolver: TimezoneResolver,
    clock: Arc<dyn Clock>,
}

impl Store {
    /// Open (or create) the database file at `path` and bring the schema up to date.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path, defaults: UserDefaults) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        let store = Self::init(conn, defaults)?;
        info!(path = %path.display(), "store opened");
        Ok(store)
    }

    /// Open an in-memory database with default user settings.
    pub fn open_memory() -> Result<Self> {
        Self::open_memory_with(UserDefaults::default())
    }

    pub fn open_memory_with(defaults: UserDefaults) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, defaults)
    }

    fn init(conn: Connection, defaults: UserDefaults) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        migrations::migrate(&conn)
            .and_then(|_| migrations::seed(&conn))
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

        let resolver = TimezoneResolver::from_name(&defaults.timezone);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            defaults: Arc::new(defaults),
            resolver,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the time source used for timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn defaults(&self) -> &UserDefaults {
        &self.defaults
    }

    pub fn resolver(&self) -> &TimezoneResolver {
        &self.resolver
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Today's date in the user's zone, per the store's clock.
    pub fn local_date(&self, user: &User) -> NaiveDate {
        self.resolver.local_date(&user.timezone, self.clock.now())
    }

    fn now_ts(&self) -> String {
        timestamp(self.clock.now())
    }

    /// Run `f` against the connection on the blocking pool.
    ///
    /// The connection lock is taken inside the blocking task, so operations
    /// stay serialized without stalling the async workers.
    async fn call<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(|e| e.into_inner());
            f(&mut guard)
        })
        .await
        .map_err(|e| DatabaseError::TaskFailed(e.to_string()))?
    }

    /// Run a statement batch directly against the connection.
    ///
    /// Meant for maintenance and for tests that need to shape the schema.
    pub async fn execute_batch(&self, sql: &str) -> Result<()> {
        let sql = sql.to_string();
        self.call(move |conn| Ok(conn.execute_batch(&sql)?)).await
    }

    // ── Users ────────────────────────────────────────────────────────────

    /// Create the user on first contact; afterwards refresh display metadata
    /// and `last_active`. Always returns the row as stored.
    pub async fn get_or_create_user(
        &self,
        user_id: i64,
        username: Option<&str>,
        first_name: Option<&str>,
    ) -> Result<User> {
        let now = self.now_ts();
        let username = username.map(str::to_string);
        let first_name = first_name.map(str::to_string);
        let defaults = Arc::clone(&self.defaults);
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO users (user_id, username, first_name, timezone, reminder_time,
                                    created_at, last_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                 ON CONFLICT(user_id) DO UPDATE SET
                     username = excluded.username,
                     first_name = excluded.first_name,
                     last_active = excluded.last_active",
                params![
                    user_id,
                    username,
                    first_name,
                    defaults.timezone,
                    defaults.reminder_time,
                    now
                ],
            )?;
            Ok(select_user(conn, user_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?)
        })
        .await
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        self.call(move |conn| Ok(select_user(conn, user_id)?)).await
    }

    pub async fn set_onboarded(&self, user_id: i64, onboarded: bool) -> Result<()> {
        self.call(move |conn| {
            conn.execute(
                "UPDATE users SET is_onboarded = ?1 WHERE user_id = ?2",
                params![onboarded, user_id],
            )?;
            Ok(())
        })
        .await
    }

    /// Store a reminder time. Unparsable input is replaced by the default.
    ///
    /// Returns the value actually stored.
    pub async fn set_reminder_time(&self, user_id: i64, time: &str) -> Result<String> {
        let value = match normalize_hhmm(time) {
            Some(t) => t,
            None => {
                warn!(user_id, reminder_time = time, "invalid reminder time, using default");
                self.defaults.reminder_time.clone()
            }
        };
        self.call(move |conn| {
            conn.execute(
                "UPDATE users SET reminder_time = ?1 WHERE user_id = ?2",
                params![value, user_id],
            )?;
            Ok(value)
        })
        .await
    }

    /// Store a timezone. Unknown zones are replaced by the default.
    ///
    /// Returns the value actually stored.
    pub async fn set_timezone(&self, user_id: i64, timezone: &str) -> Result<String> {
        let value = self.resolver.sanitize(timezone);
        self.call(move |conn| {
            conn.execute(
                "UPDATE users SET timezone = ?1 WHERE user_id = ?2",
                params![value, user_id],
            )?;
            Ok(value)
        })
        .await
    }

    /// Update reminder preferences; `None` leaves a field untouched.
    /// Frequency is clamped to 1..=2.
    pub async fn set_notification_settings(
        &self,
        user_id: i64,
        enabled: Option<bool>,
        frequency: Option<u8>,
    ) -> Result<()> {
        self.call(move |conn| {
            let tx = conn.transaction()?;
            if let Some(enabled) = enabled {
                tx.execute(
                    "UPDATE users SET notifications_enabled = ?1 WHERE user_id = ?2",
                    params![enabled, user_id],
                )?;
            }
            if let Some(frequency) = frequency {
                tx.execute(
                    "UPDATE users SET notification_frequency = ?1 WHERE user_id = ?2",
                    params![frequency.clamp(1, 2), user_id],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Onboarded users with reminders switched on.
    pub async fn users_for_reminder(&self) -> Result<Vec<User>> {
        self.call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE is_onboarded = 1 AND notifications_enabled = 1
                 ORDER BY user_id"
            ))?;
            let users = stmt
                .query_map([], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(users)
        })
        .await
    }

    pub async fn all_user_ids(&self) -> Result<Vec<i64>> {
        self.call(|conn| {
            let mut stmt = conn.prepare("SELECT user_id FROM users ORDER BY user_id")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            Ok(ids)
        })
        .await
    }

    /// Remove every row keyed by `user_id`, all or nothing.
    pub async fn delete_user(&self, user_id: i64) -> Result<()> {
        self.call(move |conn| {
            let tx = conn.transaction()?;
            for table in USER_TABLES {
                tx.execute(&format!("DELETE FROM {table} WHERE user_id = ?1"), [user_id])?;
            }
            tx.commit()?;
            Ok(())
        })
        .await?;
        info!(user_id, "user data deleted");
        Ok(())
    }

    /// Row counts of every user-keyed table.
    pub async fn footprint(&self, user_id: i64) -> Result<Footprint> {
        self.call(move |conn| {
            let count = |table: &str| -> rusqlite::Result<u64> {
                conn.query_row(
                    &format!("SELECT COUNT(*) FROM {table} WHERE user_id = ?1"),
                    [user_id],
                    |row| row.get(0),
                )
            };
            Ok(Footprint {
                users: count("users")?,
                tracked_behaviors: count("tracked_behaviors")?,
                daily_logs: count("daily_logs")?,
                settings: count("user_settings")?,
                notifications: count("notifications_log")?,
            })
        })
        .await
    }

    // ── Tracked behaviors ────────────────────────────────────────────────

    /// The user's tracked set in catalog order.
    pub async fn tracked_behaviors(&self, user_id: i64) -> Result<Vec<BehaviorCode>> {
        self.call(move |conn| Ok(select_behaviors(conn, user_id)?))
            .await
    }

    /// Replace the whole tracked set. An empty set is rejected.
    pub async fn replace_tracked_behaviors(
        &self,
        user_id: i64,
        codes: &[BehaviorCode],
    ) -> Result<()> {
        if codes.is_empty() {
            return Err(ValidationError::EmptyCollection("tracked behaviors".into()).into());
        }
        let codes = codes.to_vec();
        self.call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM tracked_behaviors WHERE user_id = ?1", [user_id])?;
            for code in &codes {
                tx.execute(
                    "INSERT OR IGNORE INTO tracked_behaviors (user_id, behavior_code) VALUES (?1, ?2)",
                    params![user_id, code],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    // ── Daily logs ───────────────────────────────────────────────────────

    /// Insert or overwrite the log for (user, date, behavior).
    pub async fn upsert_daily_log(
        &self,
        user_id: i64,
        date: NaiveDate,
        behavior: BehaviorCode,
        status: LogStatus,
        craving: Option<CravingLevel>,
    ) -> Result<()> {
        self.call(move |conn| {
            upsert_log(conn, user_id, date, behavior, status, craving)?;
            Ok(())
        })
        .await
    }

    /// Persist a finished report: one upsert per entry inside one transaction.
    pub async fn record_report(
        &self,
        user_id: i64,
        date: NaiveDate,
        entries: &[ReportEntry],
    ) -> Result<()> {
        let entries = entries.to_vec();
        let count = entries.len();
        self.call(move |conn| {
            let tx = conn.transaction()?;
            for entry in &entries {
                upsert_log(&tx, user_id, date, entry.behavior, entry.status, entry.craving)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await?;
        debug!(user_id, %date, entries = count, "report recorded");
        Ok(())
    }

    pub async fn logs_for_date(&self, user_id: i64, date: NaiveDate) -> Result<Vec<DailyLog>> {
        self.query_logs(user_id, LogFilter::Date(date)).await
    }

    /// Logs with `start <= date <= end`, newest first.
    pub async fn logs_for_period(
        &self,
        user_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyLog>> {
        self.query_logs(user_id, LogFilter::Period(start, end)).await
    }

    /// Every log of one behavior, newest first.
    pub async fn behavior_history(
        &self,
        user_id: i64,
        behavior: BehaviorCode,
    ) -> Result<Vec<DailyLog>> {
        self.query_logs(user_id, LogFilter::Behavior(behavior)).await
    }

    async fn query_logs(&self, user_id: i64, filter: LogFilter) -> Result<Vec<DailyLog>> {
        self.call(move |conn| Ok(select_logs(conn, user_id, filter)?))
            .await
    }

    // ── Settings ─────────────────────────────────────────────────────────

    pub async fn get_setting(&self, user_id: i64, key: SettingKey) -> Result<Option<UserSetting>> {
        let raw: Option<String> = self
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT value FROM user_settings WHERE user_id = ?1 AND key = ?2",
                        params![user_id, key.as_str()],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .await?;
        Ok(raw.map(|v| UserSetting::decode(key, &v)))
    }

    /// Last write wins.
    pub async fn set_setting(&self, user_id: i64, setting: &UserSetting) -> Result<()> {
        let key = setting.key().as_str();
        let value = setting.encode();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO user_settings (user_id, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id, key) DO UPDATE SET value = excluded.value",
                params![user_id, key, value],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn settings(&self, user_id: i64) -> Result<BTreeMap<String, String>> {
        self.call(move |conn| Ok(select_settings(conn, user_id)?))
            .await
    }

    // ── Notification log ─────────────────────────────────────────────────

    /// Atomically claim (user, kind, date). Returns `false` if already claimed.
    ///
    /// This is the only guard against double sends.
    pub async fn try_record_notification(
        &self,
        user_id: i64,
        kind: NotificationKind,
        date: NaiveDate,
    ) -> Result<bool> {
        let now = self.now_ts();
        self.call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO notifications_log (user_id, notification_type, date, sent_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![user_id, kind.as_str(), date, now],
            )?;
            Ok(inserted == 1)
        })
        .await
    }

    pub async fn notification_count(&self, user_id: i64, date: NaiveDate) -> Result<u64> {
        self.call(move |conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM notifications_log WHERE user_id = ?1 AND date = ?2",
                params![user_id, date],
                |row| row.get(0),
            )?;
            Ok(n)
        })
        .await
    }

    // ── Templates ────────────────────────────────────────────────────────

    pub async fn list_templates(&self) -> Result<Vec<Template>> {
        self.query_templates("SELECT id, text, is_active FROM notification_templates ORDER BY id")
            .await
    }

    pub async fn active_templates(&self) -> Result<Vec<Template>> {
        self.query_templates(
            "SELECT id, text, is_active FROM notification_templates
             WHERE is_active = 1 ORDER BY id",
        )
        .await
    }

    async fn query_templates(&self, sql: &'static str) -> Result<Vec<Template>> {
        self.call(move |conn| {
            let mut stmt = conn.prepare(sql)?;
            let templates = stmt
                .query_map([], |row| {
                    Ok(Template {
                        id: row.get(0)?,
                        text: row.get(1)?,
                        active: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(templates)
        })
        .await
    }

    /// Add a template. Returns `false` when the text already exists.
    pub async fn add_template(&self, text: &str) -> Result<bool> {
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "template".into(),
                message: "text is empty".into(),
            }
            .into());
        }
        self.call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO notification_templates (text) VALUES (?1)",
                [text],
            )?;
            Ok(inserted == 1)
        })
        .await
    }

    /// Flip a template's active flag. Returns the new state, or `None` if no such id.
    pub async fn toggle_template(&self, id: i64) -> Result<Option<bool>> {
        self.call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE notification_templates SET is_active = NOT is_active WHERE id = ?1",
                [id],
            )?;
            let active = tx
                .query_row(
                    "SELECT is_active FROM notification_templates WHERE id = ?1",
                    [id],
                    |row| row.get::<_, bool>(0),
                )
                .optional()?;
            tx.commit()?;
            Ok(active)
        })
        .await
    }

    // ── Broadcasts ───────────────────────────────────────────────────────

    pub async fn log_broadcast(&self, text: &str, sent: u32, failed: u32) -> Result<i64> {
        let now = self.now_ts();
        let text = text.to_string();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO broadcast_log (text, sent_count, error_count, sent_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![text, sent, failed, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    pub async fn broadcasts(&self) -> Result<Vec<BroadcastRecord>> {
        self.call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, text, sent_count, error_count, sent_at FROM broadcast_log ORDER BY id",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(BroadcastRecord {
                        id: row.get(0)?,
                        text: row.get(1)?,
                        sent: row.get(2)?,
                        failed: row.get(3)?,
                        sent_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    // ── Admin and export ─────────────────────────────────────────────────

    /// Totals plus 7-day activity, measured from the store's clock.
    pub async fn admin_stats(&self) -> Result<AdminStats> {
        let now = self.clock.now();
        let week_ago = now - ChronoDuration::days(7);
        let week_ago_date = self.resolver.local_date("", week_ago);
        let week_ago_ts = timestamp(week_ago);
        self.call(move |conn| {
            let total_users = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
            let active_users_7d = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE last_active >= ?1",
                [week_ago_ts],
                |r| r.get(0),
            )?;
            let total_logs = conn.query_row("SELECT COUNT(*) FROM daily_logs", [], |r| r.get(0))?;
            let logs_7d = conn.query_row(
                "SELECT COUNT(*) FROM daily_logs WHERE date >= ?1",
                [week_ago_date],
                |r| r.get(0),
            )?;
            Ok(AdminStats {
                total_users,
                active_users_7d,
                total_logs,
                logs_7d,
            })
        })
        .await
    }

    /// Everything stored about one user, read in one transaction. Read-only.
    pub async fn export_user(&self, user_id: i64) -> Result<UserExport> {
        let exported_at = self.clock.now();
        self.call(move |conn| {
            let tx = conn.transaction()?;
            let export = UserExport {
                user: select_user(&tx, user_id)?,
                behaviors: select_behaviors(&tx, user_id)?,
                daily_logs: select_logs(&tx, user_id, LogFilter::All)?,
                settings: select_settings(&tx, user_id)?,
                exported_at,
            };
            tx.commit()?;
            Ok(export)
        })
        .await
    }

    /// Write a consistent snapshot of the whole database to `dest`.
    ///
    /// Holds the connection lock for the duration, so no write lands mid-copy.
    pub async fn backup_to(&self, dest: &Path) -> Result<()> {
        let dest = dest.to_path_buf();
        self.call(move |conn| {
            let backup_failed = |e: rusqlite::Error| DatabaseError::BackupFailed {
                path: dest.clone(),
                message: e.to_string(),
            };
            let mut target = Connection::open(&dest).map_err(backup_failed)?;
            let backup = rusqlite::backup::Backup::new(conn, &mut target).map_err(backup_failed)?;
            backup
                .run_to_completion(256, Duration::ZERO, None)
                .map_err(backup_failed)?;
            info!(dest = %dest.display(), "backup written");
            Ok(())
        })
        .await
    }

    /// Close the connection if this is the last handle.
    pub async fn close(self) -> Result<()> {
        match Arc::try_unwrap(self.conn) {
            Ok(mutex) => {
                let conn = mutex.into_inner().unwrap_or_else(|e| e.into_inner());
                tokio::task::spawn_blocking(move || conn.close())
                    .await
                    .map_err(|e| DatabaseError::TaskFailed(e.to_string()))?
                    .map_err(|(_, e)| DatabaseError::from(e))?;
                info!("store closed");
            }
            Err(_) => debug!("store still shared, leaving connection open"),
        }
        Ok(())
    }
}

/// Every table keyed by user id.
const USER_TABLES: [&str; 5] = [
    "users",
    "tracked_behaviors",
    "daily_logs",
    "user_settings",
    "notifications_log",
];

fn select_user(conn: &Connection, user_id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
        [user_id],
        user_from_row,
    )
    .optional()
}

fn select_behaviors(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<BehaviorCode>> {
    let mut stmt = conn.prepare("SELECT behavior_code FROM tracked_behaviors WHERE user_id = ?1")?;
    let mut codes = stmt
        .query_map([user_id], |row| row.get::<_, BehaviorCode>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    codes.sort();
    Ok(codes)
}

fn select_settings(conn: &Connection, user_id: i64) -> rusqlite::Result<BTreeMap<String, String>> {
    let mut stmt = conn.prepare("SELECT key, value FROM user_settings WHERE user_id = ?1")?;
    let map = stmt
        .query_map([user_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<BTreeMap<String, String>>>()?;
    Ok(map)
}

fn select_logs(conn: &Connection, user_id: i64, filter: LogFilter) -> rusqlite::Result<Vec<DailyLog>> {
    const SELECT: &str = "SELECT user_id, date, behavior_code, status, craving_level FROM daily_logs";
    match filter {
        LogFilter::Date(date) => conn
            .prepare(&format!(
                "{SELECT} WHERE user_id = ?1 AND date = ?2 ORDER BY behavior_code"
            ))?
            .query_map(params![user_id, date], log_from_row)?
            .collect(),
        LogFilter::Period(start, end) => conn
            .prepare(&format!(
                "{SELECT} WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date DESC, behavior_code"
            ))?
            .query_map(params![user_id, start, end], log_from_row)?
            .collect(),
        LogFilter::Behavior(behavior) => conn
            .prepare(&format!(
                "{SELECT} WHERE user_id = ?1 AND behavior_code = ?2 ORDER BY date DESC"
            ))?
            .query_map(params![user_id, behavior], log_from_row)?
            .collect(),
        LogFilter::All => conn
            .prepare(&format!("{SELECT} WHERE user_id = ?1 ORDER BY date, behavior_code"))?
            .query_map(params![user_id], log_from_row)?
            .collect(),
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn upsert_log(
    conn: &Connection,
    user_id: i64,
    date: NaiveDate,
    behavior: BehaviorCode,
    status: LogStatus,
    craving: Option<CravingLevel>,
) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO daily_logs (user_id, date, behavior_code, status, craving_level)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(user_id, date, behavior_code)
         DO UPDATE SET status = excluded.status, craving_level = excluded.craving_level",
        params![user_id, date, behavior, status, craving],
    )
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        onboarded: row.get(3)?,
        timezone: row.get(4)?,
        reminder_time: row.get(5)?,
        notifications_enabled: row.get(6)?,
        notification_frequency: row.get(7)?,
        created_at: row.get(8)?,
        last_active: row.get(9)?,
    })
}

fn log_from_row(row: &Row<'_>) -> rusqlite::Result<DailyLog> {
    Ok(DailyLog {
        user_id: row.get(0)?,
        date: row.get(1)?,
        behavior: row.get(2)?,
        status: row.get(3)?,
        craving: row.get(4)?,
    })
}

// SQL mapping for the text-encoded enums.

fn text_enum<T, E>(value: ValueRef<'_>) -> FromSqlResult<T>
where
    T: std::str::FromStr<Err = E>,
    E: std::error::Error + Send + Sync + 'static,
{
    value
        .as_str()?
        .parse()
        .map_err(|e: E| FromSqlError::Other(Box::new(e)))
}

impl ToSql for BehaviorCode {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for BehaviorCode {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        text_enum(value)
    }
}

impl ToSql for LogStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for LogStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        text_enum(value)
    }
}

impl ToSql for CravingLevel {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for CravingLevel {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        text_enum(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::TimeZone;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn new_user_gets_defaults() {
        let store = Store::open_memory().unwrap();
        let user = store
            .get_or_create_user(1, Some("sam"), Some("Sam"))
            .await
            .unwrap();
        assert!(!user.onboarded);
        assert_eq!(user.timezone, "Europe/Moscow");
        assert_eq!(user.reminder_time, "21:00");
        assert!(user.notifications_enabled);
        assert_eq!(user.notification_frequency, 1);
    }

    #[tokio::test]
    async fn repeated_contact_refreshes_metadata() {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap()));
        let store = Store::open_memory().unwrap().with_clock(clock.clone());
        store.get_or_create_user(1, Some("old"), None).await.unwrap();
        clock.advance(ChronoDuration::hours(3));
        let user = store.get_or_create_user(1, Some("new"), None).await.unwrap();
        assert_eq!(user.username.as_deref(), Some("new"));
        assert_eq!(user.last_active - user.created_at, ChronoDuration::hours(3));
    }

    #[tokio::test]
    async fn invalid_time_and_zone_fall_back() {
        let store = Store::open_memory().unwrap();
        store.get_or_create_user(1, None, None).await.unwrap();
        assert_eq!(store.set_reminder_time(1, "9:30").await.unwrap(), "09:30");
        assert_eq!(store.set_reminder_time(1, "99:99").await.unwrap(), "21:00");
        assert_eq!(store.set_timezone(1, "Bogus/Zone").await.unwrap(), "Europe/Moscow");
        assert_eq!(store.set_timezone(1, "Asia/Tokyo").await.unwrap(), "Asia/Tokyo");
    }

    #[tokio::test]
    async fn upsert_overwrites_instead_of_duplicating() {
        let store = Store::open_memory().unwrap();
        let day = d(2026, 2, 10);
        store
            .upsert_daily_log(1, day, BehaviorCode::Alcohol, LogStatus::Clean, None)
            .await
            .unwrap();
        store
            .upsert_daily_log(
                1,
                day,
                BehaviorCode::Alcohol,
                LogStatus::Relapse,
                Some(CravingLevel::High),
            )
            .await
            .unwrap();
        let logs = store.logs_for_date(1, day).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, LogStatus::Relapse);
        assert_eq!(logs[0].craving, Some(CravingLevel::High));
    }

    #[tokio::test]
    async fn empty_behavior_set_is_rejected() {
        let store = Store::open_memory().unwrap();
        let err = store.replace_tracked_behaviors(1, &[]).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::CoreError::Validation(ValidationError::EmptyCollection(_))
        ));
    }

    #[tokio::test]
    async fn tracked_set_is_replaced_wholesale() {
        let store = Store::open_memory().unwrap();
        store
            .replace_tracked_behaviors(1, &[BehaviorCode::Food, BehaviorCode::Alcohol])
            .await
            .unwrap();
        store
            .replace_tracked_behaviors(1, &[BehaviorCode::Nicotine])
            .await
            .unwrap();
        assert_eq!(
            store.tracked_behaviors(1).await.unwrap(),
            vec![BehaviorCode::Nicotine]
        );
    }

    #[tokio::test]
    async fn notification_claim_is_exclusive() {
        let store = Store::open_memory().unwrap();
        let day = d(2026, 3, 3);
        assert!(store
            .try_record_notification(1, NotificationKind::Reminder, day)
            .await
            .unwrap());
        assert!(!store
            .try_record_notification(1, NotificationKind::Reminder, day)
            .await
            .unwrap());
        assert!(store
            .try_record_notification(1, NotificationKind::Reminder2, day)
            .await
            .unwrap());
        assert!(store
            .try_record_notification(1, NotificationKind::Reminder, d(2026, 3, 4))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn settings_are_typed_at_the_edges() {
        let store = Store::open_memory().unwrap();
        let triggers = UserSetting::Triggers(vec!["Boredom".into(), "Fatigue".into()]);
        store.set_setting(1, &triggers).await.unwrap();
        assert_eq!(
            store.get_setting(1, SettingKey::Triggers).await.unwrap(),
            Some(triggers)
        );
        assert_eq!(store.get_setting(1, SettingKey::Reasons).await.unwrap(), None);
        assert_eq!(
            store.settings(1).await.unwrap().get("triggers").map(String::as_str),
            Some("Boredom,Fatigue")
        );
    }

    #[tokio::test]
    async fn templates_toggle_and_dedupe() {
        let store = Store::open_memory().unwrap();
        let all = store.list_templates().await.unwrap();
        assert_eq!(all.len(), crate::catalog::SUPPORT_MESSAGES.len());
        assert!(!store.add_template(&all[0].text).await.unwrap());
        assert!(store.add_template("Fresh text").await.unwrap());

        assert_eq!(store.toggle_template(all[0].id).await.unwrap(), Some(false));
        assert_eq!(store.toggle_template(all[0].id).await.unwrap(), Some(true));
        assert_eq!(store.toggle_template(9999).await.unwrap(), None);
    }

    #[tokio::test]
    async fn admin_stats_count_recent_activity() {
        let now = Utc.with_ymd_and_hms(2026, 4, 20, 12, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(now - ChronoDuration::days(30)));
        let store = Store::open_memory().unwrap().with_clock(clock.clone());
        store.get_or_create_user(1, None, None).await.unwrap();
        clock.set(now);
        store.get_or_create_user(2, None, None).await.unwrap();
        store
            .upsert_daily_log(2, d(2026, 4, 19), BehaviorCode::Food, LogStatus::Clean, None)
            .await
            .unwrap();
        store
            .upsert_daily_log(2, d(2026, 1, 1), BehaviorCode::Food, LogStatus::Clean, None)
            .await
            .unwrap();

        let stats = store.admin_stats().await.unwrap();
        assert_eq!(
            stats,
            AdminStats {
                total_users: 2,
                active_users_7d: 1,
                total_logs: 2,
                logs_7d: 1,
            }
        );
    }

    #[tokio::test]
    async fn broadcast_is_audited() {
        let store = Store::open_memory().unwrap();
        store.log_broadcast("hello", 3, 1).await.unwrap();
        let rows = store.broadcasts().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!((rows[0].sent, rows[0].failed), (3, 1));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn slow_query_leaves_the_runtime_free() {
        let store = Store::open_memory().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            tx.send(()).ok();
        });
        // Holds the connection until the timer task has run on this thread.
        let one = store
            .call(move |conn| {
                rx.blocking_recv().ok();
                Ok(conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?)
            })
            .await
            .unwrap();
        assert_eq!(one, 1);
        timer.await.unwrap();
    }

    #[tokio::test]
    async fn panicking_call_is_a_task_failure() {
        let store = Store::open_memory().unwrap();
        let err = store
            .call(|_| -> Result<()> { panic!("query blew up") })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::CoreError::Database(DatabaseError::TaskFailed(_))
        ));
        // The poisoned lock is taken over by the next call.
        assert!(store.get_or_create_user(1, None, None).await.is_ok());
    }
}
