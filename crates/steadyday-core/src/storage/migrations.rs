//! Database schema migrations for steadyday.
//!
//! Migrations are versioned and applied automatically when opening the store.
//! The `schema_version` table tracks the current migration version. Every
//! step is additive and safe to re-run against a database that already has
//! some of its objects.

use rusqlite::{params, Connection, Result as SqliteResult};
use tracing::{info, warn};

use crate::catalog::{BehaviorCode, SUPPORT_MESSAGES};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 3;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < 3 {
        migrate_v3(conn)?;
    }
    if current_version < SCHEMA_VERSION {
        info!(from = current_version, to = SCHEMA_VERSION, "schema migrated");
    }

    Ok(())
}

/// Insert reference data: the behavior catalog and default templates.
///
/// Uses `INSERT OR IGNORE`, so running it on every start is a no-op once seeded.
pub fn seed(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    for behavior in BehaviorCode::ALL {
        tx.execute(
            "INSERT OR IGNORE INTO behaviors (code, name) VALUES (?1, ?2)",
            params![behavior.code(), behavior.display_name()],
        )?;
    }
    for text in SUPPORT_MESSAGES {
        tx.execute(
            "INSERT OR IGNORE INTO notification_templates (text) VALUES (?1)",
            params![text],
        )?;
    }
    tx.commit()
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Returns 0 if no version is set (initial database).
fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Add `column` to `table` unless it already exists.
fn ensure_column(conn: &Connection, table: &str, column: &str, ddl: &str) -> SqliteResult<bool> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        params![table, column],
        |row| row.get::<_, i32>(0),
    )? > 0;

    if !exists {
        conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {ddl};"))?;
    }
    Ok(!exists)
}

/// Migration v1: base tables.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            user_id       INTEGER PRIMARY KEY,
            username      TEXT,
            first_name    TEXT,
            is_onboarded  INTEGER NOT NULL DEFAULT 0,
            timezone      TEXT NOT NULL DEFAULT 'Europe/Moscow',
            reminder_time TEXT NOT NULL DEFAULT '21:00',
            created_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS behaviors (
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tracked_behaviors (
            user_id       INTEGER NOT NULL,
            behavior_code TEXT NOT NULL,
            created_at    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (user_id, behavior_code)
        );

        CREATE TABLE IF NOT EXISTS daily_logs (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id       INTEGER NOT NULL,
            date          TEXT NOT NULL,
            behavior_code TEXT NOT NULL,
            status        TEXT NOT NULL,
            craving_level TEXT,
            created_at    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (user_id, date, behavior_code)
        );

        CREATE TABLE IF NOT EXISTS user_settings (
            user_id INTEGER NOT NULL,
            key     TEXT NOT NULL,
            value   TEXT NOT NULL,
            PRIMARY KEY (user_id, key)
        );

        CREATE TABLE IF NOT EXISTS notifications_log (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id           INTEGER NOT NULL,
            notification_type TEXT NOT NULL,
            date              TEXT NOT NULL,
            sent_at           TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS notification_templates (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            text       TEXT NOT NULL,
            is_active  INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS broadcast_log (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            text        TEXT NOT NULL,
            sent_count  INTEGER NOT NULL,
            error_count INTEGER NOT NULL,
            sent_at     TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_logs_user_date ON daily_logs(user_id, date);
        CREATE INDEX IF NOT EXISTS idx_tracked_user ON tracked_behaviors(user_id);",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: per-user notification preferences and activity tracking.
///
/// Adds to `users`:
/// - notifications_enabled: reminders on/off
/// - notification_frequency: reminders per day (1 or 2)
/// - last_active: last inbound contact
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    ensure_column(
        &tx,
        "users",
        "notifications_enabled",
        "notifications_enabled INTEGER NOT NULL DEFAULT 1",
    )?;
    ensure_column(
        &tx,
        "users",
        "notification_frequency",
        "notification_frequency INTEGER NOT NULL DEFAULT 1",
    )?;
    if ensure_column(&tx, "users", "last_active", "last_active TEXT NOT NULL DEFAULT ''")? {
        tx.execute(
            "UPDATE users SET last_active = created_at WHERE last_active = ''",
            [],
        )?;
    }
    tx.execute_batch("CREATE INDEX IF NOT EXISTS idx_users_onboarded ON users(is_onboarded);")?;

    set_schema_version(&tx, 2)?;
    tx.commit()
}

/// Migration v3: uniqueness for the notification log and templates.
///
/// Older databases may hold duplicates; the oldest row of each group wins.
fn migrate_v3(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "DELETE FROM notifications_log
         WHERE id NOT IN (
             SELECT MIN(id) FROM notifications_log
             GROUP BY user_id, notification_type, date
         );
         CREATE UNIQUE INDEX IF NOT EXISTS idx_notif_unique
             ON notifications_log(user_id, notification_type, date);

         DELETE FROM notification_templates
         WHERE id NOT IN (
             SELECT MIN(id) FROM notification_templates GROUP BY text
         );
         CREATE UNIQUE INDEX IF NOT EXISTS idx_templates_text
             ON notification_templates(text);",
    )?;

    set_schema_version(&tx, 3)?;
    tx.commit()
}
