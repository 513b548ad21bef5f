//! # Steadyday Core Library
//!
//! This library provides the core logic for the steadyday daily check-in bot.
//! Users pick the behaviors they want to keep away from, answer one short
//! report per day, and get reminders in their own timezone. The chat network
//! is reached only through the [`Messenger`] trait, so the same core drives
//! the Telegram transport in the CLI crate and the in-memory doubles in tests.
//!
//! ## Architecture
//!
//! - **Storage**: SQLite persistence behind a single-writer [`Store`] and
//!   TOML configuration with environment overrides
//! - **Conversation**: pure state machines for onboarding and the daily
//!   report, plus the engine that keeps one session per user
//! - **Router**: anti-flood, admin gate, and command/callback dispatch
//! - **Scheduler**: the periodic reminder tick with per-day deduplication
//! - **Stats**: streaks, calendar windows, and period summaries
//!
//! ## Key Components
//!
//! - [`Router`]: Entry point for inbound chat events
//! - [`ConversationEngine`]: Session-aware handler for menu actions
//! - [`ReminderScheduler`]: Reminder loop and admin broadcast
//! - [`Store`]: User, log, and notification persistence
//! - [`Config`]: Application configuration management

pub mod antiflood;
pub mod catalog;
pub mod clock;
pub mod conversation;
pub mod error;
pub mod messenger;
pub mod model;
pub mod router;
pub mod scheduler;
pub mod stats;
pub mod storage;

pub use antiflood::AntiFlood;
pub use catalog::BehaviorCode;
pub use clock::{Clock, FixedClock, SystemClock, TimezoneResolver};
pub use conversation::{
    Action, Caller, ConversationEngine, DocumentKind, Notice, Reply, Screen, Session,
};
pub use error::{ConfigError, CoreError, DatabaseError, DeliveryError, ValidationError};
pub use messenger::{Button, EditOutcome, Keyboard, Messenger};
pub use model::{CravingLevel, LogStatus, NotificationKind, User};
pub use router::{Inbound, InboundEvent, Router};
pub use scheduler::{
    BroadcastJob, BroadcastReport, ReminderScheduler, SchedulerConfig, SchedulerStatus, TickOutcome,
    TickReport,
};
pub use storage::{Config, Store, UserDefaults};
