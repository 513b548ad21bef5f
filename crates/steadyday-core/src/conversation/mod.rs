//! Conversation flows: onboarding, the daily report, and the menus around them.
//!
//! [`report`] and [`onboarding`] are pure state machines; [`engine`] keeps one
//! session per user and talks to the store; [`screen`] is the vocabulary of
//! what gets shown back.

pub mod action;
pub mod engine;
pub mod onboarding;
pub mod report;
pub mod screen;

pub use action::{
    Action, AdminAction, Menu, OnboardStep, ProgressView, ReportAction, SettingsAction, ToolKind,
};
pub use engine::{Caller, ConversationEngine, Session};
pub use onboarding::SelectionPurpose;
pub use report::{ReportEvent, ReportSession, ReportState};
pub use screen::{DocumentKind, Notice, Reply, Screen};
