//! Shared fixtures for the integration tests: a recording messenger, a
//! pinned clock, and onboarded users.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use steadyday_core::catalog::BehaviorCode;
use steadyday_core::error::DeliveryError;
use steadyday_core::messenger::{EditOutcome, Keyboard, Messenger};
use steadyday_core::scheduler::SchedulerConfig;
use steadyday_core::{FixedClock, Store};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub user_id: i64,
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

/// Messenger double that records every attempt.
///
/// Failures queued with [`fail_next`](Self::fail_next) are returned, one per
/// attempt, before sends to that user start succeeding again.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
    attempts: Mutex<Vec<i64>>,
    failures: Mutex<HashMap<i64, VecDeque<DeliveryError>>>,
    gate: Option<Gate>,
}

/// Holds each send until released, announcing that it has started.
pub struct Gate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl RecordingMessenger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn gated() -> (Arc<Self>, Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let messenger = Self {
            gate: Some(Gate {
                entered: Arc::clone(&entered),
                release: Arc::clone(&release),
            }),
            ..Self::default()
        };
        (Arc::new(messenger), entered, release)
    }

    pub fn fail_next(&self, user_id: i64, error: DeliveryError) {
        self.failures
            .lock()
            .unwrap()
            .entry(user_id)
            .or_default()
            .push_back(error);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, user_id: i64) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|s| s.user_id == user_id)
            .collect()
    }

    pub fn attempts_for(&self, user_id: i64) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|id| **id == user_id)
            .count()
    }

    fn attempt(&self, user_id: i64) -> Result<(), DeliveryError> {
        self.attempts.lock().unwrap().push(user_id);
        match self
            .failures
            .lock()
            .unwrap()
            .get_mut(&user_id)
            .and_then(VecDeque::pop_front)
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(
        &self,
        user_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), DeliveryError> {
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        self.attempt(user_id)?;
        self.sent.lock().unwrap().push(Sent {
            user_id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn edit_previous_message(
        &self,
        user_id: i64,
        _message_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<EditOutcome, DeliveryError> {
        self.send(user_id, text, keyboard).await?;
        Ok(EditOutcome::Edited)
    }

    async fn send_document(
        &self,
        user_id: i64,
        filename: &str,
        _content: Vec<u8>,
        _caption: &str,
    ) -> Result<(), DeliveryError> {
        self.send(user_id, filename, None).await
    }
}

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

/// In-memory store with a clock the test can move.
pub fn store_at(at: DateTime<Utc>) -> (Store, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(at));
    let store = Store::open_memory().unwrap().with_clock(clock.clone());
    (store, clock)
}

/// Scheduler timings with no pacing, so ticks run instantly.
pub fn fast_config() -> SchedulerConfig {
    SchedulerConfig {
        interval: Duration::from_secs(60),
        send_pacing: Duration::ZERO,
        broadcast_pacing: Duration::ZERO,
    }
}

/// Create a user who finished onboarding, with one reminder a day.
pub async fn onboarded_user(
    store: &Store,
    user_id: i64,
    timezone: &str,
    reminder_time: &str,
    behaviors: &[BehaviorCode],
) {
    store.get_or_create_user(user_id, None, None).await.unwrap();
    store.set_timezone(user_id, timezone).await.unwrap();
    store.set_reminder_time(user_id, reminder_time).await.unwrap();
    store
        .set_notification_settings(user_id, Some(true), Some(1))
        .await
        .unwrap();
    store
        .replace_tracked_behaviors(user_id, behaviors)
        .await
        .unwrap();
    store.set_onboarded(user_id, true).await.unwrap();
}
