//! Integration tests for the reminder scheduler.
//!
//! These tests drive `tick()` directly against an in-memory store with a
//! pinned clock and check what reached the messenger and the notification log.

mod common;

use std::time::Duration;

use chrono::NaiveDate;
use common::{fast_config, onboarded_user, store_at, utc, RecordingMessenger};
use steadyday_core::catalog::{BehaviorCode, FALLBACK_TEMPLATE_COUNT, SUPPORT_MESSAGES};
use steadyday_core::error::DeliveryError;
use steadyday_core::model::NotificationKind;
use steadyday_core::scheduler::{ReminderScheduler, TickOutcome, TickReport};

fn ran(outcome: TickOutcome) -> TickReport {
    match outcome {
        TickOutcome::Ran(report) => report,
        TickOutcome::Coalesced => panic!("tick was coalesced"),
    }
}

#[tokio::test]
async fn test_repeated_ticks_send_once_per_day() {
    // 18:00 UTC is 21:00 in Moscow.
    let (store, _clock) = store_at(utc(2026, 10, 19, 18, 0, 0));
    onboarded_user(&store, 1, "Europe/Moscow", "21:00", &[BehaviorCode::Alcohol]).await;
    let messenger = RecordingMessenger::new();
    let scheduler = ReminderScheduler::new(store.clone(), messenger.clone(), fast_config());

    let first = ran(scheduler.tick().await.unwrap());
    assert_eq!(first.sent, 1);
    assert_eq!(first.recorded, 1);

    let second = ran(scheduler.tick().await.unwrap());
    assert_eq!(second.due, 1);
    assert_eq!(second.duplicates, 1);
    assert_eq!(second.sent, 0);

    assert_eq!(messenger.sent_to(1).len(), 1);
    let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
    assert_eq!(store.notification_count(1, today).await.unwrap(), 1);
    assert!(!store
        .try_record_notification(1, NotificationKind::Reminder, today)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_each_user_is_checked_on_their_own_clock() {
    let (store, clock) = store_at(utc(2026, 10, 19, 12, 0, 0));
    onboarded_user(&store, 1, "Asia/Tokyo", "21:00", &[BehaviorCode::Nicotine]).await;
    onboarded_user(&store, 2, "UTC", "21:00", &[BehaviorCode::Nicotine]).await;
    let messenger = RecordingMessenger::new();
    let scheduler = ReminderScheduler::new(store.clone(), messenger.clone(), fast_config());

    // 12:00 UTC is 21:00 in Tokyo.
    let report = ran(scheduler.tick().await.unwrap());
    assert_eq!(report.users_scanned, 2);
    assert_eq!(report.sent, 1);
    assert_eq!(messenger.sent_to(1).len(), 1);
    assert!(messenger.sent_to(2).is_empty());

    clock.set(utc(2026, 10, 19, 21, 0, 0));
    let report = ran(scheduler.tick().await.unwrap());
    assert_eq!(report.sent, 1);
    assert_eq!(messenger.sent_to(1).len(), 1);
    assert_eq!(messenger.sent_to(2).len(), 1);
}

#[tokio::test]
async fn test_due_window_is_one_minute() {
    let (store, clock) = store_at(utc(2026, 10, 19, 18, 2, 0));
    onboarded_user(&store, 1, "Europe/Moscow", "21:00", &[BehaviorCode::Food]).await;
    let messenger = RecordingMessenger::new();
    let scheduler = ReminderScheduler::new(store.clone(), messenger.clone(), fast_config());

    // 21:02 local is outside the tolerance.
    let report = ran(scheduler.tick().await.unwrap());
    assert_eq!(report.due, 0);
    assert!(messenger.sent().is_empty());

    // 21:00:59 local still counts as 21:00.
    clock.set(utc(2026, 10, 19, 18, 0, 59));
    let report = ran(scheduler.tick().await.unwrap());
    assert_eq!(report.sent, 1);
}

#[tokio::test]
async fn test_reminder_carries_report_keyboard() {
    let (store, _clock) = store_at(utc(2026, 10, 19, 18, 0, 0));
    onboarded_user(&store, 1, "Europe/Moscow", "21:00", &[BehaviorCode::Food]).await;
    let messenger = RecordingMessenger::new();
    let scheduler = ReminderScheduler::new(store, messenger.clone(), fast_config());

    scheduler.tick().await.unwrap();
    let sent = messenger.sent_to(1);
    let keyboard = sent[0].keyboard.as_ref().expect("reminder keyboard");
    assert_eq!(
        keyboard.callback_data().collect::<Vec<_>>(),
        vec!["menu:daily_report", "menu:main"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_send_is_retried_once() {
    let (store, _clock) = store_at(utc(2026, 10, 19, 18, 0, 0));
    onboarded_user(&store, 1, "Europe/Moscow", "21:00", &[BehaviorCode::Gambling]).await;
    let messenger = RecordingMessenger::new();
    messenger.fail_next(
        1,
        DeliveryError::RateLimited {
            retry_after: Duration::from_secs(3),
        },
    );
    let scheduler = ReminderScheduler::new(store, messenger.clone(), fast_config());

    let report = ran(scheduler.tick().await.unwrap());
    assert_eq!(report.sent, 1);
    assert_eq!(report.failed(), 0);
    assert_eq!(messenger.attempts_for(1), 2);
    assert_eq!(messenger.sent_to(1).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_second_transient_fault_is_counted_not_retried_again() {
    let (store, _clock) = store_at(utc(2026, 10, 19, 18, 0, 0));
    onboarded_user(&store, 1, "Europe/Moscow", "21:00", &[BehaviorCode::Gambling]).await;
    let messenger = RecordingMessenger::new();
    messenger.fail_next(1, DeliveryError::Network("reset".into()));
    messenger.fail_next(1, DeliveryError::Network("reset".into()));
    let scheduler = ReminderScheduler::new(store, messenger.clone(), fast_config());

    let report = ran(scheduler.tick().await.unwrap());
    assert_eq!(report.transient_failures, 1);
    assert_eq!(messenger.attempts_for(1), 2);
}

#[tokio::test]
async fn test_permanent_failure_keeps_the_record() {
    let (store, _clock) = store_at(utc(2026, 10, 19, 18, 0, 0));
    onboarded_user(&store, 1, "Europe/Moscow", "21:00", &[BehaviorCode::Porn]).await;
    let messenger = RecordingMessenger::new();
    messenger.fail_next(1, DeliveryError::Forbidden("bot was blocked by the user".into()));
    let scheduler = ReminderScheduler::new(store.clone(), messenger.clone(), fast_config());

    let report = ran(scheduler.tick().await.unwrap());
    assert_eq!(report.recorded, 1);
    assert_eq!(report.permanent_failures, 1);
    assert_eq!(messenger.attempts_for(1), 1);

    // Recorded but not delivered: the next tick does not try again.
    let report = ran(scheduler.tick().await.unwrap());
    assert_eq!(report.duplicates, 1);
    assert_eq!(messenger.attempts_for(1), 1);
    let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
    assert_eq!(store.notification_count(1, today).await.unwrap(), 1);
}

#[tokio::test]
async fn test_disabled_and_unfinished_users_are_skipped() {
    let (store, _clock) = store_at(utc(2026, 10, 19, 18, 0, 0));
    onboarded_user(&store, 1, "Europe/Moscow", "21:00", &[BehaviorCode::Other]).await;
    store
        .set_notification_settings(1, Some(false), None)
        .await
        .unwrap();
    store.get_or_create_user(2, None, None).await.unwrap();
    let messenger = RecordingMessenger::new();
    let scheduler = ReminderScheduler::new(store, messenger.clone(), fast_config());

    let report = ran(scheduler.tick().await.unwrap());
    assert_eq!(report.users_scanned, 0);
    assert!(messenger.sent().is_empty());
}

#[tokio::test]
async fn test_overlapping_tick_is_coalesced() {
    let (store, _clock) = store_at(utc(2026, 10, 19, 18, 0, 0));
    onboarded_user(&store, 1, "Europe/Moscow", "21:00", &[BehaviorCode::Alcohol]).await;
    let (messenger, entered, release) = RecordingMessenger::gated();
    let scheduler = ReminderScheduler::new(store, messenger.clone(), fast_config());

    let background = scheduler.clone();
    let first = tokio::spawn(async move { background.tick().await });
    entered.notified().await;

    assert_eq!(scheduler.tick().await.unwrap(), TickOutcome::Coalesced);

    release.notify_one();
    let report = ran(first.await.unwrap().unwrap());
    assert_eq!(report.sent, 1);
    assert_eq!(messenger.sent().len(), 1);
}

#[tokio::test]
async fn test_fallback_texts_when_no_template_is_active() {
    let (store, _clock) = store_at(utc(2026, 10, 19, 18, 0, 0));
    onboarded_user(&store, 1, "Europe/Moscow", "21:00", &[BehaviorCode::Alcohol]).await;
    for template in store.list_templates().await.unwrap() {
        if template.active {
            store.toggle_template(template.id).await.unwrap();
        }
    }
    assert!(store.active_templates().await.unwrap().is_empty());
    let messenger = RecordingMessenger::new();
    let scheduler = ReminderScheduler::new(store, messenger.clone(), fast_config());

    scheduler.tick().await.unwrap();
    let sent = messenger.sent_to(1);
    assert_eq!(sent.len(), 1);
    assert!(SUPPORT_MESSAGES[..FALLBACK_TEMPLATE_COUNT].contains(&sent[0].text.as_str()));
}

#[tokio::test]
async fn test_only_active_templates_are_used() {
    let (store, _clock) = store_at(utc(2026, 10, 19, 18, 0, 0));
    onboarded_user(&store, 1, "Europe/Moscow", "21:00", &[BehaviorCode::Alcohol]).await;
    for template in store.list_templates().await.unwrap() {
        store.toggle_template(template.id).await.unwrap();
    }
    assert!(store.add_template("One day at a time.").await.unwrap());
    let messenger = RecordingMessenger::new();
    let scheduler = ReminderScheduler::new(store, messenger.clone(), fast_config());

    scheduler.tick().await.unwrap();
    assert_eq!(messenger.sent_to(1)[0].text, "One day at a time.");
}

#[tokio::test]
async fn test_broadcast_reaches_everyone_and_is_audited() {
    let (store, _clock) = store_at(utc(2026, 10, 19, 10, 0, 0));
    for id in [1, 2, 3] {
        store.get_or_create_user(id, None, None).await.unwrap();
    }
    let messenger = RecordingMessenger::new();
    messenger.fail_next(2, DeliveryError::Forbidden("blocked".into()));
    let scheduler = ReminderScheduler::new(store.clone(), messenger.clone(), fast_config());

    let report = scheduler.broadcast("Maintenance tonight").await.unwrap();
    assert_eq!((report.sent, report.failed), (2, 1));

    let log = store.broadcasts().await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].id, report.record_id);
    assert_eq!(log[0].text, "Maintenance tonight");
    assert_eq!((log[0].sent, log[0].failed), (2, 1));
    assert!(messenger.sent().iter().all(|s| s.keyboard.is_none()));
}

#[tokio::test]
async fn test_background_broadcast_reports_to_the_requester() {
    let (store, _clock) = store_at(utc(2026, 10, 19, 10, 0, 0));
    for id in [1, 2, 3] {
        store.get_or_create_user(id, None, None).await.unwrap();
    }
    let messenger = RecordingMessenger::new();
    messenger.fail_next(3, DeliveryError::Forbidden("blocked".into()));
    let scheduler = ReminderScheduler::new(store.clone(), messenger.clone(), fast_config());

    let job = scheduler.spawn_broadcast("Maintenance tonight".into(), 1).await.unwrap();
    assert_eq!(job.recipients, 3);
    let report = job.handle.await.unwrap().unwrap();
    assert_eq!((report.sent, report.failed), (2, 1));

    let to_requester = messenger.sent_to(1);
    assert_eq!(to_requester.len(), 2);
    assert_eq!(to_requester[1].text, "📢 Broadcast finished: 2 sent, 1 failed.");
    assert_eq!(store.broadcasts().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_start_and_stop_are_idempotent() {
    let (store, _clock) = store_at(utc(2026, 10, 19, 10, 0, 0));
    let scheduler = ReminderScheduler::new(store, RecordingMessenger::new(), fast_config());

    assert!(scheduler.start().await);
    assert!(!scheduler.start().await);
    assert!(scheduler.is_running());
    let status = scheduler.status().await.unwrap();
    assert!(status.running);
    assert_eq!(status.interval_secs, 60);
    assert_eq!(status.timezone, "Europe/Moscow");

    assert!(scheduler.stop().await);
    assert!(!scheduler.stop().await);
    assert!(!scheduler.is_running());
    assert_eq!(scheduler.status().await.unwrap().next_tick, None);
}

