//! Integration tests for the router: the admin gate, commands, admin
//! broadcast, template management, and anti-flood.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fast_config, onboarded_user, store_at, utc, RecordingMessenger};
use steadyday_core::catalog::BehaviorCode;
use steadyday_core::scheduler::ReminderScheduler;
use steadyday_core::{
    Config, DocumentKind, Inbound, InboundEvent, Notice, Reply, Router, Screen, Session, Store,
};

const ADMIN: i64 = 1000;
const USER: i64 = 42;

fn config(antiflood_delay_ms: u64) -> Config {
    Config {
        admin_user_id: ADMIN,
        antiflood_delay_ms,
        ..Config::default()
    }
}

async fn setup(antiflood_delay_ms: u64) -> (Store, Arc<RecordingMessenger>, Router) {
    let (store, _clock) = store_at(utc(2026, 10, 19, 7, 0, 0));
    onboarded_user(&store, USER, "Europe/Moscow", "21:00", &[BehaviorCode::Alcohol]).await;
    onboarded_user(&store, ADMIN, "Europe/Moscow", "21:00", &[BehaviorCode::Nicotine]).await;
    let messenger = RecordingMessenger::new();
    let scheduler = ReminderScheduler::new(store.clone(), messenger.clone(), fast_config());
    let router = Router::new(store.clone(), scheduler, &config(antiflood_delay_ms));
    (store, messenger, router)
}

async fn callback(router: &Router, user: i64, data: &str) -> Vec<Reply> {
    router
        .handle(Inbound::new(user, InboundEvent::Callback(data.into())))
        .await
}

async fn message(router: &Router, user: i64, text: &str) -> Vec<Reply> {
    router
        .handle(Inbound::new(user, InboundEvent::from_message(text)))
        .await
}

async fn wait_for_broadcasts(store: &Store, count: usize) {
    for _ in 0..200 {
        if store.broadcasts().await.unwrap().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("broadcast was never recorded");
}

async fn wait_for_sent(messenger: &RecordingMessenger, count: usize) {
    for _ in 0..200 {
        if messenger.sent().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {count} messages, got {:?}", messenger.sent());
}

fn only(replies: Vec<Reply>) -> Reply {
    assert_eq!(replies.len(), 1, "unexpected replies: {replies:?}");
    replies.into_iter().next().unwrap()
}

#[tokio::test]
async fn test_admin_surface_is_gated() {
    let (_store, _messenger, router) = setup(0).await;

    for data in ["admin:stats", "menu:admin", "broadcast:confirm", "template:page:0"] {
        assert_eq!(
            only(callback(&router, USER, data).await),
            Reply::Screen(Screen::PermissionDenied),
            "{data}"
        );
    }
    assert_eq!(
        only(message(&router, USER, "/admin").await),
        Reply::Screen(Screen::PermissionDenied)
    );
    assert_eq!(
        only(message(&router, ADMIN, "/admin").await),
        Reply::Screen(Screen::Admin)
    );
}

#[tokio::test]
async fn test_admin_disabled_when_unset() {
    let (store, _clock) = store_at(utc(2026, 10, 19, 7, 0, 0));
    let scheduler = ReminderScheduler::new(store.clone(), RecordingMessenger::new(), fast_config());
    let router = Router::new(store, scheduler, &Config::default());
    assert!(!router.is_admin(0));
    assert_eq!(
        only(router.handle(Inbound::new(0, InboundEvent::from_message("/admin"))).await),
        Reply::Screen(Screen::PermissionDenied)
    );
}

#[tokio::test]
async fn test_basic_commands() {
    let (_store, _messenger, router) = setup(0).await;

    assert_eq!(
        only(message(&router, USER, "/ping").await),
        Reply::Screen(Screen::Pong)
    );
    assert_eq!(
        only(message(&router, USER, "/start").await),
        Reply::Screen(Screen::MainMenu { admin: false })
    );
    assert_eq!(
        only(message(&router, ADMIN, "/menu").await),
        Reply::Screen(Screen::MainMenu { admin: true })
    );
    assert!(message(&router, USER, "/unknown").await.is_empty());

    assert_eq!(
        only(message(&router, USER, "/timezone").await),
        Reply::Screen(Screen::TimezoneUsage {
            current: "Europe/Moscow".into()
        })
    );
    // 07:00 UTC is 16:00 in Tokyo.
    assert_eq!(
        only(message(&router, USER, "/timezone Asia/Tokyo").await),
        Reply::Screen(Screen::TimezoneSet {
            timezone: "Asia/Tokyo".into(),
            local_time: "16:00".into()
        })
    );
}

#[tokio::test]
async fn test_new_user_is_greeted_and_gated() {
    let (_store, _messenger, router) = setup(0).await;

    assert_eq!(
        only(message(&router, 7, "/start").await),
        Reply::Screen(Screen::Welcome)
    );
    assert_eq!(
        only(callback(&router, 7, "menu:daily_report").await),
        Reply::Screen(Screen::SessionExpired {
            onboarded: false,
            admin: false
        })
    );
}

#[tokio::test]
async fn test_unknown_callback_expires_session() {
    let (_store, _messenger, router) = setup(0).await;
    callback(&router, USER, "settings:delete").await;
    assert_eq!(
        router.engine().session(USER).await,
        Some(Session::ConfirmingDelete)
    );

    assert_eq!(
        only(callback(&router, USER, "no:such:thing").await),
        Reply::Screen(Screen::SessionExpired {
            onboarded: true,
            admin: false
        })
    );
    assert_eq!(router.engine().session(USER).await, None);
}

#[tokio::test]
async fn test_free_text_returns_to_menu() {
    let (_store, _messenger, router) = setup(0).await;
    assert_eq!(
        only(message(&router, USER, "hello?").await),
        Reply::Screen(Screen::MainMenu { admin: false })
    );
}

#[tokio::test]
async fn test_broadcast_compose_and_confirm() {
    let (store, messenger, router) = setup(0).await;

    assert_eq!(
        only(callback(&router, ADMIN, "admin:broadcast").await),
        Reply::Screen(Screen::BroadcastPrompt)
    );
    assert_eq!(
        only(message(&router, ADMIN, "   ").await),
        Reply::Notice(Notice::EmptyText)
    );
    assert_eq!(
        only(message(&router, ADMIN, "New feature: streaks").await),
        Reply::Screen(Screen::BroadcastConfirm {
            text: "New feature: streaks".into()
        })
    );
    assert!(messenger.sent().is_empty());

    assert_eq!(
        only(callback(&router, ADMIN, "broadcast:confirm").await),
        Reply::Screen(Screen::BroadcastStarted { recipients: 2 })
    );
    wait_for_broadcasts(&store, 1).await;
    assert_eq!(messenger.sent_to(USER).len(), 1);
    wait_for_sent(&messenger, 3).await;
    let to_admin = messenger.sent_to(ADMIN);
    assert_eq!(to_admin[0].text, "New feature: streaks");
    assert_eq!(to_admin[1].text, "📢 Broadcast finished: 2 sent, 0 failed.");

    // A second confirm has nothing to send.
    assert_eq!(
        only(callback(&router, ADMIN, "broadcast:confirm").await),
        Reply::Screen(Screen::SessionExpired {
            onboarded: true,
            admin: true
        })
    );
    assert_eq!(messenger.sent().len(), 3);
}

#[tokio::test]
async fn test_other_users_are_served_during_a_broadcast() {
    let (store, _clock) = store_at(utc(2026, 10, 19, 7, 0, 0));
    onboarded_user(&store, USER, "Europe/Moscow", "21:00", &[BehaviorCode::Alcohol]).await;
    onboarded_user(&store, ADMIN, "Europe/Moscow", "21:00", &[BehaviorCode::Nicotine]).await;
    let (messenger, entered, release) = RecordingMessenger::gated();
    let scheduler = ReminderScheduler::new(store.clone(), messenger.clone(), fast_config());
    let router = Router::new(store.clone(), scheduler, &config(0));

    message(&router, ADMIN, "/admin").await;
    callback(&router, ADMIN, "admin:broadcast").await;
    message(&router, ADMIN, "Server move tonight").await;
    assert_eq!(
        only(callback(&router, ADMIN, "broadcast:confirm").await),
        Reply::Screen(Screen::BroadcastStarted { recipients: 2 })
    );

    // The first broadcast send is parked; the router still answers.
    entered.notified().await;
    assert_eq!(
        only(message(&router, USER, "/ping").await),
        Reply::Screen(Screen::Pong)
    );
    assert!(store.broadcasts().await.unwrap().is_empty());

    // Two recipients plus the summary to the admin.
    release.notify_one();
    for _ in 0..2 {
        entered.notified().await;
        release.notify_one();
    }
    wait_for_sent(&messenger, 3).await;
    assert_eq!(store.broadcasts().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_template_management() {
    let (store, _messenger, router) = setup(0).await;
    let seeded = store.list_templates().await.unwrap();

    let Reply::Screen(Screen::Templates { templates, page }) =
        only(callback(&router, ADMIN, "template:page:99").await)
    else {
        panic!("expected the template list");
    };
    assert_eq!(templates.len(), seeded.len());
    assert_eq!(page, 2);

    let first = seeded[0].id;
    callback(&router, ADMIN, &format!("template:toggle:{first}")).await;
    let toggled = store.list_templates().await.unwrap();
    assert!(!toggled[0].active);

    assert_eq!(
        only(callback(&router, ADMIN, "template:add").await),
        Reply::Screen(Screen::TemplatePrompt)
    );
    let Reply::Screen(Screen::TemplateAdded { templates }) =
        only(message(&router, ADMIN, "You showed up today.").await)
    else {
        panic!("expected the added confirmation");
    };
    assert_eq!(templates.len(), seeded.len() + 1);

    callback(&router, ADMIN, "template:add").await;
    let replies = message(&router, ADMIN, "You showed up today.").await;
    assert_eq!(replies[0], Reply::Notice(Notice::TemplateExists));
}

#[tokio::test]
async fn test_admin_stats_and_backup() {
    let (_store, _messenger, router) = setup(0).await;

    let Reply::Screen(Screen::AdminStats(stats)) =
        only(callback(&router, ADMIN, "admin:stats").await)
    else {
        panic!("expected stats");
    };
    assert_eq!(stats.total_users, 2);

    let Reply::Document {
        kind,
        filename,
        content,
    } = only(callback(&router, ADMIN, "admin:export").await)
    else {
        panic!("expected a document");
    };
    assert_eq!(kind, DocumentKind::Backup);
    assert!(filename.ends_with(".sqlite"));
    assert!(content.starts_with(b"SQLite format 3"));

    let Reply::Screen(Screen::SchedulerStatus(status)) =
        only(callback(&router, ADMIN, "admin:scheduler").await)
    else {
        panic!("expected scheduler status");
    };
    assert!(!status.running);
    assert_eq!(status.enabled_users, 2);
}

#[tokio::test]
async fn test_rapid_callbacks_are_dropped() {
    let (_store, _messenger, router) = setup(60_000).await;

    assert_eq!(callback(&router, USER, "menu:main").await.len(), 1);
    assert!(callback(&router, USER, "menu:main").await.is_empty());
    // Another user is not affected, and commands bypass the limit.
    assert_eq!(callback(&router, ADMIN, "menu:main").await.len(), 1);
    assert_eq!(message(&router, USER, "/ping").await.len(), 1);
}
