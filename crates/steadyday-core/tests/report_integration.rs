//! Integration tests for the daily report flow.
//!
//! Events go through the router as raw callback payloads, the way a
//! transport would deliver them, and the results are checked in the store.

mod common;

use chrono::NaiveDate;
use common::{fast_config, onboarded_user, store_at, utc, RecordingMessenger};
use steadyday_core::catalog::BehaviorCode;
use steadyday_core::model::{CravingLevel, LogStatus};
use steadyday_core::scheduler::ReminderScheduler;
use steadyday_core::stats::SummaryRow;
use steadyday_core::{Config, Inbound, InboundEvent, Reply, Router, Screen, Store};

const USER: i64 = 42;

fn router(store: &Store) -> Router {
    let config = Config {
        antiflood_delay_ms: 0,
        ..Config::default()
    };
    let scheduler = ReminderScheduler::new(store.clone(), RecordingMessenger::new(), fast_config());
    Router::new(store.clone(), scheduler, &config)
}

async fn press(router: &Router, data: &str) -> Vec<Reply> {
    router
        .handle(Inbound::new(USER, InboundEvent::Callback(data.to_string())))
        .await
}

fn screen(replies: Vec<Reply>) -> Screen {
    match replies.into_iter().next() {
        Some(Reply::Screen(screen)) => screen,
        other => panic!("expected a screen, got {other:?}"),
    }
}

async fn setup() -> (Store, Router) {
    // 10:00 in Moscow.
    let (store, _clock) = store_at(utc(2026, 10, 19, 7, 0, 0));
    onboarded_user(
        &store,
        USER,
        "Europe/Moscow",
        "21:00",
        &[BehaviorCode::Food, BehaviorCode::Alcohol, BehaviorCode::Nicotine],
    )
    .await;
    let router = router(&store);
    (store, router)
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

#[tokio::test]
async fn test_full_report_with_relapse() {
    let (store, router) = setup().await;

    let first = screen(press(&router, "menu:daily_report").await);
    assert_eq!(
        first,
        Screen::ReportQuestion {
            behavior: BehaviorCode::Alcohol,
            index: 0,
            total: 3
        }
    );

    assert_eq!(
        screen(press(&router, "report:status:relapse").await),
        Screen::RelapseSupport {
            behavior: BehaviorCode::Alcohol
        }
    );
    // Nothing is written while answers are still being collected.
    assert!(store.logs_for_date(USER, today()).await.unwrap().is_empty());

    assert_eq!(
        screen(press(&router, "report:continue").await),
        Screen::ReportQuestion {
            behavior: BehaviorCode::Nicotine,
            index: 1,
            total: 3
        }
    );
    press(&router, "report:status:clean").await;
    assert_eq!(
        screen(press(&router, "report:status:unclear").await),
        Screen::CravingQuestion
    );
    assert_eq!(
        screen(press(&router, "report:craving:high").await),
        Screen::SupportNeedQuestion
    );
    assert_eq!(
        screen(press(&router, "report:support:no").await),
        Screen::ReportSaved { admin: false }
    );

    let logs = store.logs_for_date(USER, today()).await.unwrap();
    assert_eq!(logs.len(), 3);
    let alcohol = logs
        .iter()
        .find(|l| l.behavior == BehaviorCode::Alcohol)
        .unwrap();
    assert_eq!(alcohol.status, LogStatus::Relapse);
    assert!(logs.iter().all(|l| l.craving == Some(CravingLevel::High)));
}

#[tokio::test]
async fn test_needing_support_leads_to_emergency() {
    let (store, router) = setup().await;
    press(&router, "menu:daily_report").await;
    for _ in 0..3 {
        press(&router, "report:status:clean").await;
    }
    press(&router, "report:craving:skip").await;
    assert_eq!(
        screen(press(&router, "report:support:yes").await),
        Screen::Emergency
    );
    let logs = store.logs_for_date(USER, today()).await.unwrap();
    assert_eq!(logs.len(), 3);
    assert!(logs.iter().all(|l| l.craving.is_none()));
}

#[tokio::test]
async fn test_completed_day_shows_summary_and_edit_overwrites() {
    let (store, router) = setup().await;
    press(&router, "menu:daily_report").await;
    for _ in 0..3 {
        press(&router, "report:status:clean").await;
    }
    press(&router, "report:craving:low").await;
    press(&router, "report:support:no").await;

    let summary = screen(press(&router, "menu:daily_report").await);
    let Screen::ReportSummary { rows } = summary else {
        panic!("expected the summary, got {summary:?}");
    };
    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows[0],
        SummaryRow {
            behavior: BehaviorCode::Alcohol,
            status: Some(LogStatus::Clean),
            craving: Some(CravingLevel::Low)
        }
    );

    // Editing restarts the questions and replaces the day's rows.
    assert!(matches!(
        screen(press(&router, "report:edit").await),
        Screen::ReportQuestion { index: 0, .. }
    ));
    for _ in 0..3 {
        press(&router, "report:status:unclear").await;
    }
    press(&router, "report:craving:medium").await;
    press(&router, "report:support:no").await;

    let logs = store.logs_for_date(USER, today()).await.unwrap();
    assert_eq!(logs.len(), 3);
    assert!(logs.iter().all(|l| l.status == LogStatus::Unclear));
    assert!(logs.iter().all(|l| l.craving == Some(CravingLevel::Medium)));
}

#[tokio::test]
async fn test_stale_report_button_expires() {
    let (store, router) = setup().await;
    assert_eq!(
        screen(press(&router, "report:status:clean").await),
        Screen::SessionExpired {
            onboarded: true,
            admin: false
        }
    );

    // Out-of-order answer inside a live session.
    press(&router, "menu:daily_report").await;
    assert_eq!(
        screen(press(&router, "report:craving:high").await),
        Screen::SessionExpired {
            onboarded: true,
            admin: false
        }
    );
    assert_eq!(router.engine().session(USER).await, None);
    assert!(store.logs_for_date(USER, today()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_discards_answers() {
    let (store, router) = setup().await;
    press(&router, "menu:daily_report").await;
    press(&router, "report:status:clean").await;
    assert_eq!(
        screen(press(&router, "report:cancel").await),
        Screen::MainMenu { admin: false }
    );
    assert!(store.logs_for_date(USER, today()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_emergency_mid_report_keeps_the_session() {
    let (_store, router) = setup().await;
    press(&router, "menu:daily_report").await;
    press(&router, "report:status:clean").await;
    assert_eq!(screen(press(&router, "menu:emergency").await), Screen::Emergency);
    assert_eq!(
        screen(press(&router, "report:status:clean").await),
        Screen::ReportQuestion {
            behavior: BehaviorCode::Food,
            index: 2,
            total: 3
        }
    );
}
