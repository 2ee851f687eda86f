//! Integration tests for the admin dashboard against the fake backend.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use mindwatch_console::api::ApiClient;
use mindwatch_console::dashboards::{AdminDashboard, DashboardContext};
use mindwatch_console::services::AuthService;
use mindwatch_console::sync::Schedule;
use mindwatch_console::{ErrorKind, MemorySessionStore, Resource, SyncIntervals};
use mindwatch_core::{Admitted, Role, UserId};
use mindwatch_integration_tests::FakeBackend;
use secrecy::SecretString;
use tempfile::TempDir;

async fn setup(page_size: usize) -> (FakeBackend, DashboardContext, Admitted) {
    let backend = FakeBackend::start().await.unwrap();
    let dir = TempDir::new().unwrap();
    let api = ApiClient::from_config(&backend.config(dir.path())).unwrap();

    backend.add_user("ADMIN1", "pw", "Admin");
    backend.add_user("DR-1", "pw", "Dr. Ann");
    backend.add_user("T-1", "pw", "Therapist Bee");
    backend.add_user("P-1", "pw", "Somchai");
    backend.add_user("P-2", "pw", "Malee");
    backend.seed_analysis("P-2", "ไม่ไหวแล้วจริงๆ");

    let store = MemorySessionStore::new();
    let auth = AuthService::new(&api, &store);
    auth.login(&UserId::new("ADMIN1"), &SecretString::from("pw"))
        .await
        .unwrap();
    let admitted = auth.gate(Role::Admin).unwrap();

    let ctx = DashboardContext {
        api,
        intervals: SyncIntervals::default(),
        page_size,
    };
    (backend, ctx, admitted)
}

#[tokio::test]
async fn test_summary_after_refresh() {
    let (_backend, ctx, admitted) = setup(10).await;
    let dash = AdminDashboard::open_with_schedule(admitted, &ctx, Schedule::Manual).unwrap();

    let report = dash.view().refresh().await;
    assert_eq!(report.applied, 3);

    let summary = dash.summary();
    assert_eq!(summary.total_users, 5);
    assert_eq!(summary.admins, 1);
    assert_eq!(summary.psychiatrists, 1);
    assert_eq!(summary.therapists, 1);
    assert_eq!(summary.patients, 2);
    assert_eq!(summary.status.red, 1);
    assert_eq!(summary.status.unknown, 1);
    let analytics = summary.analytics.unwrap();
    assert_eq!(analytics.risk_distribution.len(), 3);
    assert_eq!(analytics.trend_data.len(), 1);
}

#[tokio::test]
async fn test_failed_resource_keeps_the_others() {
    let (backend, ctx, admitted) = setup(10).await;
    backend.fail("users");
    let dash = AdminDashboard::open_with_schedule(admitted, &ctx, Schedule::Manual).unwrap();

    let report = dash.view().refresh().await;

    assert!(report.is_partial_failure());
    assert_eq!(report.applied, 2);
    assert_eq!(report.failed, 1);
    let cache = dash.view().snapshot();
    assert!(cache.is_loaded(&Resource::Patients));
    assert!(cache.is_loaded(&Resource::Analytics));
    assert!(!cache.is_loaded(&Resource::Users));
    assert_eq!(dash.summary().total_users, 0);
}

#[tokio::test]
async fn test_delete_user_updates_cache_and_backend() {
    let (backend, ctx, admitted) = setup(10).await;
    let dash = AdminDashboard::open_with_schedule(admitted, &ctx, Schedule::Manual).unwrap();
    dash.view().refresh().await;

    dash.delete_user(&UserId::new("P-1")).await.unwrap();

    assert_eq!(dash.summary().total_users, 4);
    assert!(dash.search("P-1").is_empty());
    assert!(backend.inspect(|s| s.accounts.iter().all(|a| a.id != "P-1")));
}

#[tokio::test]
async fn test_delete_unknown_user_leaves_cache_alone() {
    let (_backend, ctx, admitted) = setup(10).await;
    let dash = AdminDashboard::open_with_schedule(admitted, &ctx, Schedule::Manual).unwrap();
    dash.view().refresh().await;
    let before = dash.view().snapshot();

    let err = dash.delete_user(&UserId::new("P-404")).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NetworkFailure);
    assert_eq!(dash.view().snapshot(), before);
}

#[tokio::test]
async fn test_delete_confirmed_after_close_leaves_cache_alone() {
    let (backend, ctx, admitted) = setup(10).await;
    let dash = AdminDashboard::open_with_schedule(admitted, &ctx, Schedule::Manual).unwrap();
    dash.view().refresh().await;
    backend.delay_next("delete-user", Duration::from_millis(300));

    let user = UserId::new("P-1");
    let (result, ()) = tokio::join!(dash.delete_user(&user), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        dash.close();
    });

    result.unwrap();
    assert!(backend.inspect(|s| s.accounts.iter().all(|a| a.id != "P-1")));
    assert_eq!(dash.summary().total_users, 5);
}

#[tokio::test]
async fn test_search_is_windowed() {
    let (_backend, ctx, admitted) = setup(2).await;
    let dash = AdminDashboard::open_with_schedule(admitted, &ctx, Schedule::Manual).unwrap();
    dash.view().refresh().await;

    assert_eq!(dash.search("").len(), 2);
    assert_eq!(dash.match_count(""), 5);
    assert_eq!(dash.match_count("malee"), 1);
}

#[tokio::test]
async fn test_analyze_refreshes_overview() {
    let (backend, ctx, admitted) = setup(10).await;
    let dash = AdminDashboard::open_with_schedule(admitted, &ctx, Schedule::Manual).unwrap();

    let result = dash.analyze("วันนี้ทำงานเสร็จเร็ว ดีใจจัง").await.unwrap();

    assert_eq!(result.level.as_str(), "GREEN");
    assert_eq!(backend.hits("analyze"), 1);
    assert!(dash.view().snapshot().is_loaded(&Resource::Users));
}

#[tokio::test]
async fn test_polling_picks_up_new_users() {
    let (backend, mut ctx, admitted) = setup(10).await;
    ctx.intervals.patients = Duration::from_millis(50);
    let dash = AdminDashboard::open(admitted, &ctx).unwrap();
    let mut changes = dash.view().subscribe();

    tokio::time::timeout(
        Duration::from_secs(5),
        changes.wait_for(|cache| cache.users().len() == 5),
    )
    .await
    .unwrap()
    .unwrap();

    backend.add_user("P-3", "pw", "Newcomer");
    tokio::time::timeout(
        Duration::from_secs(5),
        changes.wait_for(|cache| cache.users().len() == 6),
    )
    .await
    .unwrap()
    .unwrap();

    dash.close();
    assert!(dash.view().is_cancelled());
}
