//! End-to-end tests for the patient feed.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::time::Duration;

use mindwatch_console::api::{ApiClient, ImageUpload};
use mindwatch_console::dashboards::{DashboardContext, PatientDashboard};
use mindwatch_console::feed::{SAMPLE_POSTS, SubmitError, start_simulation};
use mindwatch_console::services::AuthService;
use mindwatch_console::{MemorySessionStore, SyncIntervals};
use mindwatch_core::{RiskLevel, Role, UserId};
use mindwatch_integration_tests::FakeBackend;
use secrecy::SecretString;
use tempfile::TempDir;

async fn setup() -> (FakeBackend, PatientDashboard) {
    let backend = FakeBackend::start().await.unwrap();
    let dir = TempDir::new().unwrap();
    let api = ApiClient::from_config(&backend.config(dir.path())).unwrap();
    backend.add_user("P-001", "pw", "Somchai");

    let store = MemorySessionStore::new();
    let auth = AuthService::new(&api, &store);
    auth.login(&UserId::new("P-001"), &SecretString::from("pw"))
        .await
        .unwrap();
    let ctx = DashboardContext {
        api: api.clone(),
        intervals: SyncIntervals::default(),
        page_size: 10,
    };
    let dash = PatientDashboard::open(auth.gate(Role::Patient).unwrap(), &ctx).unwrap();
    (backend, dash)
}

#[tokio::test]
async fn test_thai_post_gets_exactly_one_verdict() {
    let (backend, dash) = setup().await;

    let id = dash
        .submit("รู้สึกเหนื่อยกับทุกอย่าง ไม่ไหวแล้ว...", None)
        .await
        .unwrap();

    let posts = dash.posts();
    assert_eq!(posts.len(), 1);
    let post = posts.first().unwrap();
    assert_eq!(post.id, id);
    assert!(!post.analyzing);
    let result = post.result.as_ref().unwrap();
    assert!(result.level.is(RiskLevel::Red));
    assert_eq!(backend.hits("analyze"), 1);
    assert_eq!(backend.inspect(|s| s.notifications.len()), 1);
}

#[tokio::test]
async fn test_song_post_flag_clears_once() {
    let (backend, dash) = setup().await;
    let mut changes = dash.feed().subscribe();

    let id = dash
        .submit("ฟังเพลงนี้แล้วคิดถึงแฟนเก่า", None)
        .await
        .unwrap();

    // The insert and the verdict are two sends; the receiver sees the latest
    assert!(changes.has_changed().unwrap());
    let posts = changes.borrow_and_update().clone();
    assert_eq!(posts.len(), 1);
    let post = posts.first().unwrap();
    assert_eq!(post.id, id);
    assert!(!post.analyzing);
    assert!(post.result.as_ref().unwrap().level.is(RiskLevel::Green));
    assert_eq!(backend.hits("analyze"), 1);
    assert_eq!(backend.inspect(|s| s.history["P-001"].len()), 1);
}

#[tokio::test]
async fn test_image_post_goes_to_image_endpoint() {
    let (backend, dash) = setup().await;
    let image = ImageUpload::new("mood.png", vec![0x89, b'P', b'N', b'G']);

    dash.submit("ดูรูปนี้สิ", Some(image)).await.unwrap();

    assert_eq!(backend.hits("analyze-image"), 1);
    assert_eq!(backend.hits("analyze"), 0);
    let post = dash.posts().into_iter().next().unwrap();
    assert_eq!(post.image_name.as_deref(), Some("mood.png"));
    let result = post.result.unwrap();
    assert_eq!(result.content_type.as_deref(), Some("image"));
    assert_eq!(result.media_context.as_deref(), Some("mood.png (4 bytes)"));
}

#[tokio::test]
async fn test_blank_post_makes_no_request() {
    let (backend, dash) = setup().await;
    let before = backend.total_hits();

    let err = dash.submit("   ", None).await.unwrap_err();

    assert!(matches!(err, SubmitError::Empty));
    assert!(dash.posts().is_empty());
    assert_eq!(backend.total_hits(), before);
}

#[tokio::test]
async fn test_failed_analysis_keeps_the_post() {
    let (backend, dash) = setup().await;
    backend.fail("analyze");

    dash.submit("กินข้าวกันครับทุกคน", None).await.unwrap();

    let post = dash.posts().into_iter().next().unwrap();
    assert!(!post.analyzing);
    assert!(post.result.is_none());
}

#[tokio::test]
async fn test_posts_reach_history() {
    let (_backend, dash) = setup().await;
    dash.submit("วันนี้อากาศดีจัง", None).await.unwrap();
    dash.submit("เบื่อโลก", None).await.unwrap();

    let history = dash.history().await.unwrap();

    assert_eq!(history.len(), 2);
    assert_eq!(history.first().unwrap().content, "เบื่อโลก");
}

#[tokio::test]
async fn test_simulation_posts_samples() {
    let (backend, dash) = setup().await;

    let handle = start_simulation(dash.feed().clone(), Duration::from_millis(20), Some(2));
    let posted = tokio::time::timeout(Duration::from_secs(60), handle.join())
        .await
        .unwrap();

    assert_eq!(posted, 2);
    let posts = dash.posts();
    assert_eq!(posts.len(), 2);
    assert!(posts.iter().all(|p| p.simulated && !p.analyzing));
    assert!(posts.iter().all(|p| SAMPLE_POSTS.contains(&p.content.as_str())));
    assert_eq!(backend.hits("analyze"), 2);
}
