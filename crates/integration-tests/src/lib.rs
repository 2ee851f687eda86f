//! Integration tests for Mindwatch.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p mindwatch-integration-tests
//! ```
//!
//! The tests need no external services. [`FakeBackend`] serves the
//! monitoring API from memory on an ephemeral local port, so the console
//! talks real HTTP through its own client.
//!
//! # Test Categories
//!
//! - `auth_flow` - Login, registration, logout and the dashboard gate
//! - `admin_dashboard` - Overview sync, partial failure and user deletion
//! - `staff_dashboards` - Therapist intake, notifications and red-case export
//! - `patient_feed` - Posting and analysis end to end
//!
//! # Fake Backend
//!
//! Tokens are `token-<user id>`. Messages containing a distress phrase are
//! classified RED and raise a notification and a red case. Any endpoint can
//! be switched to fail with a 500, and every endpoint counts its hits.
//! `history`, `create-patient`, `delete-user` and `mark-read` replies can be
//! held back with [`FakeBackend::delay_next`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path as FsPath;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use mindwatch_console::ConsoleConfig;
use mindwatch_core::{
    AnalysisId, AnalysisResult, AnalyticsSnapshot, BackendHealth, HistoryEntry, Notification,
    NotificationId, PatientRecord, RedCase, RiskLevel, RiskSlice, RiskStatus, Role, TrendPoint,
    UserId, resolve_role, stats,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

/// Phrases the fake classifier treats as RED.
pub const RED_PHRASES: &[&str] = &["ไม่ไหว", "อยากหายไป", "ช่วยด้วย"];

/// Phrases the fake classifier treats as YELLOW.
pub const YELLOW_PHRASES: &[&str] = &["เหนื่อย", "เบื่อ"];

/// A registered account.
#[derive(Debug, Clone, Default)]
pub struct Account {
    pub id: String,
    pub password: String,
    pub name: String,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub medical_history: Option<String>,
    pub social_media_handle: Option<String>,
}

/// Everything the fake backend knows.
#[derive(Debug, Default)]
pub struct BackendState {
    pub accounts: Vec<Account>,
    /// Analysis history per user, oldest first.
    pub history: HashMap<String, Vec<HistoryEntry>>,
    pub notifications: Vec<Notification>,
    pub red_cases: Vec<RedCase>,
    failing: HashSet<String>,
    hits: HashMap<String, usize>,
    delays: HashMap<String, VecDeque<Duration>>,
    next_id: i64,
}

impl BackendState {
    /// Count a hit on `endpoint` and fail it if it was switched off.
    fn enter(&mut self, endpoint: &str) -> Result<(), Failure> {
        *self.hits.entry(endpoint.to_owned()).or_default() += 1;
        if self.failing.contains(endpoint) {
            return Err(Failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{endpoint} unavailable"),
            ));
        }
        Ok(())
    }

    /// Delay queued for the next request to `endpoint`.
    fn take_delay(&mut self, endpoint: &str) -> Option<Duration> {
        self.delays.get_mut(endpoint).and_then(VecDeque::pop_front)
    }

    /// User ID behind the bearer token.
    fn authorize(&self, headers: &HeaderMap) -> Result<String, Failure> {
        let user = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer token-"))
            .filter(|id| self.account(id).is_some())
            .ok_or_else(|| Failure(StatusCode::UNAUTHORIZED, "Unauthorized".to_owned()))?;
        Ok(user.to_owned())
    }

    fn account(&self, id: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == id)
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn latest(&self, id: &str) -> Option<&HistoryEntry> {
        self.history.get(id).and_then(|entries| entries.last())
    }

    fn record(&self, account: &Account) -> PatientRecord {
        let latest = self.latest(&account.id);
        PatientRecord {
            id: UserId::new(account.id.clone()),
            name: account.name.clone(),
            age: account.age,
            gender: account.gender.clone(),
            medical_history: account.medical_history.clone(),
            social_media_handle: account.social_media_handle.clone(),
            status: latest.map_or(RiskStatus::Unknown, |e| e.result_level),
            last_update: latest.map(|e| e.timestamp.clone()),
        }
    }

    fn insert_account(&mut self, account: Account) -> Result<(), Failure> {
        if self.account(&account.id).is_some() {
            return Err(Failure(
                StatusCode::BAD_REQUEST,
                "User ID already exists".to_owned(),
            ));
        }
        self.accounts.push(account);
        Ok(())
    }

    /// Classify `message` for `user_id` and record the result.
    fn analyze(&mut self, user_id: &str, message: &str, content_type: &str) -> AnalysisResult {
        let (level, score, reason) = classify(message);
        let timestamp = now();
        let id = self.next_id();
        self.history.entry(user_id.to_owned()).or_default().push(HistoryEntry {
            id: Some(AnalysisId::new(id)),
            timestamp: timestamp.clone(),
            content: message.to_owned(),
            result_level: level.into(),
            score,
            reason: reason.to_owned(),
            keywords: Vec::new(),
            recommendation: None,
        });

        if level == RiskLevel::Red {
            let name = self.account(user_id).map(|a| a.name.clone());
            self.red_cases.push(RedCase {
                user_id: UserId::new(user_id),
                name,
                score,
                reason: reason.to_owned(),
                timestamp: Some(timestamp.clone()),
            });
            let id = self.next_id();
            self.notifications.push(Notification {
                id: NotificationId::new(id),
                message: format!("RED risk detected for {user_id}"),
                timestamp,
                user_id: Some(UserId::new(user_id)),
                content_type: Some(content_type.to_owned()),
                content_preview: Some(message.chars().take(50).collect()),
                is_read: false,
            });
        }

        AnalysisResult {
            level: level.into(),
            score,
            reason: reason.to_owned(),
            recommendation: (level == RiskLevel::Red).then(|| "Contact a professional".to_owned()),
            keywords: Vec::new(),
            content_type: Some(content_type.to_owned()),
            media_context: None,
            url_analyses: Vec::new(),
            image_url: None,
            user_id: Some(UserId::new(user_id)),
        }
    }

    fn analytics(&self) -> AnalyticsSnapshot {
        let patients: Vec<PatientRecord> = self
            .accounts
            .iter()
            .filter(|a| resolve_role(&a.id) == Role::Patient)
            .map(|a| self.record(a))
            .collect();
        let risk_distribution = RiskLevel::ALL
            .iter()
            .map(|&level| RiskSlice {
                name: level.as_str().to_owned(),
                value: stats::count_by_status(&patients, level) as u64,
                color: color(level).to_owned(),
            })
            .collect();
        let scores: Vec<f64> = self.history.values().flatten().map(|e| e.score).collect();
        let trend_data = if scores.is_empty() {
            Vec::new()
        } else {
            vec![TrendPoint {
                date: Utc::now().format("%Y-%m-%d").to_string(),
                avg_score: stats::average(&scores),
            }]
        };
        AnalyticsSnapshot {
            risk_distribution,
            trend_data,
        }
    }
}

/// Error response in the backend's `{"error": "..."}` shape.
#[derive(Debug)]
pub struct Failure(StatusCode, String);

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

impl From<axum::extract::multipart::MultipartError> for Failure {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        Self(StatusCode::BAD_REQUEST, e.body_text())
    }
}

type Shared = Arc<Mutex<BackendState>>;

fn lock(state: &Shared) -> MutexGuard<'_, BackendState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sleep for the delay queued on `endpoint`, if any.
async fn stall(state: &Shared, endpoint: &str) {
    let delay = lock(state).take_delay(endpoint);
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

fn now() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

fn classify(message: &str) -> (RiskLevel, f64, &'static str) {
    if RED_PHRASES.iter().any(|p| message.contains(p)) {
        (RiskLevel::Red, 9.0, "Expressions of hopelessness")
    } else if YELLOW_PHRASES.iter().any(|p| message.contains(p)) {
        (RiskLevel::Yellow, 5.5, "Signs of fatigue")
    } else {
        (RiskLevel::Green, 1.0, "No risk indicators")
    }
}

const fn color(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Green => "#10b981",
        RiskLevel::Yellow => "#f59e0b",
        RiskLevel::Red => "#f43f5e",
    }
}

/// In-process monitoring backend bound to `127.0.0.1`.
///
/// The server task is aborted when the value is dropped.
pub struct FakeBackend {
    base: Url,
    state: Shared,
    task: JoinHandle<()>,
}

impl FakeBackend {
    /// Bind an ephemeral port and start serving.
    ///
    /// # Errors
    ///
    /// Returns error if the listener cannot be bound.
    pub async fn start() -> std::io::Result<Self> {
        let state = Shared::default();
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let base = Url::parse(&format!("http://{addr}/api")).map_err(std::io::Error::other)?;
        let app = router(Arc::clone(&state));
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(Self { base, state, task })
    }

    /// Base URL of the API, including the `/api` prefix.
    #[must_use]
    pub fn api_base(&self) -> Url {
        self.base.clone()
    }

    /// Console configuration pointing at this backend, with the session
    /// file under `dir`.
    #[must_use]
    pub fn config(&self, dir: &FsPath) -> ConsoleConfig {
        ConsoleConfig::local(self.api_base(), dir)
    }

    /// Register an account directly.
    pub fn add_user(&self, id: &str, password: &str, name: &str) {
        let mut state = lock(&self.state);
        state.accounts.retain(|a| a.id != id);
        state.accounts.push(Account {
            id: id.to_owned(),
            password: password.to_owned(),
            name: name.to_owned(),
            ..Account::default()
        });
    }

    /// Record an analysis for `user_id` as if they had posted `message`.
    pub fn seed_analysis(&self, user_id: &str, message: &str) -> AnalysisResult {
        lock(&self.state).analyze(user_id, message, "text")
    }

    /// Make `endpoint` answer 500 from now on.
    pub fn fail(&self, endpoint: &str) {
        lock(&self.state).failing.insert(endpoint.to_owned());
    }

    /// Number of requests `endpoint` has received.
    #[must_use]
    pub fn hits(&self, endpoint: &str) -> usize {
        lock(&self.state).hits.get(endpoint).copied().unwrap_or(0)
    }

    /// Total requests across all endpoints.
    #[must_use]
    pub fn total_hits(&self) -> usize {
        lock(&self.state).hits.values().sum()
    }

    /// Hold the reply to the next `endpoint` request back by `delay`.
    /// Calls queue up, one delay per request.
    pub fn delay_next(&self, endpoint: &str, delay: Duration) {
        lock(&self.state)
            .delays
            .entry(endpoint.to_owned())
            .or_default()
            .push_back(delay);
    }

    /// Remove a notification without going through the API.
    pub fn drop_notification(&self, id: NotificationId) {
        lock(&self.state).notifications.retain(|n| n.id != id);
    }

    /// Read the state under the lock.
    pub fn inspect<R>(&self, f: impl FnOnce(&BackendState) -> R) -> R {
        f(&lock(&self.state))
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/login", post(login))
        .route("/api/register", post(register))
        .route("/api/patients", get(list_patients).post(create_patient))
        .route("/api/users", get(list_users))
        .route("/api/users/{user_id}", delete(delete_user))
        .route("/api/analyze", post(analyze))
        .route("/api/analyze-image", post(analyze_image))
        .route("/api/history/{user_id}", get(history))
        .route("/api/analytics", get(analytics))
        .route("/api/notifications", get(notifications))
        .route("/api/notifications/{id}/read", post(mark_read))
        .route("/api/export/red-cases", get(red_cases))
        .with_state(state)
}

#[derive(Deserialize)]
struct LoginBody {
    user_id: String,
    password: String,
}

#[derive(Deserialize)]
struct AccountBody {
    user_id: String,
    #[serde(default)]
    password: Option<String>,
    name: String,
    #[serde(default)]
    age: Option<u32>,
    #[serde(default)]
    gender: Option<String>,
    #[serde(default)]
    medical_history: Option<String>,
    #[serde(default)]
    social_media_handle: Option<String>,
}

impl From<AccountBody> for Account {
    fn from(body: AccountBody) -> Self {
        Self {
            id: body.user_id,
            password: body.password.unwrap_or_default(),
            name: body.name,
            age: body.age,
            gender: body.gender,
            medical_history: body.medical_history,
            social_media_handle: body.social_media_handle,
        }
    }
}

#[derive(Deserialize)]
struct AnalyzeBody {
    message: String,
    user_id: String,
}

async fn health(State(state): State<Shared>) -> Result<Json<BackendHealth>, Failure> {
    lock(&state).enter("health")?;
    Ok(Json(BackendHealth {
        status: "ok".to_owned(),
        ai_ready: true,
        db: Some("connected".to_owned()),
    }))
}

async fn login(
    State(state): State<Shared>,
    Json(body): Json<LoginBody>,
) -> Result<Json<Value>, Failure> {
    let mut state = lock(&state);
    state.enter("login")?;
    let account = state
        .account(&body.user_id)
        .filter(|a| a.password == body.password)
        .ok_or_else(|| Failure(StatusCode::UNAUTHORIZED, "Invalid credentials".to_owned()))?;
    Ok(Json(json!({
        "access_token": format!("token-{}", account.id),
        "user": {
            "id": account.id,
            "name": account.name,
            "age": account.age,
        },
    })))
}

async fn register(
    State(state): State<Shared>,
    Json(body): Json<AccountBody>,
) -> Result<(StatusCode, Json<Value>), Failure> {
    let mut state = lock(&state);
    state.enter("register")?;
    if body.password.as_deref().is_none_or(str::is_empty) {
        return Err(Failure(
            StatusCode::BAD_REQUEST,
            "Password is required".to_owned(),
        ));
    }
    state.insert_account(body.into())?;
    Ok((StatusCode::CREATED, Json(json!({ "message": "Registered" }))))
}

async fn list_patients(
    State(state): State<Shared>,
    headers: HeaderMap,
) -> Result<Json<Vec<PatientRecord>>, Failure> {
    let mut state = lock(&state);
    state.enter("patients")?;
    state.authorize(&headers)?;
    Ok(Json(
        state
            .accounts
            .iter()
            .filter(|a| resolve_role(&a.id) == Role::Patient)
            .map(|a| state.record(a))
            .collect(),
    ))
}

async fn create_patient(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<AccountBody>,
) -> Result<(StatusCode, Json<Value>), Failure> {
    stall(&state, "create-patient").await;
    let mut state = lock(&state);
    state.enter("create-patient")?;
    state.authorize(&headers)?;
    state.insert_account(body.into())?;
    Ok((StatusCode::CREATED, Json(json!({ "message": "Patient added" }))))
}

async fn list_users(
    State(state): State<Shared>,
    headers: HeaderMap,
) -> Result<Json<Vec<PatientRecord>>, Failure> {
    let mut state = lock(&state);
    state.enter("users")?;
    state.authorize(&headers)?;
    Ok(Json(state.accounts.iter().map(|a| state.record(a)).collect()))
}

async fn delete_user(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, Failure> {
    stall(&state, "delete-user").await;
    let mut state = lock(&state);
    state.enter("delete-user")?;
    state.authorize(&headers)?;
    if state.account(&user_id).is_none() {
        return Err(Failure(StatusCode::NOT_FOUND, "User not found".to_owned()));
    }
    state.accounts.retain(|a| a.id != user_id);
    state.history.remove(&user_id);
    Ok(Json(json!({ "message": "Deleted" })))
}

async fn analyze(
    State(state): State<Shared>,
    Json(body): Json<AnalyzeBody>,
) -> Result<Json<AnalysisResult>, Failure> {
    let mut state = lock(&state);
    state.enter("analyze")?;
    if body.message.trim().is_empty() {
        return Err(Failure(
            StatusCode::BAD_REQUEST,
            "Message is required".to_owned(),
        ));
    }
    Ok(Json(state.analyze(&body.user_id, &body.message, "text")))
}

async fn analyze_image(
    State(state): State<Shared>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisResult>, Failure> {
    let mut user_id = None;
    let mut message = String::new();
    let mut image = None;
    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("image") => {
                let name = field.file_name().unwrap_or("upload").to_owned();
                let bytes = field.bytes().await?;
                image = Some((name, bytes.len()));
            }
            Some("user_id") => user_id = Some(field.text().await?),
            Some("message") => message = field.text().await?,
            _ => {}
        }
    }

    let mut state = lock(&state);
    state.enter("analyze-image")?;
    let (Some(user_id), Some((name, size))) = (user_id, image) else {
        return Err(Failure(
            StatusCode::BAD_REQUEST,
            "image and user_id are required".to_owned(),
        ));
    };
    let mut result = state.analyze(&user_id, &message, "image");
    result.media_context = Some(format!("{name} ({size} bytes)"));
    result.image_url = Some(format!("/uploads/{name}"));
    Ok(Json(result))
}

async fn history(
    State(state): State<Shared>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<HistoryEntry>>, Failure> {
    // The reply carries the history as of arrival, even when held back
    let (entries, delay) = {
        let mut state = lock(&state);
        state.enter("history")?;
        let mut entries = state.history.get(&user_id).cloned().unwrap_or_default();
        entries.reverse();
        (entries, state.take_delay("history"))
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    Ok(Json(entries))
}

async fn analytics(
    State(state): State<Shared>,
    headers: HeaderMap,
) -> Result<Json<AnalyticsSnapshot>, Failure> {
    let mut state = lock(&state);
    state.enter("analytics")?;
    state.authorize(&headers)?;
    Ok(Json(state.analytics()))
}

async fn notifications(
    State(state): State<Shared>,
    headers: HeaderMap,
) -> Result<Json<Vec<Notification>>, Failure> {
    let mut state = lock(&state);
    state.enter("notifications")?;
    state.authorize(&headers)?;
    Ok(Json(
        state
            .notifications
            .iter()
            .filter(|n| !n.is_read)
            .cloned()
            .collect(),
    ))
}

async fn mark_read(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Value>, Failure> {
    stall(&state, "mark-read").await;
    let mut state = lock(&state);
    state.enter("mark-read")?;
    state.authorize(&headers)?;
    let notification = state
        .notifications
        .iter_mut()
        .find(|n| n.id == NotificationId::new(id))
        .ok_or_else(|| Failure(StatusCode::NOT_FOUND, "Notification not found".to_owned()))?;
    notification.is_read = true;
    Ok(Json(json!({ "message": "Marked as read" })))
}

async fn red_cases(
    State(state): State<Shared>,
    headers: HeaderMap,
) -> Result<Json<Vec<RedCase>>, Failure> {
    let mut state = lock(&state);
    state.enter("red-cases")?;
    state.authorize(&headers)?;
    Ok(Json(state.red_cases.clone()))
}
