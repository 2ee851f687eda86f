//! Per-role dashboard view models.
//!
//! Each dashboard owns a [`LiveView`]: a sync group plus the cache it
//! feeds. The cache sits in a `tokio::sync::watch` channel so a front end
//! can re-render on every change, and derived statistics are computed from
//! it on demand.
//!
//! Every dashboard constructor takes an [`Admitted`] session for its own
//! role and rejects any other, so no dashboard state exists for a session
//! that failed the gate.

mod admin;
mod patient;
mod psychiatrist;
mod therapist;

pub use admin::{AdminDashboard, AdminSummary};
pub use patient::PatientDashboard;
pub use psychiatrist::{PsychiatristDashboard, PsychiatristSummary, RedCaseReport};
pub use therapist::{TherapistDashboard, TherapistSummary};

use std::collections::HashMap;
use std::sync::Arc;

use mindwatch_core::{
    Admitted, AnalyticsSnapshot, HistoryEntry, Notification, PatientRecord, RedCase, Role, UserId,
    UserRecord,
};
use tokio::sync::watch;
use tracing::{debug, instrument};

use crate::api::{ApiClient, ApiError};
use crate::config::ConsoleConfig;
use crate::error::ConsoleError;
use crate::sync::{
    ResourceFetcher, ResourcePayload, RoundReport, Schedule, SessionFetcher, SyncHandle,
    SyncIntervals, start_sync,
};

pub use crate::sync::Resource;

/// Local copy of the server resources a dashboard shows.
///
/// `None` means the resource has not been fetched yet. Every fetched
/// payload replaces its slot wholesale, so applying the same payload twice
/// leaves the cache unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardCache {
    pub patients: Option<Vec<PatientRecord>>,
    pub users: Option<Vec<UserRecord>>,
    pub analytics: Option<AnalyticsSnapshot>,
    pub notifications: Option<Vec<Notification>>,
    pub red_cases: Option<Vec<RedCase>>,
    pub history: HashMap<UserId, Vec<HistoryEntry>>,
}

impl DashboardCache {
    /// Replace the slot `payload` belongs to.
    pub fn apply(&mut self, payload: ResourcePayload) {
        match payload {
            ResourcePayload::Patients(v) => self.patients = Some(v),
            ResourcePayload::Users(v) => self.users = Some(v),
            ResourcePayload::Analytics(v) => self.analytics = Some(v),
            ResourcePayload::Notifications(v) => self.notifications = Some(v),
            ResourcePayload::RedCases(v) => self.red_cases = Some(v),
            ResourcePayload::History(user_id, v) => {
                self.history.insert(user_id, v);
            }
        }
    }

    /// Whether `resource` has been fetched at least once.
    #[must_use]
    pub fn is_loaded(&self, resource: &Resource) -> bool {
        match resource {
            Resource::Patients => self.patients.is_some(),
            Resource::Users => self.users.is_some(),
            Resource::Analytics => self.analytics.is_some(),
            Resource::Notifications => self.notifications.is_some(),
            Resource::RedCases => self.red_cases.is_some(),
            Resource::History(user_id) => self.history.contains_key(user_id),
        }
    }

    #[must_use]
    pub fn patients(&self) -> &[PatientRecord] {
        self.patients.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn users(&self) -> &[UserRecord] {
        self.users.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn notifications(&self) -> &[Notification] {
        self.notifications.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn red_cases(&self) -> &[RedCase] {
        self.red_cases.as_deref().unwrap_or_default()
    }
}

/// Settings shared by every dashboard.
#[derive(Debug, Clone)]
pub struct DashboardContext {
    pub api: ApiClient,
    pub intervals: SyncIntervals,
    pub page_size: usize,
}

impl DashboardContext {
    /// Build from console configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn from_config(config: &ConsoleConfig) -> Result<Self, ConsoleError> {
        Ok(Self {
            api: ApiClient::from_config(config)?,
            intervals: config.intervals,
            page_size: config.page_size,
        })
    }
}

/// A running sync group and the cache it keeps fresh.
pub struct LiveView {
    cache: Arc<watch::Sender<DashboardCache>>,
    sync: SyncHandle,
}

impl LiveView {
    /// Start syncing `resources` into a fresh cache.
    pub fn start<F: ResourceFetcher>(
        fetcher: Arc<F>,
        resources: Vec<Resource>,
        schedule: impl Into<Schedule>,
    ) -> Self {
        let (tx, _rx) = watch::channel(DashboardCache::default());
        let cache = Arc::new(tx);
        let sink = Arc::clone(&cache);
        let sync = start_sync(fetcher, resources, schedule, move |update| {
            sink.send_modify(|cache| cache.apply(update.payload));
        });
        Self { cache, sync }
    }

    /// Copy of the current cache.
    #[must_use]
    pub fn snapshot(&self) -> DashboardCache {
        self.cache.borrow().clone()
    }

    /// Run `f` against the current cache without copying it.
    pub fn with<R>(&self, f: impl FnOnce(&DashboardCache) -> R) -> R {
        f(&self.cache.borrow())
    }

    /// Receiver that observes every cache change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DashboardCache> {
        self.cache.subscribe()
    }

    /// Mutate the cache locally (optimistic updates).
    ///
    /// Runs under the group's apply lock. Once the view is cancelled `f` is
    /// not run and `false` is returned.
    pub fn modify(&self, f: impl FnOnce(&mut DashboardCache)) -> bool {
        let mut f = Some(f);
        self.sync.apply_local(&mut || {
            if let Some(f) = f.take() {
                self.cache.send_modify(f);
            }
        })
    }

    /// Fetch one resource outside the group's rounds.
    ///
    /// The fetch is tagged when it starts and its completion is applied
    /// like a round's: dropped after cancel, or when a fetch started later
    /// for the same resource already applied. The payload is returned
    /// either way.
    pub async fn fetch<F: ResourceFetcher>(
        &self,
        fetcher: &F,
        resource: Resource,
    ) -> Result<ResourcePayload, ApiError> {
        let seq = self.sync.issue(&resource);
        let payload = fetcher.fetch(&resource).await?;
        if !self.sync.apply(resource.clone(), seq, payload.clone()) {
            debug!(%resource, seq, "Fetched payload not applied");
        }
        Ok(payload)
    }

    /// Fetch every resource of the group now.
    pub async fn refresh(&self) -> RoundReport {
        self.sync.refresh_now().await
    }

    /// Stop syncing. The cache keeps its last state.
    pub fn cancel(&self) {
        self.sync.cancel();
    }

    /// Whether syncing was stopped.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.sync.is_cancelled()
    }
}

impl std::fmt::Debug for LiveView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveView")
            .field("sync", &self.sync)
            .finish_non_exhaustive()
    }
}

/// Confirm `admitted` is for `role` and build a fetcher for it.
fn fetcher_for(
    role: Role,
    admitted: Admitted,
    api: &ApiClient,
) -> Result<Arc<SessionFetcher>, ConsoleError> {
    if admitted.role() != role {
        return Err(ConsoleError::AuthRequired);
    }
    Ok(Arc::new(SessionFetcher::new(
        api.clone(),
        admitted.into_session(),
    )))
}

/// Load one patient's history into the cache.
#[instrument(skip_all, fields(user_id = %user_id))]
async fn load_history(
    view: &LiveView,
    fetcher: &SessionFetcher,
    user_id: &UserId,
) -> Result<Vec<HistoryEntry>, ConsoleError> {
    match view
        .fetch(fetcher, Resource::History(user_id.clone()))
        .await?
    {
        ResourcePayload::History(_, entries) => Ok(entries),
        _ => Err(ApiError::Decode("history fetch returned another resource".to_string()).into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use mindwatch_core::{RiskLevel, RiskStatus, Session, SessionUser, admit};
    use secrecy::SecretString;
    use tokio::sync::oneshot;
    use url::Url;

    use super::*;
    use crate::error::ErrorKind;

    /// Backend that always returns the same data.
    struct FixedBackend;

    impl ResourceFetcher for FixedBackend {
        async fn fetch(&self, resource: &Resource) -> Result<ResourcePayload, ApiError> {
            Ok(match resource {
                Resource::Analytics => ResourcePayload::Analytics(AnalyticsSnapshot::default()),
                _ => ResourcePayload::Patients(vec![
                    patient("P-1", RiskStatus::Level(RiskLevel::Red)),
                    patient("P-2", RiskStatus::Unknown),
                ]),
            })
        }
    }

    /// Answers each history fetch with the next scripted reply.
    #[derive(Default)]
    struct ScriptedHistory {
        replies: std::sync::Mutex<VecDeque<oneshot::Receiver<Vec<HistoryEntry>>>>,
    }

    impl ScriptedHistory {
        fn reply(&self) -> oneshot::Sender<Vec<HistoryEntry>> {
            let (tx, rx) = oneshot::channel();
            self.replies.lock().unwrap().push_back(rx);
            tx
        }
    }

    impl ResourceFetcher for ScriptedHistory {
        async fn fetch(&self, resource: &Resource) -> Result<ResourcePayload, ApiError> {
            let Resource::History(user_id) = resource else {
                return Ok(ResourcePayload::Patients(vec![]));
            };
            let rx = self.replies.lock().unwrap().pop_front().unwrap();
            let entries = rx.await.map_err(|e| ApiError::Decode(e.to_string()))?;
            Ok(ResourcePayload::History(user_id.clone(), entries))
        }
    }

    fn entry(content: &str) -> HistoryEntry {
        serde_json::from_value(serde_json::json!({
            "timestamp": "2025-01-31T10:20:30",
            "content": content,
            "result_level": "GREEN",
            "score": 1.0,
        }))
        .unwrap()
    }

    fn context() -> DashboardContext {
        DashboardContext {
            api: ApiClient::new(
                Url::parse("http://127.0.0.1:9/api").unwrap(),
                Duration::from_secs(1),
            )
            .unwrap(),
            intervals: SyncIntervals::default(),
            page_size: 10,
        }
    }

    fn admitted(id: &str) -> Admitted {
        let session = Session::new(SessionUser::new(id, "x"), SecretString::from("t"));
        admit(session.role(), Some(session)).unwrap()
    }

    fn patient(id: &str, status: RiskStatus) -> PatientRecord {
        PatientRecord {
            id: UserId::new(id),
            name: id.to_string(),
            age: None,
            gender: None,
            medical_history: None,
            social_media_handle: None,
            status,
            last_update: None,
        }
    }

    #[test]
    fn test_apply_replaces_slot() {
        let mut cache = DashboardCache::default();
        assert!(!cache.is_loaded(&Resource::Patients));

        let first = vec![patient("P-1", RiskStatus::Unknown)];
        cache.apply(ResourcePayload::Patients(first));
        let second = vec![patient("P-2", RiskStatus::Level(RiskLevel::Red))];
        cache.apply(ResourcePayload::Patients(second.clone()));

        assert_eq!(cache.patients(), second.as_slice());
        assert!(cache.is_loaded(&Resource::Patients));
        assert!(!cache.is_loaded(&Resource::Users));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let payload = ResourcePayload::Patients(vec![patient("P-1", RiskStatus::Unknown)]);
        let mut once = DashboardCache::default();
        once.apply(payload.clone());
        let mut twice = once.clone();
        twice.apply(payload);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_history_slot_per_user() {
        let mut cache = DashboardCache::default();
        cache.apply(ResourcePayload::History(UserId::new("P-1"), vec![]));
        assert!(cache.is_loaded(&Resource::History(UserId::new("P-1"))));
        assert!(!cache.is_loaded(&Resource::History(UserId::new("P-2"))));
    }

    #[tokio::test]
    async fn test_refresh_twice_is_idempotent() {
        let view = LiveView::start(
            Arc::new(FixedBackend),
            vec![Resource::Patients, Resource::Analytics],
            Schedule::Manual,
        );
        view.refresh().await;
        let first = view.snapshot();
        view.refresh().await;
        assert_eq!(view.snapshot(), first);
        assert_eq!(first.patients().len(), 2);
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let view = LiveView::start(Arc::new(FixedBackend), vec![Resource::Patients], Schedule::Manual);
        let mut rx = view.subscribe();
        view.refresh().await;
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_loaded(&Resource::Patients));
    }

    #[tokio::test]
    async fn test_cancelled_view_keeps_last_state() {
        let view = LiveView::start(Arc::new(FixedBackend), vec![Resource::Patients], Schedule::Manual);
        view.refresh().await;
        view.cancel();
        let report = view.refresh().await;
        assert_eq!(report.cancelled, 1);
        assert_eq!(view.snapshot().patients().len(), 2);
    }

    #[tokio::test]
    async fn test_modify_after_cancel_is_ignored() {
        let view = LiveView::start(Arc::new(FixedBackend), vec![Resource::Patients], Schedule::Manual);
        view.refresh().await;
        assert!(view.modify(|cache| cache.patients = Some(vec![])));
        view.cancel();

        let applied = view.modify(|cache| cache.patients = None);
        assert!(!applied);
        assert!(view.snapshot().is_loaded(&Resource::Patients));
    }

    #[tokio::test]
    async fn test_fetch_completing_after_cancel_is_not_cached() {
        let fetcher = Arc::new(ScriptedHistory::default());
        let tx = fetcher.reply();
        let view = LiveView::start(Arc::clone(&fetcher), vec![], Schedule::Manual);
        let resource = Resource::History(UserId::new("P-1"));

        let (fetched, ()) = tokio::join!(view.fetch(fetcher.as_ref(), resource.clone()), async {
            view.cancel();
            tx.send(vec![entry("late")]).unwrap();
        });

        assert!(fetched.is_ok());
        assert!(!view.snapshot().is_loaded(&resource));
    }

    #[tokio::test]
    async fn test_older_fetch_does_not_overwrite_newer() {
        let fetcher = Arc::new(ScriptedHistory::default());
        let old_tx = fetcher.reply();
        let new_tx = fetcher.reply();
        let view = LiveView::start(Arc::clone(&fetcher), vec![], Schedule::Manual);
        let user_id = UserId::new("P-1");
        let resource = Resource::History(user_id.clone());

        new_tx.send(vec![entry("new")]).unwrap();
        let (older, newer) = tokio::join!(view.fetch(fetcher.as_ref(), resource.clone()), async {
            let newer = view.fetch(fetcher.as_ref(), resource.clone()).await;
            old_tx.send(vec![entry("old")]).unwrap();
            newer
        });

        assert_eq!(
            older.unwrap(),
            ResourcePayload::History(user_id.clone(), vec![entry("old")])
        );
        assert!(newer.is_ok());
        let cached = view.snapshot().history.get(&user_id).cloned().unwrap();
        assert_eq!(cached, vec![entry("new")]);
    }

    #[test]
    fn test_dashboard_rejects_other_roles() {
        let ctx = context();
        let err = AdminDashboard::open(admitted("T-01"), &ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthRequired);
        assert!(PsychiatristDashboard::open(admitted("ADMIN"), &ctx).is_err());
        assert!(TherapistDashboard::open(admitted("P-001"), &ctx).is_err());
        assert!(PatientDashboard::open(admitted("DR-1"), &ctx).is_err());
    }

    #[test]
    fn test_unloaded_slots_read_as_empty() {
        let cache = DashboardCache::default();
        assert!(cache.patients().is_empty());
        assert!(cache.red_cases().is_empty());
    }
}
