//! Live data synchronizer.
//!
//! A sync group is a set of [`Resource`]s that one dashboard fetches
//! together. [`start_sync`] runs the group on a [`Schedule`] and hands
//! every successful fetch to an `on_update` callback:
//!
//! - all resources of a round are fetched concurrently, and a failed
//!   resource is logged without holding back the others;
//! - each fetch is tagged with a per-resource sequence number and a
//!   completion older than the last applied one is dropped;
//! - updates are applied one at a time under the group's apply lock;
//! - once [`SyncHandle::cancel`] returns, no further update is applied.
//!
//! [`SyncHandle::refresh_now`] runs exactly the same round as a timer tick.
//! Writes made outside a round go through [`SyncHandle::apply`] (a fetch
//! tagged with [`SyncHandle::issue`]) or [`SyncHandle::apply_local`], which
//! take the same apply lock and honour the same cancel.

mod fetcher;
mod sequence;

pub use fetcher::{ResourceFetcher, SessionFetcher};
pub use sequence::SequenceTracker;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, join_all};
use mindwatch_core::{
    AnalyticsSnapshot, HistoryEntry, Notification, PatientRecord, RedCase, UserId, UserRecord,
};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ConsoleError;

/// Default patient list / admin overview cadence.
pub const DEFAULT_PATIENT_INTERVAL: Duration = Duration::from_millis(5000);

/// Default psychiatrist case, notification and analytics cadence.
pub const DEFAULT_CASE_INTERVAL: Duration = Duration::from_millis(30000);

/// Poll cadences for the dashboards' sync groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncIntervals {
    pub patients: Duration,
    pub cases: Duration,
}

impl Default for SyncIntervals {
    fn default() -> Self {
        Self {
            patients: DEFAULT_PATIENT_INTERVAL,
            cases: DEFAULT_CASE_INTERVAL,
        }
    }
}

/// A server resource a dashboard can keep in sync.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resource {
    Patients,
    Users,
    Analytics,
    Notifications,
    RedCases,
    History(UserId),
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Patients => f.write_str("patients"),
            Self::Users => f.write_str("users"),
            Self::Analytics => f.write_str("analytics"),
            Self::Notifications => f.write_str("notifications"),
            Self::RedCases => f.write_str("red-cases"),
            Self::History(user_id) => write!(f, "history:{user_id}"),
        }
    }
}

/// Fetched value of a [`Resource`].
#[derive(Debug, Clone, PartialEq)]
pub enum ResourcePayload {
    Patients(Vec<PatientRecord>),
    Users(Vec<UserRecord>),
    Analytics(AnalyticsSnapshot),
    Notifications(Vec<Notification>),
    RedCases(Vec<RedCase>),
    History(UserId, Vec<HistoryEntry>),
}

/// One applied fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub resource: Resource,
    pub seq: u64,
    pub payload: ResourcePayload,
}

/// When a sync group fetches on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Fetch immediately, then every interval.
    Every(Duration),
    /// Fetch once immediately, then only on [`SyncHandle::refresh_now`].
    OnEntry,
    /// Only fetch on [`SyncHandle::refresh_now`].
    Manual,
}

impl From<Duration> for Schedule {
    fn from(interval: Duration) -> Self {
        Self::Every(interval)
    }
}

/// Outcome of one round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundReport {
    /// Payloads handed to `on_update`.
    pub applied: usize,
    /// Completions dropped because a newer fetch already applied.
    pub stale: usize,
    /// Fetches that failed.
    pub failed: usize,
    /// Fetches dropped because the group was cancelled.
    pub cancelled: usize,
}

impl RoundReport {
    /// Some resources failed while others applied.
    #[must_use]
    pub const fn is_partial_failure(&self) -> bool {
        self.failed > 0 && self.applied > 0
    }

    /// Total fetches the round issued.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.applied + self.stale + self.failed + self.cancelled
    }

    /// The round as an error when some of its resources failed.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::PartialFailure`] if any fetch failed.
    pub fn check(&self) -> Result<(), ConsoleError> {
        if self.failed == 0 {
            return Ok(());
        }
        Err(ConsoleError::PartialFailure {
            failed: self.failed,
            total: self.total(),
        })
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Applied => self.applied += 1,
            Outcome::Stale => self.stale += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Cancelled => self.cancelled += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Applied,
    Stale,
    Failed,
    Cancelled,
}

// =============================================================================
// Group
// =============================================================================

/// Type-erased sync group, so [`SyncHandle`] does not carry the fetcher
/// and callback types.
trait Driver: Send + Sync {
    fn round(self: Arc<Self>) -> BoxFuture<'static, RoundReport>;
    fn issue(&self, resource: &Resource) -> u64;
    fn apply_tagged(&self, resource: Resource, seq: u64, payload: ResourcePayload) -> bool;
    fn apply_local(&self, f: &mut dyn FnMut()) -> bool;
    fn cancel(&self);
    fn is_cancelled(&self) -> bool;
}

struct Group<F, U> {
    fetcher: Arc<F>,
    resources: Vec<Resource>,
    on_update: U,
    /// Apply lock. Also guards sequence issuing.
    sequences: Mutex<SequenceTracker>,
    token: CancellationToken,
}

impl<F, U> Group<F, U>
where
    F: ResourceFetcher,
    U: Fn(Update) + Send + Sync + 'static,
{
    async fn fetch_one(self: Arc<Self>, resource: Resource, seq: u64) -> Outcome {
        let result = tokio::select! {
            biased;
            () = self.token.cancelled() => return Outcome::Cancelled,
            result = self.fetcher.fetch(&resource) => result,
        };

        match result {
            Ok(payload) => self.apply(resource, seq, payload),
            Err(e) => {
                warn!(%resource, seq, error = %e, "Sync fetch failed");
                Outcome::Failed
            }
        }
    }

    fn apply(&self, resource: Resource, seq: u64, payload: ResourcePayload) -> Outcome {
        let mut sequences = self.sequences.lock().unwrap_or_else(PoisonError::into_inner);
        if self.token.is_cancelled() {
            debug!(%resource, seq, "Dropping completion after cancel");
            return Outcome::Cancelled;
        }
        if !sequences.accept(&resource, seq) {
            debug!(%resource, seq, "Dropping stale completion");
            return Outcome::Stale;
        }
        (self.on_update)(Update {
            resource,
            seq,
            payload,
        });
        Outcome::Applied
    }
}

impl<F, U> Driver for Group<F, U>
where
    F: ResourceFetcher,
    U: Fn(Update) + Send + Sync + 'static,
{
    fn round(self: Arc<Self>) -> BoxFuture<'static, RoundReport> {
        // Tags are issued now, not when the future is first polled, so
        // rounds started earlier always carry smaller numbers.
        let tagged: Vec<(Resource, u64)> = {
            let mut sequences = self.sequences.lock().unwrap_or_else(PoisonError::into_inner);
            self.resources
                .iter()
                .map(|r| (r.clone(), sequences.issue(r)))
                .collect()
        };

        Box::pin(async move {
            let outcomes = join_all(
                tagged
                    .into_iter()
                    .map(|(resource, seq)| Arc::clone(&self).fetch_one(resource, seq)),
            )
            .await;

            let report = outcomes
                .into_iter()
                .fold(RoundReport::default(), |mut report, outcome| {
                    report.record(outcome);
                    report
                });
            if report.is_partial_failure() {
                warn!(
                    failed = report.failed,
                    applied = report.applied,
                    "Sync round partially failed"
                );
            }
            report
        })
    }

    fn issue(&self, resource: &Resource) -> u64 {
        self.sequences
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .issue(resource)
    }

    fn apply_tagged(&self, resource: Resource, seq: u64, payload: ResourcePayload) -> bool {
        self.apply(resource, seq, payload) == Outcome::Applied
    }

    fn apply_local(&self, f: &mut dyn FnMut()) -> bool {
        let _sequences = self.sequences.lock().unwrap_or_else(PoisonError::into_inner);
        if self.token.is_cancelled() {
            debug!("Dropping local change after cancel");
            return false;
        }
        f();
        true
    }

    fn cancel(&self) {
        let _sequences = self.sequences.lock().unwrap_or_else(PoisonError::into_inner);
        self.token.cancel();
    }

    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Handle to a running sync group. Dropping it cancels the group.
pub struct SyncHandle {
    driver: Arc<dyn Driver>,
}

impl SyncHandle {
    /// Fetch every resource now through the same path as a timer tick.
    ///
    /// The returned future does not borrow the handle and can be spawned.
    pub fn refresh_now(&self) -> BoxFuture<'static, RoundReport> {
        Arc::clone(&self.driver).round()
    }

    /// Tag a fetch of `resource` made outside the group's rounds.
    ///
    /// Call this before the request is sent, so a later request always
    /// carries a larger tag.
    #[must_use]
    pub fn issue(&self, resource: &Resource) -> u64 {
        self.driver.issue(resource)
    }

    /// Hand a completion tagged by [`issue`](Self::issue) to `on_update`.
    ///
    /// It is dropped, exactly like a round's completion, when the group is
    /// cancelled or a newer tag for the resource was already applied.
    /// Returns whether it was applied.
    pub fn apply(&self, resource: Resource, seq: u64, payload: ResourcePayload) -> bool {
        self.driver.apply_tagged(resource, seq, payload)
    }

    /// Run `f` under the apply lock unless the group is cancelled.
    /// Returns whether `f` ran.
    pub fn apply_local(&self, f: &mut dyn FnMut()) -> bool {
        self.driver.apply_local(f)
    }

    /// Stop the group. After this returns no update is applied, even for
    /// fetches still in flight.
    pub fn cancel(&self) {
        if !self.driver.is_cancelled() {
            self.driver.cancel();
            debug!("Sync group cancelled");
        }
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.driver.is_cancelled()
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for SyncHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncHandle")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Start keeping `resources` in sync.
///
/// Must be called within a tokio runtime.
pub fn start_sync<F, U>(
    fetcher: Arc<F>,
    resources: Vec<Resource>,
    schedule: impl Into<Schedule>,
    on_update: U,
) -> SyncHandle
where
    F: ResourceFetcher,
    U: Fn(Update) + Send + Sync + 'static,
{
    let schedule = schedule.into();
    let token = CancellationToken::new();
    let group = Arc::new(Group {
        fetcher,
        resources,
        on_update,
        sequences: Mutex::new(SequenceTracker::new()),
        token: token.clone(),
    });
    info!(
        resources = ?group.resources.iter().map(ToString::to_string).collect::<Vec<_>>(),
        ?schedule,
        "Sync started"
    );

    let driver: Arc<dyn Driver> = group;
    match schedule {
        Schedule::Every(period) => {
            tokio::spawn(run_ticker(Arc::clone(&driver), period, token));
        }
        Schedule::OnEntry => {
            tokio::spawn(Arc::clone(&driver).round());
        }
        Schedule::Manual => {}
    }

    SyncHandle { driver }
}

/// Start a round on every tick until cancelled. The first tick is immediate.
async fn run_ticker(driver: Arc<dyn Driver>, period: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = ticker.tick() => {
                // Rounds run detached so a slow fetch never delays the next tick.
                tokio::spawn(Arc::clone(&driver).round());
            }
        }
    }
    debug!("Sync ticker stopped");
}
