//! Admin dashboard: system overview and user management.
//!
//! Syncs patients, analytics and users together at the patient cadence.

use std::sync::Arc;

use mindwatch_core::stats::{self, StatusBreakdown};
use mindwatch_core::{Admitted, AnalysisResult, AnalyticsSnapshot, Role, UserId, UserRecord};
use tracing::{info, instrument};

use super::{DashboardContext, LiveView, Resource, fetcher_for};
use crate::error::ConsoleError;
use crate::feed::SubmitError;
use crate::sync::{Schedule, SessionFetcher};

/// Figures shown at the top of the admin dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminSummary {
    pub total_users: usize,
    pub admins: usize,
    pub psychiatrists: usize,
    pub therapists: usize,
    pub patients: usize,
    /// Status tally over the monitored patient list.
    pub status: StatusBreakdown,
    pub analytics: Option<AnalyticsSnapshot>,
}

/// Admin dashboard view model.
#[derive(Debug)]
pub struct AdminDashboard {
    view: LiveView,
    fetcher: Arc<SessionFetcher>,
    page_size: usize,
}

impl AdminDashboard {
    /// Sync group of this dashboard.
    #[must_use]
    pub fn resources() -> Vec<Resource> {
        vec![Resource::Patients, Resource::Analytics, Resource::Users]
    }

    /// Open the dashboard and start polling at the patient cadence.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::AuthRequired`] if `admitted` is not an admin.
    pub fn open(admitted: Admitted, ctx: &DashboardContext) -> Result<Self, ConsoleError> {
        Self::open_with_schedule(admitted, ctx, ctx.intervals.patients.into())
    }

    /// Open the dashboard with an explicit schedule.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::AuthRequired`] if `admitted` is not an admin.
    pub fn open_with_schedule(
        admitted: Admitted,
        ctx: &DashboardContext,
        schedule: Schedule,
    ) -> Result<Self, ConsoleError> {
        let fetcher = fetcher_for(Role::Admin, admitted, &ctx.api)?;
        let view = LiveView::start(Arc::clone(&fetcher), Self::resources(), schedule);
        Ok(Self {
            view,
            fetcher,
            page_size: ctx.page_size,
        })
    }

    /// Underlying live view.
    #[must_use]
    pub const fn view(&self) -> &LiveView {
        &self.view
    }

    /// Current figures, computed from the cache.
    #[must_use]
    pub fn summary(&self) -> AdminSummary {
        self.view.with(|cache| {
            let users = cache.users();
            AdminSummary {
                total_users: users.len(),
                admins: stats::count_by_role(users, Role::Admin),
                psychiatrists: stats::count_by_role(users, Role::Psychiatrist),
                therapists: stats::count_by_role(users, Role::Therapist),
                patients: stats::count_by_role(users, Role::Patient),
                status: StatusBreakdown::of(cache.patients()),
                analytics: cache.analytics.clone(),
            }
        })
    }

    /// Users matching `term` on name or ID, limited to one page.
    #[must_use]
    pub fn search(&self, term: &str) -> Vec<UserRecord> {
        self.view.with(|cache| {
            let matches = stats::filter_search(cache.users(), term);
            stats::window(&matches, self.page_size)
                .iter()
                .map(|u| (*u).clone())
                .collect()
        })
    }

    /// Number of users matching `term`, before paging.
    #[must_use]
    pub fn match_count(&self, term: &str) -> usize {
        self.view
            .with(|cache| stats::filter_search(cache.users(), term).len())
    }

    /// Delete a user. The row is removed locally once the backend confirms,
    /// unless the dashboard was closed in the meantime.
    ///
    /// # Errors
    ///
    /// Returns error if the backend refuses; the cache is left untouched.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn delete_user(&self, user_id: &UserId) -> Result<(), ConsoleError> {
        self.fetcher
            .api()
            .delete_user(self.fetcher.session(), user_id)
            .await?;
        self.view.modify(|cache| {
            if let Some(users) = cache.users.as_mut() {
                users.retain(|u| &u.id != user_id);
            }
            if let Some(patients) = cache.patients.as_mut() {
                patients.retain(|p| &p.id != user_id);
            }
        });
        info!("User deleted");
        Ok(())
    }

    /// Analyse a message from the overview, then refresh the group.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Empty`] for a blank message, or the API error.
    #[instrument(skip(self, message))]
    pub async fn analyze(&self, message: &str) -> Result<AnalysisResult, ConsoleError> {
        if message.trim().is_empty() {
            return Err(SubmitError::Empty.into());
        }
        let session = self.fetcher.session();
        let result = self
            .fetcher
            .api()
            .analyze(message, session.id(), Some(session))
            .await?;
        self.view.refresh().await;
        Ok(result)
    }

    /// Stop syncing.
    pub fn close(&self) {
        self.view.cancel();
    }
}
