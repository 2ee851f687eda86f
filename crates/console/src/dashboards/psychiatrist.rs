//! Psychiatrist dashboard: red cases, notifications and analytics.
//!
//! Marking a notification read removes it from the list straight away. If
//! the backend then refuses, the notification is put back where it was.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mindwatch_core::stats;
use mindwatch_core::{
    Admitted, AnalyticsSnapshot, HistoryEntry, NotificationId, RedCase, Role, UserId,
};
use tracing::{instrument, warn};

use super::{DashboardContext, LiveView, Resource, fetcher_for, load_history};
use crate::error::ConsoleError;
use crate::sync::{Schedule, SessionFetcher};

/// Figures shown at the top of the psychiatrist dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct PsychiatristSummary {
    pub red_cases: usize,
    /// Mean red-case score, one decimal; 0 with no cases.
    pub average_score: f64,
    /// Red cases scoring 8 or more.
    pub critical: usize,
    pub unread_notifications: usize,
    pub analytics: Option<AnalyticsSnapshot>,
}

/// Point-in-time red-case export.
#[derive(Debug, Clone, PartialEq)]
pub struct RedCaseReport {
    pub generated_at: DateTime<Utc>,
    pub cases: Vec<RedCase>,
    pub average_score: f64,
    pub critical: usize,
}

impl RedCaseReport {
    /// Summarise `cases` as of `generated_at`.
    #[must_use]
    pub fn new(cases: Vec<RedCase>, generated_at: DateTime<Utc>) -> Self {
        let scores: Vec<f64> = cases.iter().map(|c| c.score).collect();
        Self {
            generated_at,
            average_score: stats::average(&scores),
            critical: stats::critical_count(&cases),
            cases,
        }
    }
}

/// Psychiatrist dashboard view model.
#[derive(Debug)]
pub struct PsychiatristDashboard {
    view: LiveView,
    fetcher: Arc<SessionFetcher>,
}

impl PsychiatristDashboard {
    /// Sync group of this dashboard.
    #[must_use]
    pub fn resources() -> Vec<Resource> {
        vec![Resource::RedCases, Resource::Notifications, Resource::Analytics]
    }

    /// Open the dashboard and start polling at the case cadence.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::AuthRequired`] if `admitted` is not a psychiatrist.
    pub fn open(admitted: Admitted, ctx: &DashboardContext) -> Result<Self, ConsoleError> {
        Self::open_with_schedule(admitted, ctx, ctx.intervals.cases.into())
    }

    /// Open the dashboard with an explicit schedule.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::AuthRequired`] if `admitted` is not a psychiatrist.
    pub fn open_with_schedule(
        admitted: Admitted,
        ctx: &DashboardContext,
        schedule: Schedule,
    ) -> Result<Self, ConsoleError> {
        let fetcher = fetcher_for(Role::Psychiatrist, admitted, &ctx.api)?;
        let view = LiveView::start(Arc::clone(&fetcher), Self::resources(), schedule);
        Ok(Self { view, fetcher })
    }

    #[must_use]
    pub const fn view(&self) -> &LiveView {
        &self.view
    }

    #[must_use]
    pub fn summary(&self) -> PsychiatristSummary {
        self.view.with(|cache| {
            let cases = cache.red_cases();
            let scores: Vec<f64> = cases.iter().map(|c| c.score).collect();
            PsychiatristSummary {
                red_cases: cases.len(),
                average_score: stats::average(&scores),
                critical: stats::critical_count(cases),
                unread_notifications: cache.notifications().len(),
                analytics: cache.analytics.clone(),
            }
        })
    }

    /// Mark a notification read.
    ///
    /// The notification leaves the list immediately. If the backend call
    /// fails it is restored at its original position, unless a sync in the
    /// meantime already brought it back. Once the dashboard is closed the
    /// list is no longer touched, so a late failure is not rolled back.
    ///
    /// # Errors
    ///
    /// Returns the API error after rolling back.
    #[instrument(skip(self), fields(notification_id = %id))]
    pub async fn mark_read(&self, id: NotificationId) -> Result<(), ConsoleError> {
        let mut removed = None;
        self.view.modify(|cache| {
            if let Some(list) = cache.notifications.as_mut()
                && let Some(index) = list.iter().position(|n| n.id == id)
            {
                removed = Some((index, list.remove(index)));
            }
        });

        let result = self
            .fetcher
            .api()
            .mark_notification_read(self.fetcher.session(), id)
            .await;

        if let Err(e) = result {
            warn!(error = %e, "Mark-read failed; restoring notification");
            if let Some((index, notification)) = removed {
                self.view.modify(|cache| {
                    let list = cache.notifications.get_or_insert_with(Vec::new);
                    if list.iter().all(|n| n.id != id) {
                        list.insert(index.min(list.len()), notification);
                    }
                });
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Fetch the latest red cases and summarise them.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    pub async fn export_red_cases(&self) -> Result<RedCaseReport, ConsoleError> {
        let cases = self
            .fetcher
            .api()
            .red_cases(self.fetcher.session())
            .await?;
        Ok(RedCaseReport::new(cases, Utc::now()))
    }

    /// Analysis history for one patient.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    pub async fn history(&self, user_id: &UserId) -> Result<Vec<HistoryEntry>, ConsoleError> {
        load_history(&self.view, &self.fetcher, user_id).await
    }

    /// Stop syncing.
    pub fn close(&self) {
        self.view.cancel();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn case(score: f64) -> RedCase {
        RedCase {
            user_id: UserId::new("P-1"),
            name: None,
            score,
            reason: String::new(),
            timestamp: None,
        }
    }

    #[test]
    fn test_report_of_no_cases() {
        let report = RedCaseReport::new(vec![], Utc::now());
        assert!(report.average_score.abs() < f64::EPSILON);
        assert_eq!(report.critical, 0);
    }

    #[test]
    fn test_report_figures() {
        let report = RedCaseReport::new(vec![case(8.0), case(10.0), case(6.5)], Utc::now());
        assert!((report.average_score - 8.2).abs() < f64::EPSILON);
        assert_eq!(report.critical, 2);
        assert_eq!(report.cases.len(), 3);
    }
}
