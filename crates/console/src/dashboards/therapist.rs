//! Therapist dashboard: patient roster, intake and history.

use std::sync::Arc;

use mindwatch_core::stats::{self, StatusBreakdown};
use mindwatch_core::{Admitted, HistoryEntry, PatientRecord, RiskLevel, Role, UserId};
use tracing::{info, instrument};

use super::{DashboardContext, LiveView, Resource, fetcher_for, load_history};
use crate::api::NewPatient;
use crate::error::ConsoleError;
use crate::sync::{Schedule, SessionFetcher};

/// Figures shown at the top of the therapist dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TherapistSummary {
    pub total: usize,
    /// Patients currently RED.
    pub critical: usize,
    pub status: StatusBreakdown,
}

/// Therapist dashboard view model.
///
/// The roster is fetched on entry and on [`refresh`](Self::refresh).
#[derive(Debug)]
pub struct TherapistDashboard {
    view: LiveView,
    fetcher: Arc<SessionFetcher>,
    page_size: usize,
}

impl TherapistDashboard {
    /// Open the dashboard and fetch the roster once.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::AuthRequired`] if `admitted` is not a therapist.
    pub fn open(admitted: Admitted, ctx: &DashboardContext) -> Result<Self, ConsoleError> {
        Self::open_with_schedule(admitted, ctx, Schedule::OnEntry)
    }

    /// Open the dashboard with an explicit schedule.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::AuthRequired`] if `admitted` is not a therapist.
    pub fn open_with_schedule(
        admitted: Admitted,
        ctx: &DashboardContext,
        schedule: Schedule,
    ) -> Result<Self, ConsoleError> {
        let fetcher = fetcher_for(Role::Therapist, admitted, &ctx.api)?;
        let view = LiveView::start(Arc::clone(&fetcher), vec![Resource::Patients], schedule);
        Ok(Self {
            view,
            fetcher,
            page_size: ctx.page_size,
        })
    }

    #[must_use]
    pub const fn view(&self) -> &LiveView {
        &self.view
    }

    #[must_use]
    pub fn summary(&self) -> TherapistSummary {
        self.view.with(|cache| {
            let patients = cache.patients();
            TherapistSummary {
                total: patients.len(),
                critical: stats::count_by_status(patients, RiskLevel::Red),
                status: StatusBreakdown::of(patients),
            }
        })
    }

    /// Patients matching `term`, limited to one page.
    #[must_use]
    pub fn search(&self, term: &str) -> Vec<PatientRecord> {
        self.view.with(|cache| {
            let matches = stats::filter_search(cache.patients(), term);
            stats::window(&matches, self.page_size)
                .iter()
                .map(|p| (*p).clone())
                .collect()
        })
    }

    /// Re-fetch the roster.
    pub async fn refresh(&self) {
        self.view.refresh().await;
    }

    /// Enrol a patient, then re-fetch the roster.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the backend rejects the record.
    #[instrument(skip(self, patient), fields(user_id = %patient.user_id))]
    pub async fn add_patient(&self, patient: &NewPatient) -> Result<(), ConsoleError> {
        self.fetcher
            .api()
            .create_patient(self.fetcher.session(), patient)
            .await?;
        info!("Patient enrolled");
        self.view.refresh().await;
        Ok(())
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
