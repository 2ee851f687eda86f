//! Patient dashboard: personal post feed.

use mindwatch_core::{Admitted, HistoryEntry, PostId, Role, Session};

use super::DashboardContext;
use crate::api::{ApiClient, ImageUpload};
use crate::error::ConsoleError;
use crate::feed::{
    Post, PostFeed, SIMULATION_INTERVAL, SessionAnalyzer, SimulationHandle, SubmitError,
    start_simulation,
};

/// Patient dashboard view model.
#[derive(Debug)]
pub struct PatientDashboard {
    api: ApiClient,
    session: Session,
    feed: PostFeed<SessionAnalyzer>,
}

impl PatientDashboard {
    /// Open the dashboard with an empty feed.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::AuthRequired`] if `admitted` is not a patient.
    pub fn open(admitted: Admitted, ctx: &DashboardContext) -> Result<Self, ConsoleError> {
        if admitted.role() != Role::Patient {
            return Err(ConsoleError::AuthRequired);
        }
        let session = admitted.into_session();
        let feed = PostFeed::new(SessionAnalyzer::new(ctx.api.clone(), session.clone()));
        Ok(Self {
            api: ctx.api.clone(),
            session,
            feed,
        })
    }

    /// The patient's feed.
    #[must_use]
    pub const fn feed(&self) -> &PostFeed<SessionAnalyzer> {
        &self.feed
    }

    /// Posts, newest first.
    #[must_use]
    pub fn posts(&self) -> Vec<Post> {
        self.feed.posts()
    }

    /// Post text and/or an image and wait for the verdict.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Empty`] when there is nothing to post.
    pub async fn submit(
        &self,
        message: &str,
        image: Option<ImageUpload>,
    ) -> Result<PostId, SubmitError> {
        self.feed.submit(message, image).await
    }

    /// Post sample messages every [`SIMULATION_INTERVAL`].
    #[must_use]
    pub fn simulate(&self, limit: Option<usize>) -> SimulationHandle {
        start_simulation(self.feed.clone(), SIMULATION_INTERVAL, limit)
    }

    /// The patient's own analysis history.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    pub async fn history(&self) -> Result<Vec<HistoryEntry>, ConsoleError> {
        Ok(self
            .api
            .history(self.session.id(), Some(&self.session))
            .await?)
    }
}
