//! Resource fetching seam for the synchronizer.

use std::future::Future;

use mindwatch_core::Session;

use super::{Resource, ResourcePayload};
use crate::api::{ApiClient, ApiError};

/// Fetches one resource.
///
/// The synchronizer only ever talks to this trait, so tests can drive it
/// with fakes whose completion order they control.
pub trait ResourceFetcher: Send + Sync + 'static {
    /// Fetch the current value of `resource`.
    fn fetch(
        &self,
        resource: &Resource,
    ) -> impl Future<Output = Result<ResourcePayload, ApiError>> + Send;
}

/// Fetches resources from the backend on behalf of a session.
#[derive(Debug, Clone)]
pub struct SessionFetcher {
    api: ApiClient,
    session: Session,
}

impl SessionFetcher {
    #[must_use]
    pub const fn new(api: ApiClient, session: Session) -> Self {
        Self { api, session }
    }

    /// Session the fetches are authenticated with.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// The underlying API client.
    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }
}

impl ResourceFetcher for SessionFetcher {
    async fn fetch(&self, resource: &Resource) -> Result<ResourcePayload, ApiError> {
        let session = &self.session;
        Ok(match resource {
            Resource::Patients => ResourcePayload::Patients(self.api.list_patients(session).await?),
            Resource::Users => ResourcePayload::Users(self.api.users(session).await?),
            Resource::Analytics => ResourcePayload::Analytics(self.api.analytics(session).await?),
            Resource::Notifications => {
                ResourcePayload::Notifications(self.api.notifications(session).await?)
            }
            Resource::RedCases => ResourcePayload::RedCases(self.api.red_cases(session).await?),
            Resource::History(user_id) => ResourcePayload::History(
                user_id.clone(),
                self.api.history(user_id, Some(session)).await?,
            ),
        })
    }
}
