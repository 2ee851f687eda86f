//! Backend endpoint methods.

use mindwatch_core::{
    AnalysisResult, AnalyticsSnapshot, BackendHealth, HistoryEntry, Notification, NotificationId,
    PatientRecord, RedCase, Session, UserId, UserRecord,
};
use reqwest::Method;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};

use super::{
    AnalyzeRequest, ApiClient, ApiError, ImageUpload, LoginRequest, LoginResponse, NewPatient,
    RegisterRequest, Registration, require_session,
};

impl ApiClient {
    /// Exchange credentials for a session.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] for rejected credentials, or a
    /// transport/decoding error.
    #[instrument(skip(self, password), fields(user_id = %user_id))]
    pub async fn login(&self, user_id: &UserId, password: &SecretString) -> Result<Session, ApiError> {
        let body = LoginRequest {
            user_id: user_id.as_str(),
            password: password.expose_secret(),
        };
        let response: LoginResponse = self.post(&["login"], &body, None).await?;
        debug!(role = %mindwatch_core::resolve_role(response.user.id.as_str()), "Login accepted");
        Ok(Session::new(
            response.user,
            SecretString::from(response.access_token),
        ))
    }

    /// Create a new patient account.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] when the backend rejects the
    /// registration (e.g. the ID is taken).
    #[instrument(skip(self, registration), fields(user_id = %registration.user_id))]
    pub async fn register(&self, registration: &Registration) -> Result<(), ApiError> {
        let body = RegisterRequest {
            user_id: registration.user_id.as_str(),
            password: registration.password.expose_secret(),
            profile: &registration.profile,
        };
        let url = self.endpoint(&["register"])?;
        self.send_empty(self.request(Method::POST, url, None).json(&body))
            .await
    }

    /// List monitored patients.
    ///
    /// # Errors
    ///
    /// Returns error if the session is unusable or the request fails.
    #[instrument(skip(self, session))]
    pub async fn list_patients(&self, session: &Session) -> Result<Vec<PatientRecord>, ApiError> {
        let session = require_session(Some(session))?;
        self.get(&["patients"], Some(session)).await
    }

    /// Enrol a patient (therapist intake).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] when the backend rejects the record.
    #[instrument(skip(self, session, patient), fields(user_id = %patient.user_id))]
    pub async fn create_patient(&self, session: &Session, patient: &NewPatient) -> Result<(), ApiError> {
        let session = require_session(Some(session))?;
        let url = self.endpoint(&["patients"])?;
        self.send_empty(self.request(Method::POST, url, Some(session)).json(patient))
            .await
    }

    /// Analyse a text message.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the verdict cannot be decoded.
    #[instrument(skip(self, message, session), fields(user_id = %user_id, len = message.len()))]
    pub async fn analyze(
        &self,
        message: &str,
        user_id: &UserId,
        session: Option<&Session>,
    ) -> Result<AnalysisResult, ApiError> {
        let body = AnalyzeRequest {
            message,
            user_id: user_id.as_str(),
        };
        self.post(&["analyze"], &body, session).await
    }

    /// Analyse an image, optionally with accompanying text.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the verdict cannot be decoded.
    #[instrument(
        skip(self, image, message, session),
        fields(user_id = %user_id, file_name = %image.file_name, bytes = image.bytes.len())
    )]
    pub async fn analyze_image(
        &self,
        image: &ImageUpload,
        message: Option<&str>,
        user_id: &UserId,
        session: Option<&Session>,
    ) -> Result<AnalysisResult, ApiError> {
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(image.mime_type())?;
        let mut form = Form::new()
            .part("image", part)
            .text("user_id", user_id.as_str().to_string());
        if let Some(message) = message.filter(|m| !m.trim().is_empty()) {
            form = form.text("message", message.to_string());
        }

        let url = self.endpoint(&["analyze-image"])?;
        let response = self
            .request(Method::POST, url, session)
            .multipart(form)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Analysis history for one user, newest first.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self, session), fields(user_id = %user_id))]
    pub async fn history(
        &self,
        user_id: &UserId,
        session: Option<&Session>,
    ) -> Result<Vec<HistoryEntry>, ApiError> {
        self.get(&["history", user_id.as_str()], session).await
    }

    /// Risk distribution and score trend.
    ///
    /// # Errors
    ///
    /// Returns error if the session is unusable or the request fails.
    #[instrument(skip(self, session))]
    pub async fn analytics(&self, session: &Session) -> Result<AnalyticsSnapshot, ApiError> {
        let session = require_session(Some(session))?;
        self.get(&["analytics"], Some(session)).await
    }

    /// Every registered account.
    ///
    /// # Errors
    ///
    /// Returns error if the session is unusable or the request fails.
    #[instrument(skip(self, session))]
    pub async fn users(&self, session: &Session) -> Result<Vec<UserRecord>, ApiError> {
        let session = require_session(Some(session))?;
        self.get(&["users"], Some(session)).await
    }

    /// Delete an account.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for an unknown ID.
    #[instrument(skip(self, session), fields(user_id = %user_id))]
    pub async fn delete_user(&self, session: &Session, user_id: &UserId) -> Result<(), ApiError> {
        let session = require_session(Some(session))?;
        let url = self.endpoint(&["users", user_id.as_str()])?;
        self.send_empty(self.request(Method::DELETE, url, Some(session)))
            .await
    }

    /// High-risk case export.
    ///
    /// # Errors
    ///
    /// Returns error if the session is unusable or the request fails.
    #[instrument(skip(self, session))]
    pub async fn red_cases(&self, session: &Session) -> Result<Vec<RedCase>, ApiError> {
        let session = require_session(Some(session))?;
        self.get(&["export", "red-cases"], Some(session)).await
    }

    /// Unread notifications.
    ///
    /// # Errors
    ///
    /// Returns error if the session is unusable or the request fails.
    #[instrument(skip(self, session))]
    pub async fn notifications(&self, session: &Session) -> Result<Vec<Notification>, ApiError> {
        let session = require_session(Some(session))?;
        self.get(&["notifications"], Some(session)).await
    }

    /// Mark a notification as read.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for an unknown ID.
    #[instrument(skip(self, session), fields(notification_id = %id))]
    pub async fn mark_notification_read(
        &self,
        session: &Session,
        id: NotificationId,
    ) -> Result<(), ApiError> {
        let session = require_session(Some(session))?;
        let id = id.to_string();
        let url = self.endpoint(&["notifications", &id, "read"])?;
        self.send_empty(self.request(Method::POST, url, Some(session)))
            .await
    }

    /// Backend liveness and model readiness.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self))]
    pub async fn health(&self) -> Result<BackendHealth, ApiError> {
        self.get(&["health"], None).await
    }
}
