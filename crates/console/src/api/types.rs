//! Request and response bodies for the backend API.

use mindwatch_core::{SessionUser, UserId};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// `{"error": "..."}` body sent with non-success responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}

/// `POST /login` body.
#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub user_id: &'a str,
    pub password: &'a str,
}

/// `POST /login` response.
#[derive(Deserialize)]
pub(crate) struct LoginResponse {
    pub access_token: String,
    pub user: SessionUser,
}

/// Profile fields shared by self-registration and therapist intake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medical_history: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_media_handle: Option<String>,
}

/// Self-registration request.
pub struct Registration {
    pub user_id: UserId,
    pub password: SecretString,
    pub profile: PatientProfile,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("user_id", &self.user_id)
            .field("password", &"[REDACTED]")
            .field("profile", &self.profile)
            .finish()
    }
}

/// `POST /register` wire body.
#[derive(Serialize)]
pub(crate) struct RegisterRequest<'a> {
    pub user_id: &'a str,
    pub password: &'a str,
    #[serde(flatten)]
    pub profile: &'a PatientProfile,
}

/// `POST /patients` body, used by therapists to enrol a patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPatient {
    pub user_id: UserId,
    #[serde(flatten)]
    pub profile: PatientProfile,
}

/// `POST /analyze` body.
#[derive(Serialize)]
pub(crate) struct AnalyzeRequest<'a> {
    pub message: &'a str,
    pub user_id: &'a str,
}

/// An image attached to an analysis submission.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Create an upload from raw bytes.
    #[must_use]
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Best-effort MIME type from the file extension.
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        let ext = self
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase());
        match ext.as_deref() {
            Some("png") => "image/png",
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            _ => "application/octet-stream",
        }
    }
}

impl std::fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageUpload")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}
