//! Persisted login session.
//!
//! The session lives under two keys, [`keys::TOKEN`] and [`keys::USER`].
//! Both must be present for the session to load; a file holding only one
//! of them loads as logged out.
//!
//! A [`SessionStore`] handle is passed explicitly to whatever needs the
//! session. Writes are visible to the very next read through any handle
//! that shares the same backing store.

use std::fs::{self, File};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use mindwatch_core::{Session, SessionUser};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// Storage keys for the persisted session.
pub mod keys {
    /// Key for the opaque bearer token.
    pub const TOKEN: &str = "token";

    /// Key for the JSON user profile.
    pub const USER: &str = "user";
}

/// Errors that can occur while reading or writing the session.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed session data: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistence for the logged-in session.
pub trait SessionStore: Send + Sync {
    /// Read the current session. `None` means logged out.
    ///
    /// # Errors
    ///
    /// Returns error if the backing storage cannot be read.
    fn load(&self) -> Result<Option<Session>, SessionStoreError>;

    /// Replace the current session.
    ///
    /// # Errors
    ///
    /// Returns error if the backing storage cannot be written.
    fn save(&self, session: &Session) -> Result<(), SessionStoreError>;

    /// Remove both session keys.
    ///
    /// # Errors
    ///
    /// Returns error if the backing storage cannot be written.
    fn clear(&self) -> Result<(), SessionStoreError>;
}

/// Encode a session as its two-key map.
fn encode(session: &Session) -> Result<Map<String, Value>, SessionStoreError> {
    let mut map = Map::new();
    map.insert(
        keys::TOKEN.to_string(),
        Value::String(session.token().expose_secret().to_string()),
    );
    map.insert(keys::USER.to_string(), serde_json::to_value(session.user())?);
    Ok(map)
}

/// Decode a two-key map. Anything short of both keys is logged out.
fn decode(map: &Map<String, Value>) -> Option<Session> {
    let token = map.get(keys::TOKEN).and_then(Value::as_str);
    let user = map.get(keys::USER);

    match (token, user) {
        (Some(token), Some(user)) => match SessionUser::deserialize(user) {
            Ok(user) => Some(Session::new(user, SecretString::from(token.to_string()))),
            Err(_) => {
                warn!("Stored user profile is unreadable; treating as logged out");
                None
            }
        },
        (None, None) => None,
        _ => {
            warn!("Only one of the session keys is stored; treating as logged out");
            None
        }
    }
}

// =============================================================================
// File store
// =============================================================================

/// Session persisted as a JSON object in a file.
///
/// Saves go through a temporary file and an atomic rename, so a crash
/// never leaves a half-written session behind.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Create a store backed by `path`. The file is created on first save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<Option<Map<String, Value>>, SessionStoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(Some(map)),
            _ => Ok(None),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>, SessionStoreError> {
        Ok(self.read_map()?.as_ref().and_then(decode))
    }

    fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&Value::Object(encode(session)?))?;
        let tmp_path = self.temp_path();
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(json.as_bytes())?;
        tmp_file.sync_all()?;
        drop(tmp_file);
        fs::rename(&tmp_path, &self.path)?;

        debug!(path = %self.path.display(), user_id = %session.id(), "Session saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Session cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// Memory store
// =============================================================================

/// In-process session store. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    slot: Arc<Mutex<Map<String, Value>>>,
}

impl MemorySessionStore {
    /// Create an empty (logged out) store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a raw key, bypassing session encoding.
    pub fn set_raw(&self, key: &str, value: Value) {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>, SessionStoreError> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(decode(&slot))
    }

    fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        let encoded = encode(session)?;
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = encoded;
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.remove(keys::TOKEN);
        slot.remove(keys::USER);
        Ok(())
    }
}
