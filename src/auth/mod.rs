//! Session handling
//!
//! File-backed credential store. The API layer reads the token from here on
//! every outgoing request and clears it when the server answers 401. The
//! backend is a mock, so `login` mints a token locally instead of running a
//! real handshake.

use crate::{CoursetrackError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A stored session credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    /// Account email
    pub email: String,
    /// Bearer token attached to outgoing requests
    pub token: String,
    /// RFC 3339 timestamp of when the session was created
    pub authenticated_at: String,
}

/// Credential provider backed by a JSON file
///
/// The current session is cached in memory so the interceptor can read it
/// without touching the filesystem on every request.
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    current: Mutex<Option<SessionData>>,
}

impl SessionStore {
    /// Open a session store at the given path, loading any existing session.
    /// A malformed session file is treated as no session.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let current = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).ok(),
            Err(_) => None,
        };

        Ok(Self {
            path,
            current: Mutex::new(current),
        })
    }

    /// Open the store at the default path (~/.config/coursetrack/session.json)
    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path())
    }

    /// Default session file path
    pub fn default_path() -> PathBuf {
        // Always use ~/.config for consistency across platforms (macOS, Linux)
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("coursetrack");
        path.push("session.json");
        path
    }

    /// The session file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current session, if any
    pub fn get(&self) -> Option<SessionData> {
        self.current.lock().unwrap().clone()
    }

    /// Current bearer token, if a session exists
    pub fn token(&self) -> Option<String> {
        self.current.lock().unwrap().as_ref().map(|s| s.token.clone())
    }

    /// True when a session is stored
    pub fn is_authenticated(&self) -> bool {
        self.current.lock().unwrap().is_some()
    }

    /// Create a session for the given email and persist it.
    ///
    /// The backend is a mock with no auth endpoint, so the token is minted
    /// locally.
    pub fn login(&self, email: &str) -> Result<SessionData> {
        let session = SessionData {
            email: email.to_string(),
            token: uuid::Uuid::new_v4().to_string(),
            authenticated_at: chrono::Utc::now().to_rfc3339(),
        };
        self.set(session.clone())?;
        tracing::info!(email, "Logged in");
        Ok(session)
    }

    /// Persist a session
    pub fn set(&self, session: SessionData) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(&session)?;
        fs::write(&self.path, raw).map_err(|e| {
            CoursetrackError::Session(format!(
                "Failed to write session file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        *self.current.lock().unwrap() = Some(session);
        Ok(())
    }

    /// Drop the stored session.
    ///
    /// Infallible so the 401 interceptor path can always run it; a failure
    /// to remove the file is logged and the in-memory session is cleared
    /// regardless.
    pub fn clear(&self) {
        *self.current.lock().unwrap() = None;
        if self.path.exists() {
            if let Err(e) = fs::remove_file(&self.path) {
                tracing::warn!(path = %self.path.display(), "Failed to remove session file: {}", e);
            }
        }
        tracing::info!("Session cleared");
    }
}
