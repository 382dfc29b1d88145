//! Local session storage.
//!
//! The store is a single slot holding `accessToken` and `userData`. Every
//! login or registration overwrites it wholesale.

use std::sync::{PoisonError, RwLock};

use camino::{Utf8Path as Path, Utf8PathBuf as PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Profile, Session};


#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("could not access session file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session file {path} is corrupt")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub trait SessionStore: Send + Sync {
    fn load(&self) -> Option<Session>;

    fn save(&self, session: &Session) -> Result<(), SessionError>;

    fn clear(&self) -> Result<(), SessionError>;

    fn token(&self) -> Option<String> {
        self.load().and_then(|session| session.token)
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    slot: RwLock<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        MemorySessionStore {
            slot: RwLock::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<Session> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save(&self, session: &Session) -> Result<(), SessionError> {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoredUserData {
    email: String,
    name: String,
    role: String,
    timestamp: DateTime<Utc>,
}

/// On-disk layout, keyed like the browser's local storage.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
struct StoredSession {
    #[serde(rename = "accessToken", default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(rename = "userData", default, skip_serializing_if = "Option::is_none")]
    user_data: Option<StoredUserData>,
}

impl From<&Session> for StoredSession {
    fn from(value: &Session) -> Self {
        StoredSession {
            access_token: value.token.clone(),
            user_data: Some(StoredUserData {
                email: value.profile.email.clone(),
                name: value.profile.name.clone(),
                role: value.profile.role.clone(),
                timestamp: value.issued_at,
            }),
        }
    }
}

impl StoredSession {
    fn into_session(self) -> Option<Session> {
        let user_data = self.user_data?;
        Some(Session {
            token: self.access_token,
            profile: Profile {
                email: user_data.email,
                name: user_data.name,
                role: user_data.role,
            },
            issued_at: user_data.timestamp,
        })
    }
}

/// JSON file backed store with an in-memory copy of the current session.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    cached: RwLock<Option<Session>>,
}

impl FileSessionStore {
    /// Opens the store, reading an existing session file if there is one.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let path = path.into();
        let cached = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<StoredSession>(&content)
                .map_err(|source| SessionError::Corrupt {
                    path: path.clone(),
                    source,
                })?
                .into_session(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => return Err(SessionError::Io { path, source }),
        };
        Ok(FileSessionStore {
            path,
            cached: RwLock::new(cached),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, stored: &StoredSession) -> Result<(), SessionError> {
        let io_err = |source| SessionError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let content = serde_json::to_string_pretty(stored).map_err(|source| {
            SessionError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;
        std::fs::write(&self.path, content).map_err(io_err)
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Option<Session> {
        self.cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[tracing::instrument(skip_all, fields(path = %self.path))]
    fn save(&self, session: &Session) -> Result<(), SessionError> {
        self.write(&StoredSession::from(session))?;
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        tracing::debug!(email = %session.profile.email, "session saved");
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(path = %self.path))]
    fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(SessionError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        }
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
