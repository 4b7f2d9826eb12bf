//! Session store: the authenticated user's identity, role, and approval status.
//!
//! The record is replaced as a whole value, never patched field by field.
//! Readers (route guards, dashboards) get a synchronous snapshot; the
//! onboarding flow is the only writer. Subscribers are woken only when the
//! stored value actually changes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::registration::{AccountStatus, EmployerAccount};

/// Cached subset of the backend account, persisted as the `user` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionUser {
    pub user_id: String,
    pub role: String,
    pub name: String,
    pub status: AccountStatus,
}

impl SessionUser {
    pub fn from_account(account: &EmployerAccount) -> Self {
        Self {
            user_id: account.emp_id.clone(),
            role: account.role.clone(),
            name: account.name.clone(),
            status: account.status,
        }
    }

    /// Same user with a different status.
    pub fn with_status(&self, status: AccountStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

/// Holds the current [`SessionUser`], optionally mirrored to a JSON file.
pub struct SessionStore {
    tx: watch::Sender<Option<SessionUser>>,
    path: Option<PathBuf>,
}

impl SessionStore {
    /// In-memory store with no persisted record.
    pub fn in_memory() -> Arc<Self> {
        let (tx, _rx) = watch::channel(None);
        Arc::new(Self { tx, path: None })
    }

    /// Open a file-backed store, loading an existing record if present.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Arc<Self>, SessionError> {
        let path = path.into();
        let initial = load_record(&path).await?;
        if let Some(ref user) = initial {
            info!(user_id = %user.user_id, status = %user.status, "Restored session user");
        }
        let (tx, _rx) = watch::channel(initial);
        Ok(Arc::new(Self {
            tx,
            path: Some(path),
        }))
    }

    /// Snapshot of the current user, if any.
    pub fn current(&self) -> Option<SessionUser> {
        self.tx.borrow().clone()
    }

    /// Current user, or the fatal missing-identity error.
    pub fn require_user(&self) -> Result<SessionUser, SessionError> {
        self.current().ok_or(SessionError::MissingIdentity)
    }

    /// Replace the stored user. Subscribers are notified only on change.
    pub async fn write(&self, user: SessionUser) -> Result<(), SessionError> {
        if let Some(ref path) = self.path {
            persist_record(path, &user).await?;
        }
        let changed = self.tx.send_if_modified(|current| {
            if current.as_ref() == Some(&user) {
                false
            } else {
                *current = Some(user.clone());
                true
            }
        });
        if changed {
            debug!(user_id = %user.user_id, status = %user.status, "Session user updated");
        }
        Ok(())
    }

    /// Update only the status of the stored user by replacing the record.
    ///
    /// Ignored when the session belongs to a different user or is empty.
    pub async fn update_status(
        &self,
        user_id: &str,
        status: AccountStatus,
    ) -> Result<(), SessionError> {
        let Some(current) = self.current() else {
            return Ok(());
        };
        if current.user_id != user_id || current.status == status {
            return Ok(());
        }
        self.write(current.with_status(status)).await
    }

    /// Log out: drop the record from memory and disk.
    pub async fn clear(&self) -> Result<(), SessionError> {
        if let Some(ref path) = self.path {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(SessionError::Persist {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        self.tx.send_if_modified(|current| current.take().is_some());
        info!("Session cleared");
        Ok(())
    }

    /// Subscribe to session changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<SessionUser>> {
        self.tx.subscribe()
    }
}

async fn load_record(path: &Path) -> Result<Option<SessionUser>, SessionError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(SessionError::Persist {
                path: path.display().to_string(),
                reason: e.to_string(),
            });
        }
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| {
            warn!(path = %path.display(), error = %e, "Session record is unreadable");
            SessionError::Corrupt {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })
}

async fn persist_record(path: &Path, user: &SessionUser) -> Result<(), SessionError> {
    let persist_err = |reason: String| SessionError::Persist {
        path: path.display().to_string(),
        reason,
    };
    let json = serde_json::to_string_pretty(user).map_err(|e| persist_err(e.to_string()))?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| persist_err(e.to_string()))?;
    }
    tokio::fs::write(path, json)
        .await
        .map_err(|e| persist_err(e.to_string()))
}
