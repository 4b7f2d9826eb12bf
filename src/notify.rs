//! User-facing notifications: the toast layer of the onboarding flow.
//!
//! Notifying never blocks and never fails: notices are logged, kept in a
//! short history, and broadcast to whoever is listening.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

const DEFAULT_BROADCAST_CAPACITY: usize = 64;
const HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single notification shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            at: Utc::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }
}

/// Sink for user-facing notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Logs, records, and broadcasts notices.
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Notice>,
    history: Mutex<VecDeque<Notice>>,
}

impl BroadcastNotifier {
    pub fn new() -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Arc::new(Self {
            tx,
            history: Mutex::new(VecDeque::new()),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    /// Most recent notices, oldest first.
    pub fn recent(&self) -> Vec<Notice> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info | NoticeLevel::Success => info!(level = ?notice.level, "{}", notice.message),
            NoticeLevel::Warning => warn!("{}", notice.message),
            NoticeLevel::Error => error!("{}", notice.message),
        }

        {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            history.push_back(notice.clone());
            while history.len() > HISTORY_LIMIT {
                history.pop_front();
            }
        }

        // No receivers is fine
        let _ = self.tx.send(notice);
    }
}
