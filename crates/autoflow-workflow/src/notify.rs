//! User-visible notices
//!
//! Every service failure, and every successful command, is reported through
//! a [`Notifier`] in addition to the `tracing` event. Front ends decide how to
//! show them (a toast, a line on stderr).

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// One toast-style message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

/// Sink for notices
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Forwards notices to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => error!(notice = %notice.message, "Notice"),
            _ => info!(notice = %notice.message, level = ?notice.level, "Notice"),
        }
    }
}

/// Keeps notices in memory for later display
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    notices: RwLock<Vec<Notice>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.read().clone()
    }

    pub fn errors(&self) -> Vec<Notice> {
        self.notices
            .read()
            .iter()
            .filter(|n| n.is_error())
            .cloned()
            .collect()
    }

    pub fn last(&self) -> Option<Notice> {
        self.notices.read().last().cloned()
    }

    /// Remove and return everything collected so far
    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.write())
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.write().push(notice);
    }
}
