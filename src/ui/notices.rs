//! Dismissable notices for user feedback
//!
//! Success and info notices expire on their own; failure notices stay until
//! the user dismisses them, so a failed save or delete is never missed.

use std::collections::VecDeque;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

use crate::announcements::error::{AnnouncementError, ErrorKind};

/// Maximum number of notices kept at once
const MAX_QUEUED_NOTICES: usize = 5;

/// Notice severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single notice
#[derive(Debug, Clone)]
pub struct Notice {
    pub id: String,
    pub message: String,
    pub detail: Option<String>,
    pub level: NoticeLevel,
    pub created_at: Instant,
    /// `None` means the notice waits for an explicit dismiss
    pub duration: Option<Duration>,
}

impl Notice {
    pub fn new(message: impl Into<String>, level: NoticeLevel) -> Self {
        let duration = match level {
            NoticeLevel::Info => Some(Duration::from_secs(3)),
            NoticeLevel::Success => Some(Duration::from_secs(2)),
            NoticeLevel::Warning => Some(Duration::from_secs(4)),
            NoticeLevel::Error => None,
        };

        Self {
            id: Uuid::new_v4().to_string(),
            message: message.into(),
            detail: None,
            level,
            created_at: Instant::now(),
            duration,
        }
    }

    /// Failure notice for `action`, e.g. "save announcement"
    pub fn failure(action: &str, error: &AnnouncementError) -> Self {
        let level = match error.kind() {
            ErrorKind::Validation | ErrorKind::Busy => NoticeLevel::Warning,
            _ => NoticeLevel::Error,
        };
        let mut notice = Self::new(format!("Failed to {}", action), level);
        notice.detail = Some(error.to_string());
        // Even a warning about a rejected change waits for the user.
        notice.duration = None;
        notice
    }

    pub fn is_expired(&self) -> bool {
        self.duration
            .map(|d| self.created_at.elapsed() >= d)
            .unwrap_or(false)
    }

    pub fn requires_dismiss(&self) -> bool {
        self.duration.is_none()
    }

    pub fn icon(&self) -> &'static str {
        match self.level {
            NoticeLevel::Info => "ℹ",
            NoticeLevel::Success => "✓",
            NoticeLevel::Warning => "⚠",
            NoticeLevel::Error => "✗",
        }
    }
}

/// Queue of notices waiting to be shown
#[derive(Debug)]
pub struct NoticeCenter {
    notices: VecDeque<Notice>,
    max_queued: usize,
}

impl Default for NoticeCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl NoticeCenter {
    pub fn new() -> Self {
        Self {
            notices: VecDeque::new(),
            max_queued: MAX_QUEUED_NOTICES,
        }
    }

    /// Queue a notice and return its id.
    ///
    /// When full, the oldest notice that does not need a dismiss is evicted
    /// first; sticky notices only go once nothing else is left.
    pub fn push(&mut self, notice: Notice) -> String {
        let id = notice.id.clone();
        self.notices.push_back(notice);

        while self.notices.len() > self.max_queued {
            match self.notices.iter().position(|n| !n.requires_dismiss()) {
                Some(index) => {
                    self.notices.remove(index);
                }
                None => {
                    self.notices.pop_front();
                }
            }
        }
        id
    }

    pub fn info(&mut self, message: impl Into<String>) -> String {
        self.push(Notice::new(message, NoticeLevel::Info))
    }

    pub fn success(&mut self, message: impl Into<String>) -> String {
        self.push(Notice::new(message, NoticeLevel::Success))
    }

    /// Transient warning with the error text as detail
    pub fn warning(&mut self, message: impl Into<String>, error: &AnnouncementError) -> String {
        let mut notice = Notice::new(message, NoticeLevel::Warning);
        notice.detail = Some(error.to_string());
        self.push(notice)
    }

    pub fn failure(&mut self, action: &str, error: &AnnouncementError) -> String {
        self.push(Notice::failure(action, error))
    }

    /// Dismiss a notice; returns whether it was present
    pub fn dismiss(&mut self, id: &str) -> bool {
        let before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        self.notices.len() != before
    }

    pub fn dismiss_all(&mut self) {
        self.notices.clear();
    }

    /// Drop notices whose display time has passed
    pub fn prune_expired(&mut self) {
        self.notices.retain(|n| !n.is_expired());
    }

    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.notices.back()
    }

    /// Whether any notice is still waiting for the user
    pub fn has_blocking(&self) -> bool {
        self.notices.iter().any(Notice::requires_dismiss)
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }
}
