//! Read-only feed rendering over the store

use chrono::{DateTime, FixedOffset, Offset, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::announcements::error::AnnouncementResult;
use crate::announcements::store::{AnnouncementStore, Snapshot, StoreEvent};
use crate::announcements::types::{Announcement, CourseInfo, Scope};
use crate::config::ClientConfig;

/// How summaries are rendered
#[derive(Debug, Clone, PartialEq)]
pub struct PresenterOptions {
    pub preview_chars: usize,
    pub timestamp_format: String,
    pub offset: FixedOffset,
}

impl Default for PresenterOptions {
    fn default() -> Self {
        Self {
            preview_chars: 80,
            timestamp_format: "%d/%m/%Y %H:%M".to_string(),
            offset: Utc.fix(),
        }
    }
}

impl PresenterOptions {
    pub fn from_config(config: &ClientConfig) -> AnnouncementResult<Self> {
        Ok(Self {
            preview_chars: config.preview_chars,
            timestamp_format: config.timestamp_format.clone(),
            offset: config.utc_offset()?,
        })
    }

    pub fn format_timestamp(&self, at: &DateTime<Utc>) -> String {
        at.with_timezone(&self.offset)
            .format(&self.timestamp_format)
            .to_string()
    }
}

/// One render-ready feed row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncementSummary {
    pub id: String,
    pub title: String,
    /// Display name when known, otherwise the author's email
    pub author: String,
    pub published: String,
    pub preview: String,
}

/// Collapse whitespace and cut to `max_chars`, marking the cut with `…`
pub fn preview(body: &str, max_chars: usize) -> String {
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }

    let mut cut: String = collapsed.chars().take(max_chars).collect();
    let trimmed_len = cut.trim_end().len();
    cut.truncate(trimmed_len);
    cut.push('…');
    cut
}

/// A frozen view of one scope's feed.
///
/// Iterating [`FeedView::summaries`] is lazy and can be repeated; the same
/// view always yields the same rows.
#[derive(Debug, Clone)]
pub struct FeedView {
    announcements: Snapshot,
    order: Vec<usize>,
    course: Option<CourseInfo>,
    options: Arc<PresenterOptions>,
}

impl FeedView {
    fn new(announcements: Snapshot, course: Option<CourseInfo>, options: Arc<PresenterOptions>) -> Self {
        let mut order: Vec<usize> = (0..announcements.len()).collect();
        // Stable: equal timestamps keep the server's order.
        order.sort_by(|&a, &b| announcements[b].published_at.cmp(&announcements[a].published_at));
        Self {
            announcements,
            order,
            course,
            options,
        }
    }

    /// Newest first
    pub fn summaries(&self) -> impl Iterator<Item = AnnouncementSummary> + '_ {
        self.order
            .iter()
            .map(move |&index| self.summarize(&self.announcements[index]))
    }

    /// Announcement behind a summary row, for handing to the authoring panel
    pub fn announcement(&self, id: &str) -> Option<&Announcement> {
        self.announcements.iter().find(|a| a.id == id)
    }

    /// There is no per-user read tracking; every announcement counts as unread
    pub fn unread_count(&self) -> usize {
        self.announcements.len()
    }

    /// Badge text for the tab icon
    pub fn badge(&self) -> String {
        self.unread_count().to_string()
    }

    /// The tab icon hides its badge at zero
    pub fn shows_badge(&self) -> bool {
        self.unread_count() > 0
    }

    pub fn course(&self) -> Option<&CourseInfo> {
        self.course.as_ref()
    }

    pub fn len(&self) -> usize {
        self.announcements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.announcements.is_empty()
    }

    fn summarize(&self, announcement: &Announcement) -> AnnouncementSummary {
        AnnouncementSummary {
            id: announcement.id.clone(),
            title: announcement.title.clone(),
            author: announcement
                .author_name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| announcement.author_email.clone()),
            published: self.options.format_timestamp(&announcement.published_at),
            preview: preview(&announcement.body, self.options.preview_chars),
        }
    }
}

/// Feed presenter bound to one scope
#[derive(Clone)]
pub struct FeedPresenter {
    store: AnnouncementStore,
    scope: Scope,
    options: Arc<PresenterOptions>,
}

impl FeedPresenter {
    pub fn new(store: AnnouncementStore, scope: Scope, options: PresenterOptions) -> Self {
        Self {
            store,
            scope,
            options: Arc::new(options),
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Snapshot the store's current mirror
    pub async fn view(&self) -> FeedView {
        let announcements = self.store.mirror(&self.scope).await;
        let course = self.store.course_info(&self.scope).await;
        FeedView::new(announcements, course, self.options.clone())
    }

    pub async fn unread_count(&self) -> usize {
        self.store.mirror(&self.scope).await.len()
    }

    /// Store events, for re-rendering when the mirror changes
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe()
    }

    /// Whether `event` concerns this presenter's scope
    pub fn is_relevant(&self, event: &StoreEvent) -> bool {
        match event {
            StoreEvent::MirrorReplaced { scope, .. }
            | StoreEvent::MutationFailed { scope, .. }
            | StoreEvent::ReloadFailed { scope, .. } => scope == &self.scope,
        }
    }
}
