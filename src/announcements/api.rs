//! Remote announcement service abstraction

use async_trait::async_trait;

use crate::announcements::attendance::AttendanceFigures;
use crate::announcements::error::AnnouncementResult;
use crate::announcements::types::{
    Announcement, AnnouncementDraft, AnnouncementPatch, CourseInfo, Scope,
};

/// Full list for a scope, as returned by the service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnouncementList {
    pub announcements: Vec<Announcement>,
    /// Only the student listing reports the course
    pub course: Option<CourseInfo>,
}

/// What the service tells us after a create.
///
/// Deployments differ in how much of the entity they echo back, so only the
/// id is kept and even that may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreatedAnnouncement {
    pub id: Option<String>,
}

/// Operations offered by the announcement backend
#[async_trait]
pub trait AnnouncementApi: Send + Sync {
    /// Fetch every announcement visible in `scope`
    async fn list(&self, scope: &Scope) -> AnnouncementResult<AnnouncementList>;

    /// Publish a new announcement
    async fn create(&self, draft: &AnnouncementDraft) -> AnnouncementResult<CreatedAnnouncement>;

    /// Replace title and body of an existing announcement
    async fn update(&self, id: &str, patch: &AnnouncementPatch) -> AnnouncementResult<()>;

    /// Remove an announcement
    async fn delete(&self, id: &str) -> AnnouncementResult<()>;

    /// Fetch the current student's attendance figures
    async fn attendance(&self) -> AnnouncementResult<AttendanceFigures>;
}
