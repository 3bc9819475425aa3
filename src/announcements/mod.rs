//! Announcement feed synchronisation and authoring
//!
//! - [`store`]: per-scope mirrors of the remote service, the only component
//!   that talks to it
//! - [`presenter`]: read-only feed rows and the unread badge
//! - [`authoring`]: the professor's compose/edit state machine
//! - [`http`]: the reqwest implementation of [`api::AnnouncementApi`]

pub mod api;
pub mod attendance;
pub mod authoring;
pub mod error;
pub mod http;
pub mod presenter;
pub mod store;
pub mod types;

pub use api::{AnnouncementApi, AnnouncementList, CreatedAnnouncement};
pub use attendance::{AttendanceFigures, AttendanceRecord};
pub use authoring::{AuthoringPanel, DraftFields, PanelMode};
pub use error::{AnnouncementError, AnnouncementResult, ErrorKind};
pub use http::HttpAnnouncementApi;
pub use presenter::{AnnouncementSummary, FeedPresenter, FeedView, PresenterOptions};
pub use store::{AnnouncementStore, Snapshot, StoreEvent};
pub use types::{Announcement, AnnouncementDraft, AnnouncementPatch, CourseInfo, Scope};
