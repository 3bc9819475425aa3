//! Professor authoring panel
//!
//! Two states: composing a new announcement, or editing an existing one.
//! Every failure becomes a notice and leaves the draft untouched so the
//! professor can retry without retyping. A change the server confirmed is
//! never kept as a draft, even when the reload after it failed.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::announcements::error::{AnnouncementError, AnnouncementResult, ErrorKind};
use crate::announcements::store::{AnnouncementStore, Snapshot};
use crate::announcements::types::{Announcement, AnnouncementDraft, AnnouncementPatch, Scope};
use crate::ui::NoticeCenter;

/// Which announcement `save` will write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelMode {
    ComposingNew,
    EditingExisting { target_id: String },
}

/// Title and body being typed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftFields {
    pub title: String,
    pub body: String,
}

impl DraftFields {
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.body.is_empty()
    }
}

/// Authoring panel for one professor
pub struct AuthoringPanel {
    store: AnnouncementStore,
    scope: Scope,
    author_name: String,
    author_email: String,
    mode: PanelMode,
    draft: DraftFields,
    notices: NoticeCenter,
}

impl AuthoringPanel {
    pub fn new(store: AnnouncementStore, author_name: impl Into<String>, author_email: impl Into<String>) -> Self {
        let author_email = author_email.into();
        Self {
            store,
            scope: Scope::Professor(author_email.clone()),
            author_name: author_name.into(),
            author_email,
            mode: PanelMode::ComposingNew,
            draft: DraftFields::default(),
            notices: NoticeCenter::new(),
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn store(&self) -> &AnnouncementStore {
        &self.store
    }

    pub fn mode(&self) -> &PanelMode {
        &self.mode
    }

    pub fn draft(&self) -> &DraftFields {
        &self.draft
    }

    pub fn notices(&self) -> &NoticeCenter {
        &self.notices
    }

    pub fn notices_mut(&mut self) -> &mut NoticeCenter {
        &mut self.notices
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.draft.title = title.into();
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.draft.body = body.into();
    }

    /// Label for the save button
    pub fn save_label(&self) -> &'static str {
        match self.mode {
            PanelMode::ComposingNew => "Create announcement",
            PanelMode::EditingExisting { .. } => "Save changes",
        }
    }

    /// Load `announcement` into the draft and switch to editing it
    pub fn edit(&mut self, announcement: &Announcement) {
        debug!("Editing announcement {}", announcement.id);
        self.draft = DraftFields {
            title: announcement.title.clone(),
            body: announcement.body.clone(),
        };
        self.mode = PanelMode::EditingExisting {
            target_id: announcement.id.clone(),
        };
    }

    /// Abandon the edit and start a fresh draft
    pub fn cancel_edit(&mut self) {
        self.reset();
    }

    /// Create or update depending on the current mode
    pub async fn save(&mut self, cancel: &CancellationToken) -> AnnouncementResult<()> {
        let result = match &self.mode {
            PanelMode::ComposingNew => {
                let draft = AnnouncementDraft::new(
                    self.draft.title.clone(),
                    self.draft.body.clone(),
                    self.author_name.clone(),
                    self.author_email.clone(),
                );
                self.store.create(&self.scope, &draft, cancel).await.map(|_| ())
            }
            PanelMode::EditingExisting { target_id } => {
                let patch = AnnouncementPatch::new(self.draft.title.clone(), self.draft.body.clone());
                self.store.update(&self.scope, target_id, &patch, cancel).await
            }
        };

        match result {
            Ok(()) => {
                self.notices.success("Announcement saved");
                self.reset();
                Ok(())
            }
            Err(err) if err.change_confirmed() => {
                // The server has it; keeping the draft would invite a duplicate.
                self.notices.warning("Announcement saved, but reloading failed", &err);
                self.reset();
                Err(err)
            }
            Err(err) => {
                self.note_failure("save announcement", &err);
                Err(err)
            }
        }
    }

    /// Delete `id` without touching the draft, unless it is the one being edited
    pub async fn delete(&mut self, id: &str, cancel: &CancellationToken) -> AnnouncementResult<()> {
        let result = self.store.delete(&self.scope, id, cancel).await;

        let gone = match &result {
            Ok(()) => {
                self.notices.success("Announcement deleted");
                true
            }
            Err(err) if err.change_confirmed() => {
                self.notices.warning("Announcement deleted, but reloading failed", err);
                true
            }
            Err(err) => {
                self.note_failure("delete announcement", err);
                err.kind() == ErrorKind::NotFound
            }
        };

        if gone && matches!(&self.mode, PanelMode::EditingExisting { target_id } if target_id == id) {
            debug!("Announcement under edit is gone; back to composing");
            self.reset();
        }
        result
    }

    /// Reload this professor's announcements
    pub async fn refresh(&mut self, cancel: &CancellationToken) -> AnnouncementResult<Snapshot> {
        let result = self.store.refresh(&self.scope, cancel).await;
        if let Err(ref err) = result {
            self.note_failure("load announcements", err);
        }
        result
    }

    /// This professor's announcements as currently mirrored
    pub async fn announcements(&self) -> Snapshot {
        self.store.mirror(&self.scope).await
    }

    /// Queue a failure notice; cancelled requests stay silent
    fn note_failure(&mut self, action: &str, err: &AnnouncementError) {
        if err.kind() != ErrorKind::Cancelled {
            self.notices.failure(action, err);
        }
    }

    fn reset(&mut self) {
        self.mode = PanelMode::ComposingNew;
        self.draft = DraftFields::default();
    }
}
