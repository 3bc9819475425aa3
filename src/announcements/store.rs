//! Client-side mirror of the announcement service
//!
//! The store is the only component that talks to the [`AnnouncementApi`].
//! It keeps one mirror per [`Scope`], replaces a mirror wholesale on every
//! refresh and re-fetches after each confirmed mutation instead of patching
//! locally. Consumers hold cheap clones and observe changes through
//! [`AnnouncementStore::subscribe`].

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::announcements::api::{AnnouncementApi, AnnouncementList};
use crate::announcements::attendance::AttendanceRecord;
use crate::announcements::error::{AnnouncementError, AnnouncementResult, ErrorKind};
use crate::announcements::types::{
    Announcement, AnnouncementDraft, AnnouncementPatch, CourseInfo, Scope,
};

/// Immutable view of one scope's announcements
pub type Snapshot = Arc<Vec<Announcement>>;

/// Change notifications published by the store
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// A scope's mirror was replaced by a fresh server listing
    MirrorReplaced { scope: Scope, count: usize },
    /// A create, update or delete did not go through
    MutationFailed {
        scope: Scope,
        kind: ErrorKind,
        message: String,
    },
    /// A change went through but the mirror could not be reloaded
    ReloadFailed { scope: Scope, message: String },
}

#[derive(Debug, Clone)]
struct ScopeMirror {
    announcements: Snapshot,
    course: Option<CourseInfo>,
    generation: u64,
    refreshed_at: DateTime<Utc>,
}

struct StoreInner {
    api: Arc<dyn AnnouncementApi>,
    mirrors: RwLock<HashMap<Scope, ScopeMirror>>,
    in_flight: Mutex<HashSet<Scope>>,
    generation: AtomicU64,
    events: broadcast::Sender<StoreEvent>,
}

/// Releases a scope's mutation slot when dropped
struct MutationSlot<'a> {
    inner: &'a StoreInner,
    scope: Scope,
}

impl Drop for MutationSlot<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.inner.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.remove(&self.scope);
    }
}

/// Shared announcement store
#[derive(Clone)]
pub struct AnnouncementStore {
    inner: Arc<StoreInner>,
}

impl AnnouncementStore {
    /// Create a store backed by `api`
    pub fn new(api: Arc<dyn AnnouncementApi>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(StoreInner {
                api,
                mirrors: RwLock::new(HashMap::new()),
                in_flight: Mutex::new(HashSet::new()),
                generation: AtomicU64::new(0),
                events,
            }),
        }
    }

    /// Subscribe to mirror and failure events
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.events.subscribe()
    }

    /// Current mirror for `scope`; empty until the first refresh
    pub async fn mirror(&self, scope: &Scope) -> Snapshot {
        self.inner
            .mirrors
            .read()
            .await
            .get(scope)
            .map(|m| m.announcements.clone())
            .unwrap_or_default()
    }

    /// Course details last reported for `scope`
    pub async fn course_info(&self, scope: &Scope) -> Option<CourseInfo> {
        self.inner
            .mirrors
            .read()
            .await
            .get(scope)
            .and_then(|m| m.course.clone())
    }

    /// When `scope` was last replaced from the server
    pub async fn last_refreshed(&self, scope: &Scope) -> Option<DateTime<Utc>> {
        self.inner
            .mirrors
            .read()
            .await
            .get(scope)
            .map(|m| m.refreshed_at)
    }

    /// Whether a create, update or delete is pending for `scope`
    pub fn is_busy(&self, scope: &Scope) -> bool {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(scope)
    }

    /// Fetch the full list for `scope` and replace its mirror
    pub async fn refresh(&self, scope: &Scope, cancel: &CancellationToken) -> AnnouncementResult<Snapshot> {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Refreshing {} (generation {})", scope, generation);

        let list = cancellable(cancel, self.inner.api.list(scope)).await?;
        self.apply_listing(scope, list, generation, cancel).await
    }

    /// Publish a new announcement, then re-fetch `scope`
    pub async fn create(
        &self,
        scope: &Scope,
        draft: &AnnouncementDraft,
        cancel: &CancellationToken,
    ) -> AnnouncementResult<Announcement> {
        let result = self.create_inner(scope, draft, cancel).await;
        self.report(scope, result)
    }

    /// Replace title and body of announcement `id`, then re-fetch `scope`
    pub async fn update(
        &self,
        scope: &Scope,
        id: &str,
        patch: &AnnouncementPatch,
        cancel: &CancellationToken,
    ) -> AnnouncementResult<()> {
        let result = self.update_inner(scope, id, patch, cancel).await;
        self.report(scope, result)
    }

    /// Remove announcement `id`, then re-fetch `scope`
    pub async fn delete(&self, scope: &Scope, id: &str, cancel: &CancellationToken) -> AnnouncementResult<()> {
        let result = self.delete_inner(scope, id, cancel).await;
        self.report(scope, result)
    }

    /// Fetch attendance for the signed-in student
    pub async fn attendance(
        &self,
        student_name: &str,
        cancel: &CancellationToken,
    ) -> AnnouncementResult<AttendanceRecord> {
        let figures = cancellable(cancel, self.inner.api.attendance()).await?;
        figures.into_record(student_name)
    }

    async fn create_inner(
        &self,
        scope: &Scope,
        draft: &AnnouncementDraft,
        cancel: &CancellationToken,
    ) -> AnnouncementResult<Announcement> {
        draft.validate()?;
        if let Scope::Professor(email) = scope {
            if !email.eq_ignore_ascii_case(draft.author_email.trim()) {
                return Err(AnnouncementError::validation(
                    "author email",
                    format!("does not match {}", scope),
                ));
            }
        }

        let _slot = self.claim(scope)?;
        let created = cancellable(cancel, self.inner.api.create(draft)).await?;
        info!("Created announcement in {} (id {:?})", scope, created.id);

        let mirror = self.reload_after_change(scope, cancel).await?;
        let found = match created.id {
            Some(ref id) => mirror.iter().find(|a| &a.id == id),
            None => mirror.iter().rev().find(|a| {
                a.title == draft.title && a.body == draft.body && a.author_email == draft.author_email
            }),
        };

        found.cloned().ok_or_else(|| {
            AnnouncementError::reload_failed(
                scope.clone(),
                AnnouncementError::invalid_response("created announcement missing from listing"),
            )
        })
    }

    async fn update_inner(
        &self,
        scope: &Scope,
        id: &str,
        patch: &AnnouncementPatch,
        cancel: &CancellationToken,
    ) -> AnnouncementResult<()> {
        patch.validate()?;

        let _slot = self.claim(scope)?;
        cancellable(cancel, self.inner.api.update(id, patch)).await?;
        info!("Updated announcement {} in {}", id, scope);

        self.reload_after_change(scope, cancel).await?;
        Ok(())
    }

    async fn delete_inner(&self, scope: &Scope, id: &str, cancel: &CancellationToken) -> AnnouncementResult<()> {
        let _slot = self.claim(scope)?;
        cancellable(cancel, self.inner.api.delete(id)).await?;
        info!("Deleted announcement {} from {}", id, scope);

        self.reload_after_change(scope, cancel).await?;
        Ok(())
    }

    /// Refresh following a confirmed mutation, marking failures as such
    async fn reload_after_change(
        &self,
        scope: &Scope,
        cancel: &CancellationToken,
    ) -> AnnouncementResult<Snapshot> {
        self.refresh(scope, cancel).await.map_err(|err| match err {
            AnnouncementError::Cancelled => err,
            other => AnnouncementError::reload_failed(scope.clone(), other),
        })
    }

    /// Take the single mutation slot for `scope`
    fn claim(&self, scope: &Scope) -> AnnouncementResult<MutationSlot<'_>> {
        let mut in_flight = self.inner.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !in_flight.insert(scope.clone()) {
            warn!("Rejecting overlapping change for {}", scope);
            return Err(AnnouncementError::Busy { scope: scope.clone() });
        }
        Ok(MutationSlot {
            inner: &self.inner,
            scope: scope.clone(),
        })
    }

    async fn apply_listing(
        &self,
        scope: &Scope,
        list: AnnouncementList,
        generation: u64,
        cancel: &CancellationToken,
    ) -> AnnouncementResult<Snapshot> {
        // The caller may have gone away while the response was in transit.
        if cancel.is_cancelled() {
            debug!("Dropping listing for {}: request cancelled", scope);
            return Err(AnnouncementError::Cancelled);
        }

        let mut mirrors = self.inner.mirrors.write().await;
        if let Some(current) = mirrors.get(scope) {
            if current.generation > generation {
                debug!(
                    "Dropping stale listing for {} (generation {} < {})",
                    scope, generation, current.generation
                );
                return Ok(current.announcements.clone());
            }
        }

        let announcements: Snapshot = Arc::new(list.announcements);
        let count = announcements.len();
        mirrors.insert(
            scope.clone(),
            ScopeMirror {
                announcements: announcements.clone(),
                course: list.course,
                generation,
                refreshed_at: Utc::now(),
            },
        );
        drop(mirrors);

        info!("Mirror for {} replaced with {} announcements", scope, count);
        let _ = self.inner.events.send(StoreEvent::MirrorReplaced {
            scope: scope.clone(),
            count,
        });
        Ok(announcements)
    }

    fn report<T>(&self, scope: &Scope, result: AnnouncementResult<T>) -> AnnouncementResult<T> {
        if let Err(ref err) = result {
            if !matches!(err, AnnouncementError::Cancelled) {
                let event = if err.change_confirmed() {
                    warn!("{}", err);
                    StoreEvent::ReloadFailed {
                        scope: scope.clone(),
                        message: err.to_string(),
                    }
                } else {
                    warn!("Change to {} failed: {}", scope, err);
                    StoreEvent::MutationFailed {
                        scope: scope.clone(),
                        kind: err.kind(),
                        message: err.to_string(),
                    }
                };
                let _ = self.inner.events.send(event);
            }
        }
        result
    }
}

/// Race `operation` against `cancel`; a cancelled request never yields a value
async fn cancellable<T, F>(cancel: &CancellationToken, operation: F) -> AnnouncementResult<T>
where
    F: Future<Output = AnnouncementResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AnnouncementError::Cancelled),
        result = operation => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockAnnouncementApi;

    fn store_with(mock: &MockAnnouncementApi) -> AnnouncementStore {
        AnnouncementStore::new(Arc::new(mock.clone()))
    }

    #[tokio::test]
    async fn test_mirror_empty_before_refresh() {
        let mock = MockAnnouncementApi::new();
        let store = store_with(&mock);
        assert!(store.mirror(&Scope::Student).await.is_empty());
        assert!(store.last_refreshed(&Scope::Student).await.is_none());
        assert_eq!(mock.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_scopes_are_kept_apart() {
        let mock = MockAnnouncementApi::new();
        mock.seed("Aula", "Sem aula", "claudio@fucapi.br").await;
        mock.seed("Lab", "Laboratório", "ana@fucapi.br").await;
        let store = store_with(&mock);
        let cancel = CancellationToken::new();

        let claudio = Scope::Professor("claudio@fucapi.br".to_string());
        store.refresh(&claudio, &cancel).await.unwrap();
        store.refresh(&Scope::Student, &cancel).await.unwrap();

        assert_eq!(store.mirror(&claudio).await.len(), 1);
        assert_eq!(store.mirror(&Scope::Student).await.len(), 2);
    }

    #[tokio::test]
    async fn test_stale_listing_is_dropped() {
        let mock = MockAnnouncementApi::new();
        let store = store_with(&mock);
        let cancel = CancellationToken::new();

        store
            .apply_listing(&Scope::Student, AnnouncementList::default(), 5, &cancel)
            .await
            .unwrap();

        let mut older = AnnouncementList::default();
        older.announcements.push(mock.seed("Velho", "antigo", "a@b.c").await);
        let kept = store
            .apply_listing(&Scope::Student, older, 3, &cancel)
            .await
            .unwrap();

        assert!(kept.is_empty());
        assert!(store.mirror(&Scope::Student).await.is_empty());
    }

    #[tokio::test]
    async fn test_professor_scope_rejects_foreign_author() {
        let mock = MockAnnouncementApi::new();
        let store = store_with(&mock);
        let scope = Scope::Professor("claudio@fucapi.br".to_string());
        let draft = AnnouncementDraft::new("Aula", "Texto", "Ana", "ana@fucapi.br");

        let err = store
            .create(&scope, &draft, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(mock.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_reload_failure_after_delete_is_confirmed() {
        let mock = MockAnnouncementApi::new();
        let seeded = mock.seed("Aula", "Sem aula", "claudio@fucapi.br").await;
        let store = store_with(&mock);
        let mut events = store.subscribe();
        let scope = Scope::Student;

        mock.fail_after(1, AnnouncementError::network("listing unavailable")).await;
        let err = store
            .delete(&scope, &seeded.id, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.change_confirmed());
        assert!(mock.announcements().await.is_empty());
        assert!(matches!(
            events.recv().await.unwrap(),
            StoreEvent::ReloadFailed { .. }
        ));
    }

    #[tokio::test]
    async fn test_slot_released_after_failure() {
        let mock = MockAnnouncementApi::new();
        mock.fail_next(AnnouncementError::network("connection refused")).await;
        let store = store_with(&mock);
        let scope = Scope::Student;

        assert!(store.delete(&scope, "1", &CancellationToken::new()).await.is_err());
        assert!(!store.is_busy(&scope));
    }
}
