//! In-memory announcement service for tests

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::announcements::api::{AnnouncementApi, AnnouncementList, CreatedAnnouncement};
use crate::announcements::attendance::AttendanceFigures;
use crate::announcements::error::{AnnouncementError, AnnouncementResult};
use crate::announcements::types::{
    Announcement, AnnouncementDraft, AnnouncementPatch, CourseInfo, Scope,
};

/// Record of a call made to the mock service
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    List(Scope),
    Create(AnnouncementDraft),
    Update(String, AnnouncementPatch),
    Delete(String),
    Attendance,
}

#[derive(Debug)]
struct MockServerState {
    announcements: Vec<Announcement>,
    course: Option<CourseInfo>,
    attendance: AttendanceFigures,
    next_id: u64,
    clock: DateTime<Utc>,
    echo_created_id: bool,
    latency: Duration,
    /// One entry per upcoming call; `None` lets that call through
    failures: VecDeque<Option<AnnouncementError>>,
    calls: Vec<MockCall>,
}

impl Default for MockServerState {
    fn default() -> Self {
        Self {
            announcements: Vec::new(),
            course: None,
            attendance: AttendanceFigures {
                absence_percent: 0.0,
                absence_limit_percent: 25.0,
            },
            next_id: 1,
            clock: Utc
                .with_ymd_and_hms(2025, 11, 9, 12, 0, 0)
                .single()
                .unwrap_or_default(),
            echo_created_id: true,
            latency: Duration::ZERO,
            failures: VecDeque::new(),
            calls: Vec::new(),
        }
    }
}

impl MockServerState {
    /// Assign the next id and a timestamp one minute after the previous one
    fn insert(&mut self, title: &str, body: &str, author_name: Option<String>, author_email: &str) -> Announcement {
        let announcement = Announcement {
            id: self.next_id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            published_at: self.clock,
            author_email: author_email.to_string(),
            author_name,
        };
        self.next_id += 1;
        self.clock += ChronoDuration::minutes(1);
        self.announcements.push(announcement.clone());
        announcement
    }
}

/// Linearizable fake of the backend; clones share state
#[derive(Debug, Clone, Default)]
pub struct MockAnnouncementApi {
    state: Arc<RwLock<MockServerState>>,
}

impl MockAnnouncementApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an announcement directly, bypassing call recording
    pub async fn seed(&self, title: &str, body: &str, author_email: &str) -> Announcement {
        self.state.write().await.insert(title, body, None, author_email)
    }

    /// Server-side contents, regardless of scope
    pub async fn announcements(&self) -> Vec<Announcement> {
        self.state.read().await.announcements.clone()
    }

    pub async fn set_course(&self, course: CourseInfo) {
        self.state.write().await.course = Some(course);
    }

    pub async fn set_attendance(&self, absence_percent: f64, absence_limit_percent: f64) {
        self.state.write().await.attendance = AttendanceFigures {
            absence_percent,
            absence_limit_percent,
        };
    }

    /// Whether create responses carry the new id
    pub async fn set_echo_created_id(&self, echo: bool) {
        self.state.write().await.echo_created_id = echo;
    }

    /// Delay applied before every call is served
    pub async fn set_latency(&self, latency: Duration) {
        self.state.write().await.latency = latency;
    }

    /// Make the next call fail with `error`
    pub async fn fail_next(&self, error: AnnouncementError) {
        self.state.write().await.failures.push_back(Some(error));
    }

    /// Let `succeed` calls through, then fail the one after with `error`
    pub async fn fail_after(&self, succeed: usize, error: AnnouncementError) {
        let mut state = self.state.write().await;
        state.failures.extend(std::iter::repeat(None).take(succeed));
        state.failures.push_back(Some(error));
    }

    pub async fn calls(&self) -> Vec<MockCall> {
        self.state.read().await.calls.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.state.read().await.calls.len()
    }

    /// Number of calls that would have changed server state
    pub async fn mutation_count(&self) -> usize {
        self.state
            .read()
            .await
            .calls
            .iter()
            .filter(|c| matches!(c, MockCall::Create(_) | MockCall::Update(..) | MockCall::Delete(_)))
            .count()
    }

    pub async fn clear_calls(&self) {
        self.state.write().await.calls.clear();
    }

    /// Record the call, wait out the latency, then pop any injected failure
    async fn begin(&self, call: MockCall) -> AnnouncementResult<()> {
        let latency = {
            let mut state = self.state.write().await;
            state.calls.push(call);
            state.latency
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match self.state.write().await.failures.pop_front().flatten() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AnnouncementApi for MockAnnouncementApi {
    async fn list(&self, scope: &Scope) -> AnnouncementResult<AnnouncementList> {
        self.begin(MockCall::List(scope.clone())).await?;

        let state = self.state.read().await;
        let (announcements, course) = match scope {
            Scope::Student => (state.announcements.clone(), state.course.clone()),
            Scope::Professor(email) => (
                state
                    .announcements
                    .iter()
                    .filter(|a| &a.author_email == email)
                    .cloned()
                    .collect(),
                None,
            ),
        };
        Ok(AnnouncementList {
            announcements,
            course,
        })
    }

    async fn create(&self, draft: &AnnouncementDraft) -> AnnouncementResult<CreatedAnnouncement> {
        self.begin(MockCall::Create(draft.clone())).await?;

        let mut state = self.state.write().await;
        let author_name = Some(draft.author_name.clone()).filter(|n| !n.is_empty());
        let created = state.insert(&draft.title, &draft.body, author_name, &draft.author_email);
        Ok(CreatedAnnouncement {
            id: state.echo_created_id.then_some(created.id),
        })
    }

    async fn update(&self, id: &str, patch: &AnnouncementPatch) -> AnnouncementResult<()> {
        self.begin(MockCall::Update(id.to_string(), patch.clone())).await?;

        let mut state = self.state.write().await;
        let announcement = state
            .announcements
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AnnouncementError::not_found(id))?;
        announcement.title = patch.title.clone();
        announcement.body = patch.body.clone();
        Ok(())
    }

    async fn delete(&self, id: &str) -> AnnouncementResult<()> {
        self.begin(MockCall::Delete(id.to_string())).await?;

        let mut state = self.state.write().await;
        let before = state.announcements.len();
        state.announcements.retain(|a| a.id != id);
        if state.announcements.len() == before {
            return Err(AnnouncementError::not_found(id));
        }
        Ok(())
    }

    async fn attendance(&self) -> AnnouncementResult<AttendanceFigures> {
        self.begin(MockCall::Attendance).await?;
        Ok(self.state.read().await.attendance.clone())
    }
}
