//! reqwest-backed client for the announcement service

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

use crate::announcements::api::{AnnouncementApi, AnnouncementList, CreatedAnnouncement};
use crate::announcements::attendance::AttendanceFigures;
use crate::announcements::error::{AnnouncementError, AnnouncementResult};
use crate::announcements::types::{
    Announcement, AnnouncementDraft, AnnouncementPatch, CourseInfo, Scope,
};
use crate::config::ClientConfig;

/// The student listing is either a bare array or wrapped with course details
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Bare(Vec<Announcement>),
    Wrapped {
        comunicados: Vec<Announcement>,
        #[serde(default)]
        turma: Option<CourseInfo>,
    },
}

impl From<ListResponse> for AnnouncementList {
    fn from(response: ListResponse) -> Self {
        match response {
            ListResponse::Bare(announcements) => AnnouncementList {
                announcements,
                course: None,
            },
            ListResponse::Wrapped { comunicados, turma } => AnnouncementList {
                announcements: comunicados,
                course: turma,
            },
        }
    }
}

/// HTTP JSON implementation of [`AnnouncementApi`]
pub struct HttpAnnouncementApi {
    client: Client,
    base_url: Url,
    request_timeout: Duration,
}

impl HttpAnnouncementApi {
    /// Create a client for the service rooted at `base_url`
    pub fn new(base_url: &str, request_timeout: Duration) -> AnnouncementResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AnnouncementError::config(format!("Invalid base URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AnnouncementError::config(format!(
                "Base URL cannot carry a path: {}",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AnnouncementError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            request_timeout,
        })
    }

    /// Create a client from loaded configuration
    pub fn from_config(config: &ClientConfig) -> AnnouncementResult<Self> {
        Self::new(config.require_base_url()?, config.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build an endpoint URL below the base, percent-encoding each segment
    pub fn endpoint(&self, segments: &[&str]) -> AnnouncementResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AnnouncementError::config("Base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn list_url(&self, scope: &Scope) -> AnnouncementResult<Url> {
        match scope {
            Scope::Student => self.endpoint(&["comunicados", "aluno"]),
            Scope::Professor(email) => self.endpoint(&["comunicados", "professor", email]),
        }
    }

    async fn execute(&self, request: RequestBuilder) -> AnnouncementResult<Response> {
        timeout(self.request_timeout, request.send())
            .await
            .map_err(|_| AnnouncementError::timeout(self.request_timeout))?
            .map_err(|e| self.transport_error(e))
    }

    /// Read the whole body under the same timeout as the request
    async fn read_body(&self, response: Response) -> AnnouncementResult<Vec<u8>> {
        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        Ok(bytes.to_vec())
    }

    /// reqwest's own timeout fires at the configured duration too
    fn transport_error(&self, err: reqwest::Error) -> AnnouncementError {
        if err.is_timeout() {
            AnnouncementError::timeout(self.request_timeout)
        } else {
            err.into()
        }
    }
}

/// Turn a non-2xx response into the matching error.
///
/// `target` is the announcement id for update/delete, where 404 means the
/// announcement is gone rather than the endpoint being wrong.
async fn check_status(response: Response, target: Option<&str>) -> AnnouncementResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = server_message(&body);
    let described = match message {
        Some(ref message) => format!("server returned status {}: {}", status, message),
        None => format!("server returned status {}", status),
    };
    warn!("Announcement service responded: {}", described);

    match (status, target) {
        (StatusCode::NOT_FOUND, Some(id)) => Err(AnnouncementError::not_found(id)),
        (StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY, _) => Err(
            AnnouncementError::validation("request", message.unwrap_or(described)),
        ),
        _ => Err(AnnouncementError::network(described)),
    }
}

/// Pull a human readable message out of an error body
fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["erro", "error", "message", "mensagem"]
        .iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

/// Extract the server-assigned id from a create response, if it sent one
fn created_id(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let entity = value.get("comunicado").unwrap_or(&value);
    ["id", "_id"].iter().find_map(|key| match entity.get(key)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[async_trait]
impl AnnouncementApi for HttpAnnouncementApi {
    async fn list(&self, scope: &Scope) -> AnnouncementResult<AnnouncementList> {
        let url = self.list_url(scope)?;
        debug!("GET {}", url);

        let response = self.execute(self.client.get(url)).await?;
        let response = check_status(response, None).await?;
        let bytes = self.read_body(response).await?;
        let parsed: ListResponse = serde_json::from_slice(&bytes)?;
        Ok(parsed.into())
    }

    async fn create(&self, draft: &AnnouncementDraft) -> AnnouncementResult<CreatedAnnouncement> {
        let url = self.endpoint(&["comunicados"])?;
        debug!("POST {}", url);

        let response = self.execute(self.client.post(url).json(draft)).await?;
        let response = check_status(response, None).await?;
        let bytes = self.read_body(response).await?;
        let id = created_id(&bytes);
        if id.is_none() {
            debug!("Create response carried no id; relying on refresh");
        }
        Ok(CreatedAnnouncement { id })
    }

    async fn update(&self, id: &str, patch: &AnnouncementPatch) -> AnnouncementResult<()> {
        let url = self.endpoint(&["comunicados", id])?;
        debug!("PUT {}", url);

        let response = self.execute(self.client.put(url).json(patch)).await?;
        check_status(response, Some(id)).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> AnnouncementResult<()> {
        let url = self.endpoint(&["comunicados", id])?;
        debug!("DELETE {}", url);

        let response = self.execute(self.client.delete(url)).await?;
        check_status(response, Some(id)).await?;
        Ok(())
    }

    async fn attendance(&self) -> AnnouncementResult<AttendanceFigures> {
        let url = self.endpoint(&["faltas"])?;
        debug!("GET {}", url);

        let response = self.execute(self.client.get(url)).await?;
        let response = check_status(response, None).await?;
        let bytes = self.read_body(response).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
