use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use bucketsync_shared::{ListSnapshot, MoveRequest, NewTask, TaskId, TaskPatch};
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::error::{Endpoint, SyncError, SyncResult};

/// The server operations the engine depends on. Every mutating call answers
/// with the full authoritative snapshot.
#[async_trait]
pub trait SyncApi: Send + Sync {
    async fn fetch_all(&self) -> SyncResult<ListSnapshot>;

    /// Creates a task. The server answers with a redirect rather than a
    /// snapshot, so implementations refetch afterwards.
    async fn add(&self, task: &NewTask) -> SyncResult<ListSnapshot>;

    async fn move_task(&self, request: &MoveRequest) -> SyncResult<ListSnapshot>;

    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> SyncResult<ListSnapshot>;

    async fn split(&self, id: &TaskId) -> SyncResult<ListSnapshot>;

    /// Plain navigation endpoint; the body is ignored.
    async fn mark_done(&self, id: &TaskId) -> SyncResult<()>;

    /// Plain navigation endpoint; the body is ignored.
    async fn delete(&self, id: &TaskId) -> SyncResult<()>;

    /// Pin a task at `index` in Main.
    async fn lock_at(&self, id: &TaskId, index: usize) -> SyncResult<ListSnapshot> {
        self.move_task(&MoveRequest::into_main(id.clone(), index, true))
            .await
    }
}

enum Payload<'a> {
    Json(Vec<u8>),
    Form(&'a NewTask),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    reason: Option<String>,
}

pub struct HttpSyncClient {
    http: reqwest::Client,
    base: Url,
}

impl HttpSyncClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base = Url::parse(base_url.trim())
            .with_context(|| format!("invalid server URL: {base_url}"))?;
        if base.cannot_be_a_base() {
            return Err(anyhow!("server URL cannot carry paths: {base_url}"));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed building HTTP client for task server")?;

        Ok(Self { http, base })
    }

    fn url(&self, segments: &[&str]) -> SyncResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| SyncError::Decode {
                path: self.base.to_string(),
                message: "server URL cannot carry paths".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        endpoint: Endpoint,
        method: Method,
        segments: &[&str],
        body: Option<Payload<'_>>,
    ) -> SyncResult<(StatusCode, String)> {
        let url = self.url(segments)?;
        let path = url.path().to_string();

        let request = self.http.request(method, url);
        let request = match body {
            Some(Payload::Json(bytes)) => request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(bytes),
            Some(Payload::Form(fields)) => request.form(fields),
            None => request,
        };

        let response = request.send().await.map_err(|err| {
            warn!(%endpoint, path = %path, error = %err, "request failed");
            SyncError::transport(&path, err)
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| SyncError::transport(&path, err))?;

        debug!(%endpoint, path = %path, status = status.as_u16(), bytes = text.len(), "response received");
        Ok((status, text))
    }

    async fn snapshot_call(
        &self,
        endpoint: Endpoint,
        method: Method,
        segments: &[&str],
        body: Option<Payload<'_>>,
    ) -> SyncResult<ListSnapshot> {
        let path = format!("/{}", segments.join("/"));
        let (status, text) = self.send(endpoint, method, segments, body).await?;
        classify(endpoint, &path, status, &text)
    }
}

/// Map a raw response onto the snapshot contract.
pub(crate) fn classify(
    endpoint: Endpoint,
    path: &str,
    status: StatusCode,
    body: &str,
) -> SyncResult<ListSnapshot> {
    if status == StatusCode::NOT_FOUND && endpoint.is_optional() {
        return Err(SyncError::Unavailable { endpoint });
    }

    if !status.is_success() {
        let reason = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.reason);
        return Err(SyncError::Status {
            path: path.to_string(),
            status: status.as_u16(),
            reason,
        });
    }

    serde_json::from_str(body).map_err(|err| SyncError::Decode {
        path: path.to_string(),
        message: err.to_string(),
    })
}

fn encode<T: serde::Serialize>(path: &str, value: &T) -> SyncResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|err| SyncError::Decode {
        path: path.to_string(),
        message: format!("failed encoding request: {err}"),
    })
}

#[async_trait]
impl SyncApi for HttpSyncClient {
    #[instrument(skip(self))]
    async fn fetch_all(&self) -> SyncResult<ListSnapshot> {
        self.snapshot_call(Endpoint::FetchAll, Method::GET, &["api", "tasks"], None)
            .await
    }

    #[instrument(skip(self, task), fields(title = %task.title, category = %task.category))]
    async fn add(&self, task: &NewTask) -> SyncResult<ListSnapshot> {
        let segments = ["add"];
        let (status, _) = self
            .send(Endpoint::Add, Method::POST, &segments, Some(Payload::Form(task)))
            .await?;
        ensure_success(&segments, status)?;
        self.fetch_all().await
    }

    #[instrument(skip(self), fields(task = %request.task_id, index = request.new_index, locked = request.locked))]
    async fn move_task(&self, request: &MoveRequest) -> SyncResult<ListSnapshot> {
        let body = encode("/move", request)?;
        self.snapshot_call(Endpoint::Move, Method::POST, &["move"], Some(Payload::Json(body)))
            .await
    }

    #[instrument(skip(self, patch), fields(task = %id))]
    async fn update(&self, id: &TaskId, patch: &TaskPatch) -> SyncResult<ListSnapshot> {
        let body = encode("/update", patch)?;
        self.snapshot_call(
            Endpoint::Update,
            Method::POST,
            &["update", id.as_str()],
            Some(Payload::Json(body)),
        )
        .await
    }

    #[instrument(skip(self), fields(task = %id))]
    async fn split(&self, id: &TaskId) -> SyncResult<ListSnapshot> {
        self.snapshot_call(Endpoint::Split, Method::POST, &["split", id.as_str()], None)
            .await
    }

    #[instrument(skip(self), fields(task = %id))]
    async fn mark_done(&self, id: &TaskId) -> SyncResult<()> {
        navigate(self, Endpoint::Done, &["done", id.as_str()]).await
    }

    #[instrument(skip(self), fields(task = %id))]
    async fn delete(&self, id: &TaskId) -> SyncResult<()> {
        navigate(self, Endpoint::Delete, &["delete", id.as_str()]).await
    }
}

async fn navigate(client: &HttpSyncClient, endpoint: Endpoint, segments: &[&str]) -> SyncResult<()> {
    let (status, _) = client.send(endpoint, Method::GET, segments, None).await?;
    ensure_success(segments, status)
}

/// Redirects are followed by the client, so only the final status counts.
fn ensure_success(segments: &[&str], status: StatusCode) -> SyncResult<()> {
    if status.is_success() {
        return Ok(());
    }
    Err(SyncError::Status {
        path: format!("/{}", segments.join("/")),
        status: status.as_u16(),
        reason: None,
    })
}
