//! HTTP client for the document chat backend.
//!
//! Three single-shot operations: create a session, upload PDFs into it and
//! ask a question about them. No retries; every failure is normalised into
//! [`ApiError`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::chat::SourceRef;
use crate::config::BackendConfig;

pub const PDF_MIME: &str = "application/pdf";
const SESSION_HEADER: &str = "session-id";

/// Opaque identifier of a backend session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        SessionId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// No response was received (offline, DNS, refused, timeout).
    #[error("Network error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("{detail}")]
    Status { status: u16, detail: String },

    /// A success response whose body did not have the expected shape.
    #[error("Unexpected response from server: {0}")]
    Decode(String),

    /// A selected file could not be read from disk.
    #[error("Could not read {0}")]
    Io(String),
}

/// A file queued for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub file_name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub acknowledged: bool,
    pub welcome_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatAnswer {
    #[allow(dead_code)]
    pub query: String,
    pub answer: Option<String>,
    pub sources: Vec<SourceRef>,
}

#[derive(Debug, Deserialize)]
struct SessionInitResponse {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    welcome_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    query: String,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    context: Vec<ContextEntry>,
}

#[derive(Debug, Deserialize)]
struct ContextEntry {
    source: String,
    page: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// The operations the client needs from the backend.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn init_session(&self) -> Result<SessionId, ApiError>;

    async fn upload_files(
        &self,
        session: &SessionId,
        files: &[FilePart],
    ) -> Result<UploadResult, ApiError>;

    async fn send_message(&self, session: &SessionId, text: &str) -> Result<ChatAnswer, ApiError>;
}

pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn with_config(config: &BackendConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(ApiClient {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    #[allow(dead_code)]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Backend for ApiClient {
    async fn init_session(&self) -> Result<SessionId, ApiError> {
        let response = self
            .client
            .post(self.endpoint("/session/init"))
            .send()
            .await
            .map_err(transport_error)?;

        let body: SessionInitResponse = read_json(response).await?;
        Ok(SessionId::new(body.session_id))
    }

    async fn upload_files(
        &self,
        session: &SessionId,
        files: &[FilePart],
    ) -> Result<UploadResult, ApiError> {
        let mut form = reqwest::multipart::Form::new();
        for file in files {
            let bytes = tokio::fs::read(&file.path)
                .await
                .map_err(|e| ApiError::Io(format!("{}: {}", file.file_name, e)))?;
            let part = reqwest::multipart::Part::bytes(bytes)
                .file_name(file.file_name.clone())
                .mime_str(PDF_MIME)
                .map_err(transport_error)?;
            form = form.part("files", part);
        }

        let response = self
            .client
            .post(self.endpoint("/upload"))
            .query(&[("session_id", session.as_str())])
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        let body: UploadResponse = read_json(response).await?;
        Ok(UploadResult {
            acknowledged: true,
            welcome_message: body.welcome_message,
        })
    }

    async fn send_message(&self, session: &SessionId, text: &str) -> Result<ChatAnswer, ApiError> {
        let response = self
            .client
            .get(self.endpoint("/chat"))
            .query(&[("query", text)])
            .header(SESSION_HEADER, session.as_str())
            .send()
            .await
            .map_err(transport_error)?;

        let body: ChatResponse = read_json(response).await?;
        Ok(body.into())
    }
}

impl From<ChatResponse> for ChatAnswer {
    fn from(response: ChatResponse) -> Self {
        ChatAnswer {
            query: response.query,
            answer: response.answer,
            sources: response
                .context
                .into_iter()
                .map(|entry| SourceRef::new(entry.source, entry.page))
                .collect(),
        }
    }
}

fn transport_error(e: reqwest::Error) -> ApiError {
    ApiError::Transport(e.to_string())
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;

    if !status.is_success() {
        let detail = error_detail(status.as_u16(), &body);
        tracing::debug!(status = status.as_u16(), %detail, "backend returned an error");
        return Err(ApiError::Status {
            status: status.as_u16(),
            detail,
        });
    }

    parse_body(&body)
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Human-readable message for a failed response: the backend's `detail`
/// string when present, a generic message otherwise.
fn error_detail(status: u16, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(detail),
        }) if !detail.trim().is_empty() => detail,
        _ => format!("Request failed with status {status}"),
    }
}
