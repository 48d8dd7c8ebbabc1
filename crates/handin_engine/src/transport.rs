use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::TryStreamExt;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tokio_util::io::ReaderStream;
use url::Url;

use crate::types::FileRow;

/// Connection parameters for the LMS REST endpoint.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub base_url: String,
    pub access_token: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl TransportSettings {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: access_token.into(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Byte-level progress callback for a single transfer.
pub trait ProgressSink: Send + Sync {
    fn report(&self, sent: u64, total: u64);
}

/// Remote file record returned once an upload is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub display_name: Option<String>,
    pub size: Option<u64>,
}

/// Returned when requesting an upload slot for a file submission.
#[derive(Debug, Clone, Deserialize)]
pub struct FileUploadSlot {
    pub upload_url: String,
    #[serde(default)]
    pub upload_params: HashMap<String, String>,
    /// The multipart field name the slot expects the file bytes under.
    pub file_param: Option<String>,
}

/// Identifier pair for an uploaded media recording.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MediaUpload {
    pub media_id: String,
    pub media_type: String,
}

/// The server's view of a submission after a submit call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConfirmedSubmission {
    pub id: Option<i64>,
    pub late: Option<bool>,
    pub attempt: Option<u64>,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("invalid upload request: {0}")]
    InvalidRequest(String),

    #[error("http status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// The remote side of the pipeline. The worker treats these as opaque
/// async calls; everything it needs to know comes back in the result.
#[async_trait::async_trait]
pub trait SubmissionTransport: Send + Sync {
    /// Uploads one local file, reporting byte progress through `sink`.
    async fn upload_file(
        &self,
        course_id: i64,
        assignment_id: i64,
        file: &FileRow,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Attachment, TransportError>;

    /// Uploads a media recording, reporting byte progress through `sink`.
    async fn upload_media(
        &self,
        file: &FileRow,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<MediaUpload, TransportError>;

    async fn submit_text(
        &self,
        course_id: i64,
        assignment_id: i64,
        text: &str,
    ) -> Result<ConfirmedSubmission, TransportError>;

    async fn submit_url(
        &self,
        course_id: i64,
        assignment_id: i64,
        url: &str,
    ) -> Result<ConfirmedSubmission, TransportError>;

    async fn submit_attachments(
        &self,
        course_id: i64,
        assignment_id: i64,
        attachment_ids: &[i64],
    ) -> Result<ConfirmedSubmission, TransportError>;

    async fn submit_media(
        &self,
        course_id: i64,
        assignment_id: i64,
        media_id: &str,
        media_type: &str,
    ) -> Result<ConfirmedSubmission, TransportError>;
}

/// REST implementation over reqwest. File uploads are the two-step
/// slot flow: ask the API for an upload URL plus form params, then
/// stream the bytes there as multipart.
pub struct HttpTransport {
    settings: TransportSettings,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(settings: TransportSettings) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| TransportError::Network(err.to_string()))?;
        Ok(Self { settings, client })
    }

    fn api_url(&self, path: &str) -> Result<Url, TransportError> {
        let joined = format!("{}/{}", self.settings.base_url.trim_end_matches('/'), path);
        Url::parse(&joined).map_err(|err| TransportError::InvalidUrl(err.to_string()))
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<T, TransportError> {
        let url = self.api_url(path)?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.settings.access_token)
            .form(params)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        read_json(response).await
    }

    async fn submit(
        &self,
        course_id: i64,
        assignment_id: i64,
        params: Vec<(String, String)>,
    ) -> Result<ConfirmedSubmission, TransportError> {
        let path = format!("courses/{course_id}/assignments/{assignment_id}/submissions");
        self.post_form(&path, &params).await
    }

    async fn file_part(
        &self,
        file: &FileRow,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Part, TransportError> {
        let handle = tokio::fs::File::open(&file.local_path).await?;
        let total = file.size;
        sink.report(0, total);

        let mut sent: u64 = 0;
        let stream = ReaderStream::new(handle).inspect_ok(move |chunk| {
            sent += chunk.len() as u64;
            sink.report(sent.min(total), total);
        });
        let body = reqwest::Body::wrap_stream(stream);
        Part::stream_with_length(body, total)
            .file_name(file.name.clone())
            .mime_str(&file.content_type)
            .map_err(|err| TransportError::InvalidRequest(err.to_string()))
    }
}

#[async_trait::async_trait]
impl SubmissionTransport for HttpTransport {
    async fn upload_file(
        &self,
        course_id: i64,
        assignment_id: i64,
        file: &FileRow,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Attachment, TransportError> {
        let slot_path =
            format!("courses/{course_id}/assignments/{assignment_id}/submissions/self/files");
        let slot_params = [
            ("name".to_string(), file.name.clone()),
            ("size".to_string(), file.size.to_string()),
            ("content_type".to_string(), file.content_type.clone()),
        ];
        let slot: FileUploadSlot = self.post_form(&slot_path, &slot_params).await?;

        let upload_url = Url::parse(&slot.upload_url)
            .map_err(|err| TransportError::InvalidUrl(err.to_string()))?;
        let mut form = Form::new();
        for (key, value) in &slot.upload_params {
            form = form.text(key.clone(), value.clone());
        }
        let field = slot.file_param.clone().unwrap_or_else(|| "file".to_string());
        form = form.part(field, self.file_part(file, sink).await?);

        // The slot URL is pre-authorized; no bearer token here.
        let response = self
            .client
            .post(upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        read_json(response).await
    }

    async fn upload_media(
        &self,
        file: &FileRow,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<MediaUpload, TransportError> {
        let url = self.api_url("media_upload")?;
        let form = Form::new().part("file", self.file_part(file, sink).await?);
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.settings.access_token)
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        read_json(response).await
    }

    async fn submit_text(
        &self,
        course_id: i64,
        assignment_id: i64,
        text: &str,
    ) -> Result<ConfirmedSubmission, TransportError> {
        let params = vec![
            (
                "submission[submission_type]".to_string(),
                "online_text_entry".to_string(),
            ),
            ("submission[body]".to_string(), text.to_string()),
        ];
        self.submit(course_id, assignment_id, params).await
    }

    async fn submit_url(
        &self,
        course_id: i64,
        assignment_id: i64,
        url: &str,
    ) -> Result<ConfirmedSubmission, TransportError> {
        let params = vec![
            (
                "submission[submission_type]".to_string(),
                "online_url".to_string(),
            ),
            ("submission[url]".to_string(), url.to_string()),
        ];
        self.submit(course_id, assignment_id, params).await
    }

    async fn submit_attachments(
        &self,
        course_id: i64,
        assignment_id: i64,
        attachment_ids: &[i64],
    ) -> Result<ConfirmedSubmission, TransportError> {
        let mut params = vec![(
            "submission[submission_type]".to_string(),
            "online_upload".to_string(),
        )];
        for id in attachment_ids {
            params.push(("submission[file_ids][]".to_string(), id.to_string()));
        }
        self.submit(course_id, assignment_id, params).await
    }

    async fn submit_media(
        &self,
        course_id: i64,
        assignment_id: i64,
        media_id: &str,
        media_type: &str,
    ) -> Result<ConfirmedSubmission, TransportError> {
        let params = vec![
            (
                "submission[submission_type]".to_string(),
                "media_recording".to_string(),
            ),
            (
                "submission[media_comment_id]".to_string(),
                media_id.to_string(),
            ),
            (
                "submission[media_comment_type]".to_string(),
                media_type.to_string(),
            ),
        ];
        self.submit(course_id, assignment_id, params).await
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, TransportError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(TransportError::HttpStatus {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&bytes).map_err(|err| TransportError::MalformedResponse(err.to_string()))
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout(err.to_string());
    }
    TransportError::Network(err.to_string())
}
