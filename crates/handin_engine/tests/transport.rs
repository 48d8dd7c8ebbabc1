use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use handin_engine::{
    FileRow, HttpTransport, ProgressSink, SubmissionTransport, TransportError, TransportSettings,
};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingSink {
    reports: Mutex<Vec<(u64, u64)>>,
}

impl RecordingSink {
    fn reports(&self) -> Vec<(u64, u64)> {
        self.reports.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn report(&self, sent: u64, total: u64) {
        self.reports.lock().unwrap().push((sent, total));
    }
}

fn transport(server: &MockServer) -> HttpTransport {
    HttpTransport::new(TransportSettings::new(server.uri(), "token-1")).unwrap()
}

fn staged_row(temp: &TempDir, name: &str, bytes: &[u8]) -> FileRow {
    let local = temp.path().join(name);
    fs::write(&local, bytes).unwrap();
    FileRow {
        id: 1,
        submission_id: 1,
        name: name.to_string(),
        size: bytes.len() as u64,
        content_type: "application/pdf".to_string(),
        local_path: local.to_string_lossy().into_owned(),
        attachment_id: None,
        failed: false,
        error: None,
    }
}

#[tokio::test]
async fn submit_text_posts_the_form_and_decodes_the_confirmation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/courses/7/assignments/42/submissions"))
        .and(header("authorization", "Bearer token-1"))
        .and(body_string_contains("online_text_entry"))
        .and(body_string_contains("An+essay+body"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": 9,
            "late": false,
            "attempt": 2,
        })))
        .mount(&server)
        .await;

    let confirmed = transport(&server)
        .submit_text(7, 42, "An essay body")
        .await
        .unwrap();

    assert_eq!(confirmed.id, Some(9));
    assert_eq!(confirmed.late, Some(false));
    assert_eq!(confirmed.attempt, Some(2));
}

#[tokio::test]
async fn submit_attachments_lists_every_file_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/courses/7/assignments/42/submissions"))
        .and(body_string_contains("online_upload"))
        .and(body_string_contains("file_ids"))
        .and(body_string_contains("100"))
        .and(body_string_contains("101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": 9 })))
        .mount(&server)
        .await;

    let confirmed = transport(&server)
        .submit_attachments(7, 42, &[100, 101])
        .await
        .unwrap();

    assert_eq!(confirmed.id, Some(9));
    assert_eq!(confirmed.late, None);
}

#[tokio::test]
async fn upload_file_requests_a_slot_then_streams_without_the_token() {
    let temp = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/courses/7/assignments/42/submissions/self/files"))
        .and(header("authorization", "Bearer token-1"))
        .and(body_string_contains("name=report.pdf"))
        .and(body_string_contains("size=16"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "upload_url": format!("{}/slot-target", server.uri()),
            "upload_params": { "key": "v1" },
            "file_param": "upload",
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/slot-target"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": 33,
            "display_name": "report.pdf",
            "size": 16,
        })))
        .mount(&server)
        .await;

    let row = staged_row(&temp, "report.pdf", b"0123456789abcdef");
    let sink = Arc::new(RecordingSink::default());
    let attachment = transport(&server)
        .upload_file(7, 42, &row, sink.clone())
        .await
        .unwrap();

    assert_eq!(attachment.id, 33);
    let reports = sink.reports();
    assert_eq!(reports.first(), Some(&(0, 16)));
    assert_eq!(reports.last(), Some(&(16, 16)));

    // The multipart POST goes to the pre-authorized slot URL bare.
    let requests = server.received_requests().await.unwrap();
    let slot_post = requests
        .iter()
        .find(|request| request.url.path() == "/slot-target")
        .unwrap();
    assert!(slot_post.headers.get("authorization").is_none());
    let body = String::from_utf8_lossy(&slot_post.body);
    assert!(body.contains("name=\"upload\""));
    assert!(body.contains("filename=\"report.pdf\""));
    assert!(body.contains("0123456789abcdef"));
    assert!(body.contains("v1"));
}

#[tokio::test]
async fn slot_without_file_param_defaults_to_file() {
    let temp = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/courses/7/assignments/42/submissions/self/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "upload_url": format!("{}/slot-target", server.uri()),
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/slot-target"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": 34 })))
        .mount(&server)
        .await;

    let row = staged_row(&temp, "report.pdf", b"abc");
    let sink = Arc::new(RecordingSink::default());
    let attachment = transport(&server)
        .upload_file(7, 42, &row, sink)
        .await
        .unwrap();

    assert_eq!(attachment.id, 34);
    let requests = server.received_requests().await.unwrap();
    let slot_post = requests
        .iter()
        .find(|request| request.url.path() == "/slot-target")
        .unwrap();
    let body = String::from_utf8_lossy(&slot_post.body);
    assert!(body.contains("name=\"file\""));
}

#[tokio::test]
async fn upload_media_posts_multipart_with_the_token() {
    let temp = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/media_upload"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "media_id": "m-77",
            "media_type": "video",
        })))
        .mount(&server)
        .await;

    let row = staged_row(&temp, "clip.mp4", b"not really video");
    let sink = Arc::new(RecordingSink::default());
    let media = transport(&server).upload_media(&row, sink.clone()).await.unwrap();

    assert_eq!(media.media_id, "m-77");
    assert_eq!(media.media_type, "video");
    assert_eq!(sink.reports().last(), Some(&(16, 16)));
}

#[tokio::test]
async fn http_errors_surface_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/courses/7/assignments/42/submissions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = transport(&server)
        .submit_text(7, 42, "An essay body")
        .await
        .unwrap_err();

    match err {
        TransportError::HttpStatus { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn garbage_json_is_a_malformed_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/courses/7/assignments/42/submissions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = transport(&server)
        .submit_text(7, 42, "An essay body")
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::MalformedResponse(_)));
}

#[tokio::test]
async fn slow_responses_time_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/courses/7/assignments/42/submissions"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let mut settings = TransportSettings::new(server.uri(), "token-1");
    settings.request_timeout = Duration::from_millis(200);
    let transport = HttpTransport::new(settings).unwrap();

    let err = transport.submit_text(7, 42, "An essay body").await.unwrap_err();
    assert!(matches!(err, TransportError::Timeout(_)));
}
