use std::fmt;

pub type SubmissionId = i64;
pub type FileId = i64;

/// What a persisted submission carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    Text,
    Url,
    FileUpload,
    MediaRecording,
}

impl SubmissionKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            SubmissionKind::Text => "text",
            SubmissionKind::Url => "url",
            SubmissionKind::FileUpload => "file_upload",
            SubmissionKind::MediaRecording => "media_recording",
        }
    }

    pub(crate) fn parse(raw: &str) -> Option<Self> {
        match raw {
            "text" => Some(SubmissionKind::Text),
            "url" => Some(SubmissionKind::Url),
            "file_upload" => Some(SubmissionKind::FileUpload),
            "media_recording" => Some(SubmissionKind::MediaRecording),
            _ => None,
        }
    }
}

impl fmt::Display for SubmissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted submission attempt. `current_file` and `progress`
/// describe the in-flight transfer: the global index of the file being
/// sent (confirmed files included) and the fraction of it already on
/// the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRow {
    pub id: SubmissionId,
    pub assignment_id: i64,
    pub course_id: i64,
    pub assignment_name: String,
    pub kind: SubmissionKind,
    pub entry: Option<String>,
    pub failed: bool,
    pub is_draft: bool,
    pub current_file: u32,
    pub file_count: u32,
    pub progress: Option<f64>,
}

/// One persisted file belonging to a submission. `attachment_id` is
/// set once the remote end has confirmed the upload; its presence is
/// what lets a retry skip files already sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRow {
    pub id: FileId,
    pub submission_id: SubmissionId,
    pub name: String,
    pub size: u64,
    pub content_type: String,
    pub local_path: String,
    pub attachment_id: Option<i64>,
    pub failed: bool,
    pub error: Option<String>,
}

/// Insert payload for a submission row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubmission {
    pub assignment_id: i64,
    pub course_id: i64,
    pub assignment_name: String,
    pub kind: SubmissionKind,
    pub entry: Option<String>,
    pub is_draft: bool,
}

/// Insert payload for a file row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile {
    pub name: String,
    pub size: u64,
    pub content_type: String,
    pub local_path: String,
}

/// Terminal result of processing one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    Completed,
    Failed,
    Canceled,
}

impl fmt::Display for WorkOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkOutcome::Completed => write!(f, "completed"),
            WorkOutcome::Failed => write!(f, "failed"),
            WorkOutcome::Canceled => write!(f, "canceled"),
        }
    }
}

/// What changed for a watched submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    Submission,
    Files,
}
