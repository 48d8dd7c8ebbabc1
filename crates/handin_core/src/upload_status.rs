//! State machine for the upload status screen, the live view onto one
//! persisted submission and its files.

use crate::files::{FileId, StatusFile, SubmissionId};

/// Snapshot of the status screen. `uploaded_bytes` is the cumulative
/// byte count derived from progress events; it survives file-list
/// refreshes and is only recomputed by the next progress event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub submission_id: SubmissionId,
    pub assignment_name: Option<String>,
    pub files: Vec<StatusFile>,
    pub is_failed: bool,
    pub is_loading: bool,
    pub uploaded_bytes: Option<u64>,
}

impl Model {
    pub fn new(submission_id: SubmissionId) -> Self {
        Self {
            submission_id,
            assignment_name: None,
            files: Vec::new(),
            is_failed: false,
            is_loading: false,
            uploaded_bytes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Lifecycle re-entry: the screen became visible again.
    RequestLoad,
    /// Full resync from the persisted store.
    PersistedSubmissionLoaded {
        assignment_name: Option<String>,
        failed: bool,
        files: Vec<StatusFile>,
    },
    /// Steady-state refresh pushed by the store change feed.
    FilesRefreshed {
        failed: bool,
        submission_id: SubmissionId,
        files: Vec<StatusFile>,
    },
    /// Byte-level progress for the file at `file_index`.
    UploadProgressChanged {
        file_index: usize,
        submission_id: SubmissionId,
        fraction: f64,
    },
    /// User asked to cancel; needs confirmation first.
    CancelRequested,
    /// User confirmed cancellation.
    CancelClicked,
    /// User pressed the retry affordance.
    RetryClicked,
    /// User removed the file at this position.
    DeleteFileClicked { index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    LoadPersistedFiles { submission_id: SubmissionId },
    DeleteSubmission { submission_id: SubmissionId },
    DeleteFileFromSubmission { file_id: FileId },
    RetrySubmission { submission_id: SubmissionId },
    ShowCancelDialog,
}

/// Prepares a freshly attached screen: always starts loading.
pub fn init(mut model: Model) -> (Model, Vec<Effect>) {
    model.is_loading = true;
    let effects = vec![Effect::LoadPersistedFiles {
        submission_id: model.submission_id,
    }];
    (model, effects)
}

/// Pure update function: applies an event to the model and returns any effects.
pub fn update(mut model: Model, event: Event) -> (Model, Vec<Effect>) {
    let effects = match event {
        Event::RequestLoad => {
            vec![Effect::LoadPersistedFiles {
                submission_id: model.submission_id,
            }]
        }
        Event::PersistedSubmissionLoaded {
            assignment_name,
            failed,
            files,
        } => {
            // Wholesale replacement, not a merge; stale entries cannot
            // linger after a resync.
            model.assignment_name = assignment_name;
            model.is_failed = failed;
            model.files = files;
            model.is_loading = false;
            Vec::new()
        }
        Event::FilesRefreshed {
            failed,
            submission_id,
            files,
        } => {
            if submission_id != model.submission_id {
                return (model, Vec::new());
            }
            model.is_failed = failed;
            model.files = files;
            Vec::new()
        }
        Event::UploadProgressChanged {
            file_index,
            submission_id,
            fraction,
        } => {
            if submission_id != model.submission_id {
                return (model, Vec::new());
            }
            model.uploaded_bytes = Some(cumulative_bytes(&model.files, file_index, fraction));
            Vec::new()
        }
        Event::CancelRequested => vec![Effect::ShowCancelDialog],
        Event::CancelClicked => {
            vec![Effect::DeleteSubmission {
                submission_id: model.submission_id,
            }]
        }
        Event::RetryClicked => {
            vec![Effect::RetrySubmission {
                submission_id: model.submission_id,
            }]
        }
        Event::DeleteFileClicked { index } => {
            if index >= model.files.len() {
                return (model, Vec::new());
            }
            if model.files.len() == 1 {
                // Removing the last file cancels the whole submission;
                // the model stays as is and the next refresh reflects
                // the deletion.
                vec![Effect::DeleteSubmission {
                    submission_id: model.submission_id,
                }]
            } else {
                let removed = model.files.remove(index);
                vec![Effect::DeleteFileFromSubmission {
                    file_id: removed.id,
                }]
            }
        }
    };
    (model, effects)
}

/// Bytes of every file before `file_index` (assumed fully sent) plus
/// the in-flight fraction of the current one, floored.
fn cumulative_bytes(files: &[StatusFile], file_index: usize, fraction: f64) -> u64 {
    let prefix: u64 = files.iter().take(file_index).map(|f| f.size).sum();
    let current = files
        .get(file_index)
        .map_or(0.0, |f| f.size as f64 * fraction);
    (prefix as f64 + current).floor() as u64
}
