use std::io;
use std::sync::Arc;

use pipeline_logging::{pipeline_debug, pipeline_info, pipeline_warn};

use crate::store::{StoreError, UploadStore};
use crate::types::{NewFile, NewSubmission, SubmissionId, SubmissionKind, SubmissionRow};
use crate::worker::SubmissionDispatch;

/// Entry point for the screens: persists a submission and hands it to
/// the upload queue. Implemented by [`SubmissionHelper`]; the trait
/// exists so effect handlers can be tested against a recording stub.
pub trait SubmissionStarter: Send + Sync {
    fn start_text_submission(
        &self,
        course_id: i64,
        assignment_id: i64,
        assignment_name: &str,
        text: &str,
    ) -> Result<SubmissionId, StoreError>;

    fn start_url_submission(
        &self,
        course_id: i64,
        assignment_id: i64,
        assignment_name: &str,
        url: &str,
    ) -> Result<SubmissionId, StoreError>;

    /// Returns `None` when `files` is empty; nothing is persisted then.
    fn start_file_submission(
        &self,
        course_id: i64,
        assignment_id: i64,
        assignment_name: &str,
        files: &[NewFile],
    ) -> Result<Option<SubmissionId>, StoreError>;

    fn start_media_submission(
        &self,
        course_id: i64,
        assignment_id: i64,
        assignment_name: &str,
        file: &NewFile,
    ) -> Result<SubmissionId, StoreError>;

    /// Clears the failed flag and re-queues the submission. Files that
    /// already carry an attachment id are not sent again.
    fn retry_submission(&self, id: SubmissionId) -> Result<(), StoreError>;

    fn save_draft(
        &self,
        course_id: i64,
        assignment_id: i64,
        assignment_name: &str,
        text: &str,
    ) -> Result<SubmissionId, StoreError>;

    fn find_draft(&self, assignment_id: i64) -> Result<Option<SubmissionRow>, StoreError>;

    fn delete_temp_file(&self, path: &str);
}

/// Persists submissions and dispatches them to the background worker.
pub struct SubmissionHelper {
    store: Arc<UploadStore>,
    dispatcher: Arc<dyn SubmissionDispatch>,
}

impl SubmissionHelper {
    pub fn new(store: Arc<UploadStore>, dispatcher: Arc<dyn SubmissionDispatch>) -> Self {
        Self { store, dispatcher }
    }

    /// Replaces whatever was queued for the assignment, persists the
    /// new attempt and queues it. Earlier attempts for the same
    /// assignment are deleted along with any temp files only they
    /// referenced.
    fn start(
        &self,
        submission: NewSubmission,
        files: &[NewFile],
    ) -> Result<SubmissionId, StoreError> {
        let keep: Vec<String> = files.iter().map(|file| file.local_path.clone()).collect();
        let orphaned = self
            .store
            .delete_for_assignment(submission.assignment_id, &keep)?;
        for path in &orphaned {
            remove_temp_file(path);
        }

        let id = self.store.insert_submission(&submission, files)?;
        pipeline_info!(
            "queued {} submission {} for assignment {}",
            submission.kind,
            id,
            submission.assignment_id
        );
        self.dispatcher.dispatch(id);
        Ok(id)
    }
}

impl SubmissionStarter for SubmissionHelper {
    fn start_text_submission(
        &self,
        course_id: i64,
        assignment_id: i64,
        assignment_name: &str,
        text: &str,
    ) -> Result<SubmissionId, StoreError> {
        self.start(
            NewSubmission {
                assignment_id,
                course_id,
                assignment_name: assignment_name.to_string(),
                kind: SubmissionKind::Text,
                entry: Some(text.to_string()),
                is_draft: false,
            },
            &[],
        )
    }

    fn start_url_submission(
        &self,
        course_id: i64,
        assignment_id: i64,
        assignment_name: &str,
        url: &str,
    ) -> Result<SubmissionId, StoreError> {
        self.start(
            NewSubmission {
                assignment_id,
                course_id,
                assignment_name: assignment_name.to_string(),
                kind: SubmissionKind::Url,
                entry: Some(url.to_string()),
                is_draft: false,
            },
            &[],
        )
    }

    fn start_file_submission(
        &self,
        course_id: i64,
        assignment_id: i64,
        assignment_name: &str,
        files: &[NewFile],
    ) -> Result<Option<SubmissionId>, StoreError> {
        if files.is_empty() {
            pipeline_warn!(
                "file submission for assignment {} had no files; ignored",
                assignment_id
            );
            return Ok(None);
        }
        self.start(
            NewSubmission {
                assignment_id,
                course_id,
                assignment_name: assignment_name.to_string(),
                kind: SubmissionKind::FileUpload,
                entry: None,
                is_draft: false,
            },
            files,
        )
        .map(Some)
    }

    fn start_media_submission(
        &self,
        course_id: i64,
        assignment_id: i64,
        assignment_name: &str,
        file: &NewFile,
    ) -> Result<SubmissionId, StoreError> {
        self.start(
            NewSubmission {
                assignment_id,
                course_id,
                assignment_name: assignment_name.to_string(),
                kind: SubmissionKind::MediaRecording,
                entry: None,
                is_draft: false,
            },
            std::slice::from_ref(file),
        )
    }

    fn retry_submission(&self, id: SubmissionId) -> Result<(), StoreError> {
        if self.store.find_submission(id)?.is_none() {
            pipeline_warn!("retry requested for missing submission {}", id);
            return Ok(());
        }
        self.store.set_submission_failed(id, false)?;
        pipeline_info!("retrying submission {}", id);
        self.dispatcher.dispatch(id);
        Ok(())
    }

    fn save_draft(
        &self,
        course_id: i64,
        assignment_id: i64,
        assignment_name: &str,
        text: &str,
    ) -> Result<SubmissionId, StoreError> {
        // One draft per assignment; the newest wins.
        self.store.delete_draft(assignment_id)?;
        let id = self.store.insert_submission(
            &NewSubmission {
                assignment_id,
                course_id,
                assignment_name: assignment_name.to_string(),
                kind: SubmissionKind::Text,
                entry: Some(text.to_string()),
                is_draft: true,
            },
            &[],
        )?;
        pipeline_debug!("saved draft {} for assignment {}", id, assignment_id);
        Ok(id)
    }

    fn find_draft(&self, assignment_id: i64) -> Result<Option<SubmissionRow>, StoreError> {
        self.store.find_draft(assignment_id)
    }

    fn delete_temp_file(&self, path: &str) {
        remove_temp_file(path);
    }
}

/// Deletes a staged upload copy. Missing files are fine; anything else
/// is logged and ignored.
pub fn remove_temp_file(path: &str) {
    match std::fs::remove_file(path) {
        Ok(()) => pipeline_debug!("removed temp file {}", path),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => pipeline_warn!("could not remove temp file {}: {}", path, err),
    }
}
