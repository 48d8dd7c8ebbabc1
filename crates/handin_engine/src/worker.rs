use std::sync::{mpsc, Arc};
use std::thread;

use pipeline_logging::{pipeline_error, pipeline_info, pipeline_warn};

use crate::store::{StoreError, UploadStore};
use crate::transport::{ConfirmedSubmission, ProgressSink, SubmissionTransport, TransportError};
use crate::types::{SubmissionId, SubmissionKind, SubmissionRow, WorkOutcome};

/// Enqueue seam between the submission helper and the background
/// worker, so helpers can be tested with a recording stub.
pub trait SubmissionDispatch: Send + Sync {
    fn dispatch(&self, id: SubmissionId);
}

/// Executes one persisted submission end to end. The worker is the
/// only writer of progress and error fields; the UI side only reads
/// rows or deletes them, and a deleted row is how cancellation
/// reaches us.
pub struct UploadWorker {
    store: Arc<UploadStore>,
    transport: Arc<dyn SubmissionTransport>,
}

impl UploadWorker {
    pub fn new(store: Arc<UploadStore>, transport: Arc<dyn SubmissionTransport>) -> Self {
        Self { store, transport }
    }

    /// Processes one submission. `Err` is reserved for store failures;
    /// transport failures come back as `WorkOutcome::Failed` with the
    /// error recorded on the rows.
    pub async fn process(&self, id: SubmissionId) -> Result<WorkOutcome, StoreError> {
        let Some(submission) = self.store.find_submission(id)? else {
            pipeline_info!("submission {} gone before upload; canceled", id);
            return Ok(WorkOutcome::Canceled);
        };
        if submission.is_draft {
            pipeline_warn!("draft submission {} reached the worker; skipping", id);
            return Ok(WorkOutcome::Canceled);
        }

        match submission.kind {
            SubmissionKind::Text => self.process_entry(&submission, true).await,
            SubmissionKind::Url => self.process_entry(&submission, false).await,
            SubmissionKind::FileUpload => self.process_files(&submission).await,
            SubmissionKind::MediaRecording => self.process_media(&submission).await,
        }
    }

    async fn process_entry(
        &self,
        submission: &SubmissionRow,
        is_text: bool,
    ) -> Result<WorkOutcome, StoreError> {
        let body = submission.entry.clone().unwrap_or_default();
        let result = if is_text {
            self.transport
                .submit_text(submission.course_id, submission.assignment_id, &body)
                .await
        } else {
            self.transport
                .submit_url(submission.course_id, submission.assignment_id, &body)
                .await
        };
        match result {
            Ok(confirmed) => self.finish(submission, &confirmed),
            Err(err) => {
                if self.canceled(submission.id)? {
                    return Ok(WorkOutcome::Canceled);
                }
                self.record_failure(submission.id, &err)
            }
        }
    }

    async fn process_files(&self, submission: &SubmissionRow) -> Result<WorkOutcome, StoreError> {
        let files = self.store.find_files(submission.id)?;
        // Files with an attachment id were confirmed by an earlier
        // attempt; a retry only sends the rest.
        let (confirmed, pending): (Vec<_>, Vec<_>) = files
            .into_iter()
            .partition(|file| file.attachment_id.is_some());
        let file_count = (confirmed.len() + pending.len()) as u32;
        let mut attachment_ids: Vec<i64> =
            confirmed.iter().filter_map(|file| file.attachment_id).collect();

        let mut index = confirmed.len() as u32;
        for file in &pending {
            if self.canceled(submission.id)? {
                pipeline_info!(
                    "submission {} canceled before uploading {}",
                    submission.id,
                    file.name
                );
                return Ok(WorkOutcome::Canceled);
            }

            self.store
                .update_progress(submission.id, index, file_count, 0.0)?;
            let sink: Arc<dyn ProgressSink> = Arc::new(StoreProgressSink {
                store: Arc::clone(&self.store),
                submission_id: submission.id,
                current_file: index,
                file_count,
            });
            match self
                .transport
                .upload_file(submission.course_id, submission.assignment_id, file, sink)
                .await
            {
                Ok(attachment) => {
                    self.store
                        .update_progress(submission.id, index, file_count, 1.0)?;
                    self.store.set_file_uploaded(file.id, attachment.id)?;
                    attachment_ids.push(attachment.id);
                }
                Err(err) => {
                    // A row that vanished mid-transfer is a cancel,
                    // not an upload failure.
                    if self.canceled(submission.id)? {
                        return Ok(WorkOutcome::Canceled);
                    }
                    pipeline_error!(
                        "file {} of submission {} failed: {}",
                        file.name,
                        submission.id,
                        err
                    );
                    self.store.set_file_error(file.id, &err.to_string())?;
                    self.store.set_submission_failed(submission.id, true)?;
                    return Ok(WorkOutcome::Failed);
                }
            }
            index += 1;
        }

        if self.canceled(submission.id)? {
            return Ok(WorkOutcome::Canceled);
        }
        match self
            .transport
            .submit_attachments(
                submission.course_id,
                submission.assignment_id,
                &attachment_ids,
            )
            .await
        {
            Ok(confirmed) => self.finish(submission, &confirmed),
            Err(err) => {
                if self.canceled(submission.id)? {
                    return Ok(WorkOutcome::Canceled);
                }
                self.record_failure(submission.id, &err)
            }
        }
    }

    async fn process_media(&self, submission: &SubmissionRow) -> Result<WorkOutcome, StoreError> {
        let Some(file) = self.store.find_file_for_submission(submission.id)? else {
            pipeline_warn!("media submission {} has no file; canceled", submission.id);
            return Ok(WorkOutcome::Canceled);
        };

        self.store.update_progress(submission.id, 0, 1, 0.0)?;
        let sink: Arc<dyn ProgressSink> = Arc::new(StoreProgressSink {
            store: Arc::clone(&self.store),
            submission_id: submission.id,
            current_file: 0,
            file_count: 1,
        });
        let media = match self.transport.upload_media(&file, sink).await {
            Ok(media) => media,
            Err(err) => {
                if self.canceled(submission.id)? {
                    return Ok(WorkOutcome::Canceled);
                }
                pipeline_error!("media upload for submission {} failed: {}", submission.id, err);
                self.store.set_file_error(file.id, &err.to_string())?;
                self.store.set_submission_failed(submission.id, true)?;
                return Ok(WorkOutcome::Failed);
            }
        };
        // Media ids are not persisted, so a later retry re-uploads the
        // recording in full.
        self.store.update_progress(submission.id, 0, 1, 1.0)?;

        if self.canceled(submission.id)? {
            return Ok(WorkOutcome::Canceled);
        }
        match self
            .transport
            .submit_media(
                submission.course_id,
                submission.assignment_id,
                &media.media_id,
                &media.media_type,
            )
            .await
        {
            Ok(confirmed) => self.finish(submission, &confirmed),
            Err(err) => {
                if self.canceled(submission.id)? {
                    return Ok(WorkOutcome::Canceled);
                }
                self.record_failure(submission.id, &err)
            }
        }
    }

    fn canceled(&self, id: SubmissionId) -> Result<bool, StoreError> {
        Ok(self.store.find_submission(id)?.is_none())
    }

    fn finish(
        &self,
        submission: &SubmissionRow,
        confirmed: &ConfirmedSubmission,
    ) -> Result<WorkOutcome, StoreError> {
        if confirmed.late == Some(true) {
            pipeline_warn!("submission {} was accepted late", submission.id);
        }
        self.store.delete_submission(submission.id)?;
        pipeline_info!(
            "submission {} for assignment {} uploaded",
            submission.id,
            submission.assignment_id
        );
        Ok(WorkOutcome::Completed)
    }

    fn record_failure(
        &self,
        id: SubmissionId,
        err: &TransportError,
    ) -> Result<WorkOutcome, StoreError> {
        pipeline_error!("submission {} failed: {}", id, err);
        self.store.set_submission_failed(id, true)?;
        Ok(WorkOutcome::Failed)
    }
}

/// Store-writing progress sink; one per in-flight file. Progress that
/// cannot be written (row deleted underneath us) is dropped, the
/// existence check after the transfer settles the outcome.
struct StoreProgressSink {
    store: Arc<UploadStore>,
    submission_id: SubmissionId,
    current_file: u32,
    file_count: u32,
}

impl ProgressSink for StoreProgressSink {
    fn report(&self, sent: u64, total: u64) {
        if total == 0 {
            return;
        }
        let fraction = sent as f64 / total as f64;
        if let Err(err) = self.store.update_progress(
            self.submission_id,
            self.current_file,
            self.file_count,
            fraction,
        ) {
            pipeline_warn!(
                "progress write for submission {} failed: {}",
                self.submission_id,
                err
            );
        }
    }
}

enum WorkerCommand {
    Process(SubmissionId),
}

/// Owns the background upload thread. Commands are processed strictly
/// one at a time, so at most one upload runs per queue and the
/// per-submission progress math stays valid.
pub struct UploadWorkerHandle {
    cmd_tx: mpsc::Sender<WorkerCommand>,
    store: Arc<UploadStore>,
}

impl UploadWorkerHandle {
    pub fn new(store: Arc<UploadStore>, transport: Arc<dyn SubmissionTransport>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let worker_store = Arc::clone(&store);

        thread::spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    pipeline_error!("upload worker could not start a runtime: {}", err);
                    return;
                }
            };
            let worker = UploadWorker::new(worker_store, transport);
            while let Ok(command) = cmd_rx.recv() {
                match command {
                    WorkerCommand::Process(id) => {
                        // block_on keeps the queue strictly sequential.
                        match runtime.block_on(worker.process(id)) {
                            Ok(outcome) => {
                                pipeline_info!("submission {} finished: {}", id, outcome)
                            }
                            Err(err) => {
                                pipeline_error!("submission {} hit a store failure: {}", id, err)
                            }
                        }
                    }
                }
            }
        });

        Self { cmd_tx, store }
    }

    /// Queues a submission for upload.
    pub fn enqueue(&self, id: SubmissionId) {
        let _ = self.cmd_tx.send(WorkerCommand::Process(id));
    }

    /// Re-queues every persisted non-draft submission. Called once at
    /// startup so uploads survive a process restart.
    pub fn resume_pending(&self) -> Result<usize, StoreError> {
        let pending = self.store.pending_submissions()?;
        let count = pending.len();
        for row in pending {
            pipeline_info!("resuming persisted submission {}", row.id);
            self.enqueue(row.id);
        }
        Ok(count)
    }
}

impl SubmissionDispatch for UploadWorkerHandle {
    fn dispatch(&self, id: SubmissionId) {
        self.enqueue(id);
    }
}
