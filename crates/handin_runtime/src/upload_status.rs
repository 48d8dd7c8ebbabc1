//! Effect handler for the upload status screen, plus the store
//! watcher that keeps it live while the worker runs.

use std::sync::Arc;
use std::thread;

use handin_core::upload_status::{init, update, Effect, Event, Model};
use handin_core::StatusFile;
use handin_engine::{
    remove_temp_file, FileRow, SubmissionId, SubmissionStarter, UploadStore,
};
use pipeline_logging::{pipeline_error, pipeline_warn};

use crate::event_loop::{spawn, EffectHandler, EventSender, ScreenLoop};
use crate::views::{UploadStatusView, ViewRef};

pub struct UploadStatusHandler {
    store: Arc<UploadStore>,
    starter: Arc<dyn SubmissionStarter>,
    view: ViewRef<dyn UploadStatusView>,
    events: EventSender<Event>,
}

impl UploadStatusHandler {
    pub fn new(
        store: Arc<UploadStore>,
        starter: Arc<dyn SubmissionStarter>,
        view: ViewRef<dyn UploadStatusView>,
        events: EventSender<Event>,
    ) -> Self {
        Self {
            store,
            starter,
            view,
            events,
        }
    }

    /// Full resync from the store. An absent row reads as a finished,
    /// unfailed submission with no files.
    fn load(&self, submission_id: SubmissionId) {
        let row = match self.store.find_submission(submission_id) {
            Ok(row) => row,
            Err(err) => {
                pipeline_error!("could not load submission {}: {}", submission_id, err);
                None
            }
        };
        let files = self.files_for(submission_id);
        let _ = self.events.send(Event::PersistedSubmissionLoaded {
            assignment_name: row.as_ref().map(|row| row.assignment_name.clone()),
            failed: row.as_ref().map(|row| row.failed).unwrap_or(false),
            files,
        });
    }

    fn delete_submission(&self, submission_id: SubmissionId) {
        // Collect staged paths first; the rows are gone afterwards.
        let paths: Vec<String> = match self.store.find_files(submission_id) {
            Ok(files) => files.into_iter().map(|file| file.local_path).collect(),
            Err(err) => {
                pipeline_warn!("could not list files of submission {}: {}", submission_id, err);
                Vec::new()
            }
        };
        if let Err(err) = self.store.delete_submission(submission_id) {
            pipeline_error!("could not delete submission {}: {}", submission_id, err);
            return;
        }
        for path in &paths {
            remove_temp_file(path);
        }
        self.view.with(|view| view.notify_submission_deleted());
    }

    fn delete_file(&self, file_id: i64) {
        let path = match self.store.find_file(file_id) {
            Ok(Some(file)) => Some(file.local_path),
            Ok(None) => None,
            Err(err) => {
                pipeline_warn!("could not look up file {}: {}", file_id, err);
                None
            }
        };
        if let Err(err) = self.store.delete_file(file_id) {
            pipeline_error!("could not delete file {}: {}", file_id, err);
            return;
        }
        if let Some(path) = path {
            remove_temp_file(&path);
        }
    }

    fn files_for(&self, submission_id: SubmissionId) -> Vec<StatusFile> {
        match self.store.find_files(submission_id) {
            Ok(files) => status_files(&files),
            Err(err) => {
                pipeline_error!("could not load files of submission {}: {}", submission_id, err);
                Vec::new()
            }
        }
    }
}

impl EffectHandler<Effect> for UploadStatusHandler {
    fn accept(&self, effect: Effect) {
        match effect {
            Effect::LoadPersistedFiles { submission_id } => self.load(submission_id),
            Effect::DeleteSubmission { submission_id } => self.delete_submission(submission_id),
            Effect::DeleteFileFromSubmission { file_id } => self.delete_file(file_id),
            Effect::RetrySubmission { submission_id } => {
                if let Err(err) = self.starter.retry_submission(submission_id) {
                    pipeline_error!("could not retry submission {}: {}", submission_id, err);
                    return;
                }
                self.view.with(|view| view.notify_retrying());
            }
            Effect::ShowCancelDialog => self.view.with(|view| view.show_cancel_dialog()),
        }
    }
}

/// Wires up a status screen loop and its store watcher. The watcher
/// thread follows the change feed until the loop goes away.
pub fn spawn_upload_status(
    model: Model,
    store: Arc<UploadStore>,
    starter: Arc<dyn SubmissionStarter>,
    view: ViewRef<dyn UploadStatusView>,
    render: impl Fn(&Model) + Send + 'static,
) -> ScreenLoop<Event> {
    let submission_id = model.submission_id;
    let watcher_store = Arc::clone(&store);

    let screen = spawn(
        model,
        init,
        update,
        move |events| UploadStatusHandler::new(store, starter, view, events),
        render,
    );

    spawn_watcher(watcher_store, submission_id, screen.sender());
    screen
}

/// Re-reads the submission on every store change and pushes refresh
/// and progress events. Row deletion still produces one final refresh
/// carrying an empty file list.
fn spawn_watcher(
    store: Arc<UploadStore>,
    submission_id: SubmissionId,
    events: EventSender<Event>,
) {
    let changes = store.subscribe(submission_id);
    thread::spawn(move || {
        while changes.recv().is_ok() {
            let row = match store.find_submission(submission_id) {
                Ok(row) => row,
                Err(err) => {
                    pipeline_error!("watcher read of submission {} failed: {}", submission_id, err);
                    continue;
                }
            };
            let files = match store.find_files(submission_id) {
                Ok(files) => status_files(&files),
                Err(_) => Vec::new(),
            };
            let refreshed = Event::FilesRefreshed {
                failed: row.as_ref().map(|row| row.failed).unwrap_or(false),
                submission_id,
                files,
            };
            if events.send(refreshed).is_err() {
                return;
            }
            let Some(row) = row else { continue };
            // Progress is only meaningful while a transfer is live.
            if row.file_count > 0 {
                if let Some(fraction) = row.progress {
                    let progress = Event::UploadProgressChanged {
                        file_index: row.current_file as usize,
                        submission_id,
                        fraction,
                    };
                    if events.send(progress).is_err() {
                        return;
                    }
                }
            }
        }
    });
}

fn status_files(rows: &[FileRow]) -> Vec<StatusFile> {
    rows.iter()
        .map(|row| StatusFile {
            id: row.id,
            name: row.name.clone(),
            size: row.size,
            failed: row.failed,
            error: row.error.clone(),
        })
        .collect()
}
