//! Handin engine: persisted upload store, transport and the
//! background submission worker.
mod store;
mod submit;
mod transport;
mod types;
mod worker;

pub use store::{StoreError, UploadStore};
pub use submit::{remove_temp_file, SubmissionHelper, SubmissionStarter};
pub use transport::{
    Attachment, ConfirmedSubmission, FileUploadSlot, HttpTransport, MediaUpload, ProgressSink,
    SubmissionTransport, TransportError, TransportSettings,
};
pub use types::{
    FileId, FileRow, NewFile, NewSubmission, StoreChange, SubmissionId, SubmissionKind,
    SubmissionRow, WorkOutcome,
};
pub use worker::{SubmissionDispatch, UploadWorker, UploadWorkerHandle};
