//! Handin core: pure per-screen state machines and view projections.
//!
//! Each submission screen gets its own module with a `Model`, `Event`,
//! `Effect`, and the `init`/`update` pair. Nothing in this crate
//! performs I/O; effects describe intent and are executed elsewhere.
pub mod file_picker;
mod files;
pub mod text_entry;
pub mod upload_status;
pub mod url_entry;
pub mod view_model;

pub use files::{FileId, PickedFile, StatusFile, SubmissionId};
