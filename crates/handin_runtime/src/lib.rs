//! Platform side of the submission pipeline: screen loops, effect
//! handlers and view plumbing over the pure state machines in
//! `handin_core`, backed by the durable queue in `handin_engine`.
mod event_loop;
mod file_picker;
mod logging;
mod text_entry;
mod upload_status;
mod url_entry;
mod views;

pub use event_loop::{spawn, EffectHandler, EventSender, ScreenLoop};
pub use file_picker::{spawn_file_picker, FilePickerHandler};
pub use logging::{initialize, LogDestination};
pub use text_entry::{spawn_text_entry, TextEntryHandler};
pub use upload_status::{spawn_upload_status, UploadStatusHandler};
pub use url_entry::{spawn_url_entry, UrlEntryHandler};
pub use views::{PickerView, TextEntryView, UploadStatusView, UrlEntryView, ViewRef};
