//! View seams between effect handlers and whatever surface is
//! currently attached. Handlers outlive screens, so every call goes
//! through a [`ViewRef`] that quietly drops it when nothing is
//! attached.

use std::sync::{Arc, Mutex, MutexGuard};

/// Shared, detachable handle onto a view trait object.
pub struct ViewRef<V: ?Sized> {
    inner: Arc<Mutex<Option<Box<V>>>>,
}

impl<V: ?Sized> ViewRef<V> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }

    pub fn attach(&self, view: Box<V>) {
        *self.lock() = Some(view);
    }

    pub fn detach(&self) {
        *self.lock() = None;
    }

    /// Runs `f` against the attached view; a detached ref is a no-op.
    pub fn with(&self, f: impl FnOnce(&V)) {
        if let Some(view) = self.lock().as_deref() {
            f(view);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<V>>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<V: ?Sized> Clone for ViewRef<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: ?Sized> Default for ViewRef<V> {
    fn default() -> Self {
        Self::new()
    }
}

pub trait TextEntryView: Send {
    /// Repopulate the editor with previously entered text.
    fn seed_text(&self, text: &str);
    fn close(&self);
}

pub trait UrlEntryView: Send {
    /// Repopulate the input box with the previously entered URL.
    fn seed_url(&self, url: &str);
    /// Render a page preview; an empty URL clears it.
    fn show_preview(&self, url: &str);
    fn close(&self);
}

pub trait PickerView: Send {
    fn launch_camera(&self);
    fn launch_gallery(&self);
    fn launch_file_picker(&self);
    /// The picked file's extension is not in the assignment's
    /// allow-list.
    fn show_bad_extension(&self, allowed: &[String]);
    fn show_file_error(&self, message: &str);
    fn close(&self);
}

pub trait UploadStatusView: Send {
    fn show_cancel_dialog(&self);
    fn notify_submission_deleted(&self);
    fn notify_retrying(&self);
}
