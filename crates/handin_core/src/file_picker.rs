//! State machine for the file/media picker screen.

use crate::files::PickedFile;

/// What the picker collects: plain file attachments or a single
/// media recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    FileUpload,
    MediaRecording,
}

/// Snapshot of the picker screen. `pending_capture` carries a content
/// URI handed over by the platform but not yet resolved into a file;
/// keeping it in the model lets the screen resume mid-flow after an
/// interruption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub course_id: i64,
    pub assignment_id: i64,
    pub assignment_name: String,
    pub mode: Mode,
    pub allowed_extensions: Vec<String>,
    pub files: Vec<PickedFile>,
    pub pending_capture: Option<String>,
    pub is_loading_file: bool,
}

impl Model {
    pub fn new(
        course_id: i64,
        assignment_id: i64,
        assignment_name: impl Into<String>,
        mode: Mode,
    ) -> Self {
        Self {
            course_id,
            assignment_id,
            assignment_name: assignment_name.into(),
            mode,
            allowed_extensions: Vec::new(),
            files: Vec::new(),
            pending_capture: None,
            is_loading_file: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// User tapped the camera source button.
    CameraClicked,
    /// User tapped the gallery source button.
    GalleryClicked,
    /// User tapped the device-file source button.
    DeviceFileClicked,
    /// The platform handed over a picked or captured content URI.
    FileSelected { uri: String },
    /// File resolution finished; `None` means the file was rejected
    /// or unreadable and only the loading flag should clear.
    FileAdded(Option<PickedFile>),
    /// User removed the staged file at this position.
    FileRemoved { index: usize },
    /// User pressed the submit action.
    SubmitClicked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    LaunchCamera,
    LaunchGallery,
    LaunchFilePicker,
    /// Resolve a content URI into a staged file, checking its
    /// extension against the allow-list.
    LoadFileContents {
        uri: String,
        allowed_extensions: Vec<String>,
    },
    /// Delete the temp file backing a removed staged entry.
    RemoveTempFile { path: String },
    /// Commit the staged files; carries the full model so the handler
    /// can route on mode.
    HandleSubmit { model: Model },
}

/// Prepares a freshly attached screen. A pending capture URI resumes
/// resolution immediately instead of re-prompting the user.
pub fn init(mut model: Model) -> (Model, Vec<Effect>) {
    let Some(uri) = model.pending_capture.clone() else {
        return (model, Vec::new());
    };
    model.is_loading_file = true;
    let effects = vec![Effect::LoadFileContents {
        uri,
        allowed_extensions: model.allowed_extensions.clone(),
    }];
    (model, effects)
}

/// Pure update function: applies an event to the model and returns any effects.
pub fn update(mut model: Model, event: Event) -> (Model, Vec<Effect>) {
    let effects = match event {
        Event::CameraClicked => vec![Effect::LaunchCamera],
        Event::GalleryClicked => vec![Effect::LaunchGallery],
        Event::DeviceFileClicked => vec![Effect::LaunchFilePicker],
        Event::FileSelected { uri } => {
            model.pending_capture = Some(uri.clone());
            model.is_loading_file = true;
            vec![Effect::LoadFileContents {
                uri,
                allowed_extensions: model.allowed_extensions.clone(),
            }]
        }
        Event::FileAdded(file) => {
            // The loading flag clears on every outcome.
            if let Some(file) = file {
                model.files.push(file);
            }
            model.is_loading_file = false;
            model.pending_capture = None;
            Vec::new()
        }
        Event::FileRemoved { index } => {
            if index >= model.files.len() {
                return (model, Vec::new());
            }
            let removed = model.files.remove(index);
            // Staged files are not persisted until submit, so only the
            // temp file goes away here.
            vec![Effect::RemoveTempFile { path: removed.path }]
        }
        Event::SubmitClicked => {
            if model.files.is_empty() || model.is_loading_file {
                return (model, Vec::new());
            }
            vec![Effect::HandleSubmit {
                model: model.clone(),
            }]
        }
    };
    (model, effects)
}
