//! Effect handler for the file/media picker screen. Resolves platform
//! content URIs into staged files and routes submits into the durable
//! queue.

use std::io;
use std::path::Path;
use std::sync::Arc;

use handin_core::file_picker::{init, update, Effect, Event, Mode, Model};
use handin_core::PickedFile;
use handin_engine::{NewFile, SubmissionStarter};
use pipeline_logging::{pipeline_error, pipeline_warn};

use crate::event_loop::{spawn, EffectHandler, EventSender, ScreenLoop};
use crate::views::{PickerView, ViewRef};

pub struct FilePickerHandler {
    starter: Arc<dyn SubmissionStarter>,
    view: ViewRef<dyn PickerView>,
    events: EventSender<Event>,
}

impl FilePickerHandler {
    pub fn new(
        starter: Arc<dyn SubmissionStarter>,
        view: ViewRef<dyn PickerView>,
        events: EventSender<Event>,
    ) -> Self {
        Self {
            starter,
            view,
            events,
        }
    }

    /// Stages a picked URI. Every outcome ends in a `FileAdded` event
    /// so the screen's loading flag always clears.
    fn load_file(&self, uri: &str, allowed: &[String]) {
        match resolve_picked_file(uri) {
            Ok(file) if extension_allowed(&file.name, allowed) => {
                let _ = self.events.send(Event::FileAdded(Some(file)));
            }
            Ok(file) => {
                pipeline_warn!("rejected {}: extension not allowed", file.name);
                self.view.with(|view| view.show_bad_extension(allowed));
                let _ = self.events.send(Event::FileAdded(None));
            }
            Err(err) => {
                pipeline_warn!("could not stage picked file {}: {}", uri, err);
                self.view.with(|view| view.show_file_error(&err.to_string()));
                let _ = self.events.send(Event::FileAdded(None));
            }
        }
    }

    fn submit(&self, model: &Model) {
        let result = match model.mode {
            Mode::MediaRecording => match model.files.first() {
                Some(file) => self
                    .starter
                    .start_media_submission(
                        model.course_id,
                        model.assignment_id,
                        &model.assignment_name,
                        &to_new_file(file),
                    )
                    .map(|_| ()),
                None => Ok(()),
            },
            Mode::FileUpload => {
                let files: Vec<NewFile> = model.files.iter().map(to_new_file).collect();
                self.starter
                    .start_file_submission(
                        model.course_id,
                        model.assignment_id,
                        &model.assignment_name,
                        &files,
                    )
                    .map(|_| ())
            }
        };
        if let Err(err) = result {
            pipeline_error!(
                "could not queue file submission for assignment {}: {}",
                model.assignment_id,
                err
            );
        }
        self.view.with(|view| view.close());
    }
}

impl EffectHandler<Effect> for FilePickerHandler {
    fn accept(&self, effect: Effect) {
        match effect {
            Effect::LaunchCamera => self.view.with(|view| view.launch_camera()),
            Effect::LaunchGallery => self.view.with(|view| view.launch_gallery()),
            Effect::LaunchFilePicker => self.view.with(|view| view.launch_file_picker()),
            Effect::LoadFileContents {
                uri,
                allowed_extensions,
            } => self.load_file(&uri, &allowed_extensions),
            Effect::RemoveTempFile { path } => self.starter.delete_temp_file(&path),
            Effect::HandleSubmit { model } => self.submit(&model),
        }
    }
}

/// Wires up a picker screen loop.
pub fn spawn_file_picker(
    model: Model,
    starter: Arc<dyn SubmissionStarter>,
    view: ViewRef<dyn PickerView>,
    render: impl Fn(&Model) + Send + 'static,
) -> ScreenLoop<Event> {
    spawn(
        model,
        init,
        update,
        move |events| FilePickerHandler::new(starter, view, events),
        render,
    )
}

fn to_new_file(file: &PickedFile) -> NewFile {
    NewFile {
        name: file.name.clone(),
        size: file.size,
        content_type: file.content_type.clone(),
        local_path: file.path.clone(),
    }
}

/// Resolves a content URI into a staged file description: display name
/// from the path, size from metadata, content type from the extension.
fn resolve_picked_file(uri: &str) -> io::Result<PickedFile> {
    let path = uri.strip_prefix("file://").unwrap_or(uri);
    let metadata = std::fs::metadata(path)?;
    if !metadata.is_file() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "not a file"));
    }
    let name = Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no file name"))?;
    let content_type = content_type_for(&name).to_string();
    Ok(PickedFile {
        name,
        size: metadata.len(),
        content_type,
        path: path.to_string(),
        error: None,
    })
}

/// Case-insensitive allow-list check; an empty list accepts anything.
/// Entries may carry a leading dot.
fn extension_allowed(name: &str, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let Some(extension) = file_extension(name) else {
        return false;
    };
    allowed
        .iter()
        .map(|entry| entry.trim().trim_start_matches('.'))
        .any(|entry| entry.eq_ignore_ascii_case(extension))
}

fn file_extension(name: &str) -> Option<&str> {
    Path::new(name).extension().and_then(|ext| ext.to_str())
}

fn content_type_for(name: &str) -> &'static str {
    let Some(extension) = file_extension(name) else {
        return "application/octet-stream";
    };
    match extension.to_ascii_lowercase().as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}
