//! Pure projections from screen models to render-ready view state.
//! No business rules live here beyond display formatting.

use crate::{file_picker, text_entry, upload_status, url_entry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEntryViewState {
    pub submit_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlEntryViewState {
    pub submit_enabled: bool,
    pub cleartext_warning: bool,
}

/// One staged file on the picker screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerFileRow {
    pub name: String,
    pub size_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerViewState {
    pub submit_enabled: bool,
    pub is_loading: bool,
    pub show_empty_panel: bool,
    pub files: Vec<PickerFileRow>,
}

/// One persisted file on the status screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFileRow {
    pub name: String,
    pub size_label: String,
    pub failed: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatusViewState {
    Loading,
    Failed {
        title: String,
        files: Vec<StatusFileRow>,
    },
    /// The persisted rows are gone and no error remains: the upload
    /// finished and was acknowledged.
    Succeeded,
    InProgress {
        title: String,
        percent: u32,
        uploaded_label: String,
        total_label: String,
        files: Vec<StatusFileRow>,
    },
}

pub fn present_text_entry(model: &text_entry::Model) -> TextEntryViewState {
    TextEntryViewState {
        submit_enabled: model.is_submittable,
    }
}

pub fn present_url_entry(model: &url_entry::Model) -> UrlEntryViewState {
    UrlEntryViewState {
        submit_enabled: model.is_submittable,
        cleartext_warning: model.warning.is_some(),
    }
}

pub fn present_picker(model: &file_picker::Model) -> PickerViewState {
    PickerViewState {
        submit_enabled: !model.files.is_empty() && !model.is_loading_file,
        is_loading: model.is_loading_file,
        show_empty_panel: model.files.is_empty() && !model.is_loading_file,
        files: model
            .files
            .iter()
            .map(|file| PickerFileRow {
                name: file.name.clone(),
                size_label: format_size(file.size),
            })
            .collect(),
    }
}

pub fn present_upload_status(model: &upload_status::Model) -> UploadStatusViewState {
    if model.is_loading {
        return UploadStatusViewState::Loading;
    }

    let title = model.assignment_name.clone().unwrap_or_default();
    let files: Vec<StatusFileRow> = model
        .files
        .iter()
        .map(|file| StatusFileRow {
            name: file.name.clone(),
            size_label: format_size(file.size),
            failed: file.failed,
            error: file.error.clone(),
        })
        .collect();

    if model.is_failed {
        return UploadStatusViewState::Failed { title, files };
    }
    if model.files.is_empty() {
        return UploadStatusViewState::Succeeded;
    }

    let total: u64 = model.files.iter().map(|f| f.size).sum();
    let uploaded = model.uploaded_bytes.unwrap_or(0);
    UploadStatusViewState::InProgress {
        title,
        percent: percent_of(uploaded, total),
        uploaded_label: format_size(uploaded),
        total_label: format_size(total),
        files,
    }
}

/// Human-readable byte count, shared by the picker and status screens.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

fn percent_of(uploaded: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((uploaded as f64 / total as f64) * 100.0).round() as u32
}
