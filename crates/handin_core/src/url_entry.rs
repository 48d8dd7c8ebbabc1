//! State machine for the website-URL submission screen.

use url::Url;

/// Non-fatal warning surfaced next to the URL input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlWarning {
    /// The URL uses plain `http://`; accepted, but flagged.
    CleartextHttp,
}

/// Snapshot of the URL entry screen. `url` holds the normalized
/// candidate, not the raw input box contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub course_id: i64,
    pub assignment_id: i64,
    pub assignment_name: String,
    pub url: String,
    pub is_submittable: bool,
    pub warning: Option<UrlWarning>,
}

impl Model {
    pub fn new(course_id: i64, assignment_id: i64, assignment_name: impl Into<String>) -> Self {
        Self {
            course_id,
            assignment_id,
            assignment_name: assignment_name.into(),
            url: String::new(),
            is_submittable: false,
            warning: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// User edited the URL input box.
    UrlChanged(String),
    /// User pressed the submit action.
    SubmitClicked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Repopulate the input box with the previously entered URL.
    SeedUrl { url: String },
    /// Render a page preview. Carries the empty string when there is
    /// nothing safe to preview (invalid input or clear-text scheme).
    ShowUrlPreview { url: String },
    /// Hand the finished URL to the submission queue.
    SubmitUrl {
        course_id: i64,
        assignment_id: i64,
        assignment_name: String,
        url: String,
    },
}

/// Prepares a freshly attached screen: re-seeds the input contents.
pub fn init(model: Model) -> (Model, Vec<Effect>) {
    let seed = Effect::SeedUrl {
        url: model.url.clone(),
    };
    (model, vec![seed])
}

/// Pure update function: applies an event to the model and returns any effects.
pub fn update(mut model: Model, event: Event) -> (Model, Vec<Effect>) {
    let effects = match event {
        Event::UrlChanged(input) => {
            let normalized = normalize(&input);
            let valid = is_absolute_url(&normalized);
            let cleartext = valid && normalized.starts_with("http://");

            model.url = normalized.clone();
            model.is_submittable = valid;
            model.warning = cleartext.then_some(UrlWarning::CleartextHttp);

            // No preview for insecure or unparseable input.
            let preview = if valid && !cleartext {
                normalized
            } else {
                String::new()
            };
            vec![Effect::ShowUrlPreview { url: preview }]
        }
        Event::SubmitClicked => {
            if !model.is_submittable {
                return (model, Vec::new());
            }
            vec![Effect::SubmitUrl {
                course_id: model.course_id,
                assignment_id: model.assignment_id,
                assignment_name: model.assignment_name.clone(),
                url: model.url.clone(),
            }]
        }
    };
    (model, effects)
}

/// Prefixes `https://` when the input names no scheme. Only the two
/// web schemes count; anything else is left for validation to reject.
fn normalize(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_owned()
    } else {
        format!("https://{trimmed}")
    }
}

fn is_absolute_url(candidate: &str) -> bool {
    Url::parse(candidate).is_ok_and(|url| url.has_host())
}
