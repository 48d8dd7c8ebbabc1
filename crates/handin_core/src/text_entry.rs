//! State machine for the plain-text submission screen.

/// Snapshot of the text entry screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub course_id: i64,
    pub assignment_id: i64,
    pub assignment_name: String,
    pub text: String,
    pub is_submittable: bool,
}

impl Model {
    pub fn new(course_id: i64, assignment_id: i64, assignment_name: impl Into<String>) -> Self {
        Self {
            course_id,
            assignment_id,
            assignment_name: assignment_name.into(),
            text: String::new(),
            is_submittable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// User edited the submission body.
    TextChanged(String),
    /// User pressed the submit action.
    SubmitClicked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Repopulate the editor with previously entered text.
    SeedText { text: String },
    /// Hand the finished body to the submission queue.
    SubmitText {
        course_id: i64,
        assignment_id: i64,
        assignment_name: String,
        text: String,
    },
}

/// Prepares a freshly attached screen: re-seeds the editor contents.
pub fn init(model: Model) -> (Model, Vec<Effect>) {
    let seed = Effect::SeedText {
        text: model.text.clone(),
    };
    (model, vec![seed])
}

/// Pure update function: applies an event to the model and returns any effects.
pub fn update(mut model: Model, event: Event) -> (Model, Vec<Effect>) {
    let effects = match event {
        Event::TextChanged(text) => {
            model.is_submittable = !text.trim().is_empty();
            model.text = text;
            Vec::new()
        }
        Event::SubmitClicked => {
            if !model.is_submittable {
                return (model, Vec::new());
            }
            vec![Effect::SubmitText {
                course_id: model.course_id,
                assignment_id: model.assignment_id,
                assignment_name: model.assignment_name.clone(),
                text: model.text.clone(),
            }]
        }
    };
    (model, effects)
}
