//! Effect handler for the plain-text submission screen.

use std::sync::Arc;

use handin_core::text_entry::{init, update, Effect, Event, Model};
use handin_engine::SubmissionStarter;
use pipeline_logging::pipeline_error;

use crate::event_loop::{spawn, EffectHandler, ScreenLoop};
use crate::views::{TextEntryView, ViewRef};

pub struct TextEntryHandler {
    starter: Arc<dyn SubmissionStarter>,
    view: ViewRef<dyn TextEntryView>,
}

impl TextEntryHandler {
    pub fn new(starter: Arc<dyn SubmissionStarter>, view: ViewRef<dyn TextEntryView>) -> Self {
        Self { starter, view }
    }
}

impl EffectHandler<Effect> for TextEntryHandler {
    fn accept(&self, effect: Effect) {
        match effect {
            Effect::SeedText { text } => {
                self.view.with(|view| view.seed_text(&text));
            }
            Effect::SubmitText {
                course_id,
                assignment_id,
                assignment_name,
                text,
            } => {
                // The durable queue owns the submission from here on;
                // the screen closes either way.
                if let Err(err) = self.starter.start_text_submission(
                    course_id,
                    assignment_id,
                    &assignment_name,
                    &text,
                ) {
                    pipeline_error!(
                        "could not queue text submission for assignment {}: {}",
                        assignment_id,
                        err
                    );
                }
                self.view.with(|view| view.close());
            }
        }
    }
}

/// Wires up a text entry screen loop.
pub fn spawn_text_entry(
    model: Model,
    starter: Arc<dyn SubmissionStarter>,
    view: ViewRef<dyn TextEntryView>,
    render: impl Fn(&Model) + Send + 'static,
) -> ScreenLoop<Event> {
    spawn(
        model,
        init,
        update,
        move |_events| TextEntryHandler::new(starter, view),
        render,
    )
}
