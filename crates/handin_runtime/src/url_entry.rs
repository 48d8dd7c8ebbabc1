//! Effect handler for the website-URL submission screen.

use std::sync::Arc;

use handin_core::url_entry::{init, update, Effect, Event, Model};
use handin_engine::SubmissionStarter;
use pipeline_logging::pipeline_error;

use crate::event_loop::{spawn, EffectHandler, ScreenLoop};
use crate::views::{UrlEntryView, ViewRef};

pub struct UrlEntryHandler {
    starter: Arc<dyn SubmissionStarter>,
    view: ViewRef<dyn UrlEntryView>,
}

impl UrlEntryHandler {
    pub fn new(starter: Arc<dyn SubmissionStarter>, view: ViewRef<dyn UrlEntryView>) -> Self {
        Self { starter, view }
    }
}

impl EffectHandler<Effect> for UrlEntryHandler {
    fn accept(&self, effect: Effect) {
        match effect {
            Effect::SeedUrl { url } => {
                self.view.with(|view| view.seed_url(&url));
            }
            Effect::ShowUrlPreview { url } => {
                self.view.with(|view| view.show_preview(&url));
            }
            Effect::SubmitUrl {
                course_id,
                assignment_id,
                assignment_name,
                url,
            } => {
                if let Err(err) = self.starter.start_url_submission(
                    course_id,
                    assignment_id,
                    &assignment_name,
                    &url,
                ) {
                    pipeline_error!(
                        "could not queue url submission for assignment {}: {}",
                        assignment_id,
                        err
                    );
                }
                self.view.with(|view| view.close());
            }
        }
    }
}

/// Wires up a URL entry screen loop.
pub fn spawn_url_entry(
    model: Model,
    starter: Arc<dyn SubmissionStarter>,
    view: ViewRef<dyn UrlEntryView>,
    render: impl Fn(&Model) + Send + 'static,
) -> ScreenLoop<Event> {
    spawn(
        model,
        init,
        update,
        move |_events| UrlEntryHandler::new(starter, view),
        render,
    )
}
