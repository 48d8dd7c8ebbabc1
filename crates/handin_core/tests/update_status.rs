use std::sync::Once;

use handin_core::upload_status::{init, update, Effect, Event, Model};
use handin_core::StatusFile;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(pipeline_logging::initialize_for_tests);
}

fn file(id: i64, name: &str, size: u64) -> StatusFile {
    StatusFile {
        id,
        name: name.to_string(),
        size,
        failed: false,
        error: None,
    }
}

fn loaded_model(files: Vec<StatusFile>) -> Model {
    let mut state = Model::new(99);
    state.assignment_name = Some("Lab report".to_string());
    state.files = files;
    state
}

#[test]
fn init_starts_loading() {
    init_logging();
    let (next, effects) = init(Model::new(99));

    assert!(next.is_loading);
    assert_eq!(effects, vec![Effect::LoadPersistedFiles { submission_id: 99 }]);
}

#[test]
fn request_load_reloads_without_touching_the_model() {
    init_logging();
    let state = loaded_model(vec![file(1, "a.pdf", 10)]);
    let (next, effects) = update(state.clone(), Event::RequestLoad);

    assert_eq!(state, next);
    assert_eq!(effects, vec![Effect::LoadPersistedFiles { submission_id: 99 }]);
}

#[test]
fn persisted_load_resyncs_wholesale() {
    init_logging();
    let mut state = loaded_model(vec![file(1, "stale.pdf", 10)]);
    state.is_loading = true;
    state.is_failed = true;

    let (next, effects) = update(
        state,
        Event::PersistedSubmissionLoaded {
            assignment_name: Some("Final essay".to_string()),
            failed: false,
            files: vec![file(2, "fresh.pdf", 20)],
        },
    );

    assert_eq!(next.assignment_name, Some("Final essay".to_string()));
    assert!(!next.is_failed);
    assert!(!next.is_loading);
    assert_eq!(next.files, vec![file(2, "fresh.pdf", 20)]);
    assert!(effects.is_empty());
}

#[test]
fn refresh_replaces_files_and_error_flag() {
    init_logging();
    let state = loaded_model(vec![file(1, "a.pdf", 10), file(2, "b.pdf", 20)]);

    let (next, effects) = update(
        state,
        Event::FilesRefreshed {
            failed: true,
            submission_id: 99,
            files: vec![file(2, "b.pdf", 20)],
        },
    );

    assert!(next.is_failed);
    assert_eq!(next.files, vec![file(2, "b.pdf", 20)]);
    assert!(effects.is_empty());
}

#[test]
fn refresh_for_another_submission_is_ignored() {
    init_logging();
    let state = loaded_model(vec![file(1, "a.pdf", 10)]);

    let (next, effects) = update(
        state.clone(),
        Event::FilesRefreshed {
            failed: true,
            submission_id: 100,
            files: Vec::new(),
        },
    );

    assert_eq!(state, next);
    assert!(effects.is_empty());
}

#[test]
fn progress_counts_whole_files_before_the_current_one() {
    init_logging();
    let state = loaded_model(vec![file(1, "a", 1), file(2, "b", 1), file(3, "c", 1)]);

    let (next, effects) = update(
        state,
        Event::UploadProgressChanged {
            file_index: 0,
            submission_id: 99,
            fraction: 1.0,
        },
    );

    assert_eq!(next.uploaded_bytes, Some(1));
    assert!(effects.is_empty());
}

#[test]
fn progress_adds_the_fraction_of_the_current_file() {
    init_logging();
    let state = loaded_model(vec![file(1, "a", 4), file(2, "b", 2), file(3, "c", 6)]);

    let (next, _) = update(
        state,
        Event::UploadProgressChanged {
            file_index: 2,
            submission_id: 99,
            fraction: 0.5,
        },
    );

    assert_eq!(next.uploaded_bytes, Some(9));
}

#[test]
fn progress_floors_partial_bytes() {
    init_logging();
    let state = loaded_model(vec![file(1, "a", 3)]);

    let (next, _) = update(
        state,
        Event::UploadProgressChanged {
            file_index: 0,
            submission_id: 99,
            fraction: 0.5,
        },
    );

    assert_eq!(next.uploaded_bytes, Some(1));
}

#[test]
fn progress_for_another_submission_is_ignored() {
    init_logging();
    let state = loaded_model(vec![file(1, "a", 10)]);

    let (next, effects) = update(
        state.clone(),
        Event::UploadProgressChanged {
            file_index: 0,
            submission_id: 12,
            fraction: 0.9,
        },
    );

    assert_eq!(state, next);
    assert!(effects.is_empty());
}

#[test]
fn progress_past_the_file_list_counts_the_prefix_only() {
    init_logging();
    let state = loaded_model(vec![file(1, "a", 4), file(2, "b", 2)]);

    let (next, _) = update(
        state,
        Event::UploadProgressChanged {
            file_index: 5,
            submission_id: 99,
            fraction: 0.5,
        },
    );

    assert_eq!(next.uploaded_bytes, Some(6));
}

#[test]
fn cancel_asks_for_confirmation_first() {
    init_logging();
    let state = loaded_model(vec![file(1, "a.pdf", 10)]);
    let (next, effects) = update(state.clone(), Event::CancelRequested);

    assert_eq!(state, next);
    assert_eq!(effects, vec![Effect::ShowCancelDialog]);
}

#[test]
fn confirmed_cancel_deletes_the_submission() {
    init_logging();
    let state = loaded_model(vec![file(1, "a.pdf", 10)]);
    let (next, effects) = update(state.clone(), Event::CancelClicked);

    assert_eq!(state, next);
    assert_eq!(effects, vec![Effect::DeleteSubmission { submission_id: 99 }]);
}

#[test]
fn retry_emits_the_retry_effect() {
    init_logging();
    let mut state = loaded_model(vec![file(1, "a.pdf", 10)]);
    state.is_failed = true;

    let (next, effects) = update(state.clone(), Event::RetryClicked);

    assert_eq!(state, next);
    assert_eq!(effects, vec![Effect::RetrySubmission { submission_id: 99 }]);
}

#[test]
fn deleting_the_only_file_cancels_the_whole_submission() {
    init_logging();
    let state = loaded_model(vec![file(7, "only.pdf", 10)]);

    let (next, effects) = update(state.clone(), Event::DeleteFileClicked { index: 0 });

    // The model keeps its row; the follow-up refresh reflects the
    // deletion once the store has applied it.
    assert_eq!(state, next);
    assert_eq!(effects, vec![Effect::DeleteSubmission { submission_id: 99 }]);
}

#[test]
fn deleting_one_of_several_removes_exactly_that_entry() {
    init_logging();
    let state = loaded_model(vec![
        file(1, "a.pdf", 10),
        file(2, "b.pdf", 20),
        file(3, "c.pdf", 30),
    ]);

    let (next, effects) = update(state, Event::DeleteFileClicked { index: 1 });

    assert_eq!(
        next.files,
        vec![file(1, "a.pdf", 10), file(3, "c.pdf", 30)]
    );
    assert_eq!(effects, vec![Effect::DeleteFileFromSubmission { file_id: 2 }]);
}

#[test]
fn delete_out_of_range_is_noop() {
    init_logging();
    let state = loaded_model(vec![file(1, "a.pdf", 10)]);

    let (next, effects) = update(state.clone(), Event::DeleteFileClicked { index: 3 });

    assert_eq!(state, next);
    assert!(effects.is_empty());
}
