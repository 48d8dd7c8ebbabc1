use std::collections::HashMap;
use std::path::Path;
use std::sync::{mpsc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension};
use thiserror::Error;

use crate::types::{
    FileId, FileRow, NewFile, NewSubmission, StoreChange, SubmissionId, SubmissionKind,
    SubmissionRow,
};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type Result<T> = core::result::Result<T, StoreError>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS submission (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    assignment_id INTEGER NOT NULL,
    course_id INTEGER NOT NULL,
    assignment_name TEXT NOT NULL,
    kind TEXT NOT NULL,
    entry TEXT,
    failed INTEGER NOT NULL DEFAULT 0,
    is_draft INTEGER NOT NULL DEFAULT 0,
    current_file INTEGER NOT NULL DEFAULT 0,
    file_count INTEGER NOT NULL DEFAULT 0,
    progress REAL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE TABLE IF NOT EXISTS submission_file (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    submission_id INTEGER NOT NULL REFERENCES submission(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    size INTEGER NOT NULL,
    content_type TEXT NOT NULL,
    local_path TEXT NOT NULL,
    attachment_id INTEGER,
    failed INTEGER NOT NULL DEFAULT 0,
    error TEXT
);
CREATE INDEX IF NOT EXISTS idx_submission_file_owner ON submission_file(submission_id);
CREATE INDEX IF NOT EXISTS idx_submission_assignment ON submission(assignment_id);
";

const SUBMISSION_COLUMNS: &str = "id, assignment_id, course_id, assignment_name, kind, entry, \
     failed, is_draft, current_file, file_count, progress";

const FILE_COLUMNS: &str =
    "id, submission_id, name, size, content_type, local_path, attachment_id, failed, error";

/// Durable queue of in-flight submissions and their files, shared
/// between the UI-facing effect handlers and the upload worker.
///
/// Every mutation is transactional per call and notifies subscribers
/// watching the touched submission id.
pub struct UploadStore {
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    conn: Connection,
    watchers: HashMap<SubmissionId, Vec<mpsc::Sender<StoreChange>>>,
}

impl StoreInner {
    fn notify(&mut self, id: SubmissionId, change: StoreChange) {
        let Some(senders) = self.watchers.get_mut(&id) else {
            return;
        };
        senders.retain(|tx| tx.send(change).is_ok());
        if senders.is_empty() {
            self.watchers.remove(&id);
        }
    }
}

impl UploadStore {
    /// Opens (creating if needed) the store database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            inner: Mutex::new(StoreInner {
                conn,
                watchers: HashMap::new(),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        // A poisoned lock still guards a usable connection; sqlite
        // transactions keep the data itself consistent.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Subscribes to change notifications for one submission id.
    /// Disconnected receivers are pruned on the next notification.
    pub fn subscribe(&self, submission_id: SubmissionId) -> mpsc::Receiver<StoreChange> {
        let (tx, rx) = mpsc::channel();
        let mut inner = self.lock();
        inner.watchers.entry(submission_id).or_default().push(tx);
        rx
    }

    /// Inserts a submission and its file rows in one transaction,
    /// returning the new submission id.
    pub fn insert_submission(
        &self,
        submission: &NewSubmission,
        files: &[NewFile],
    ) -> Result<SubmissionId> {
        let mut inner = self.lock();
        let tx = inner.conn.transaction()?;
        tx.execute(
            "INSERT INTO submission (assignment_id, course_id, assignment_name, kind, entry, \
             is_draft, file_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                submission.assignment_id,
                submission.course_id,
                &submission.assignment_name,
                submission.kind.as_str(),
                submission.entry,
                submission.is_draft,
                files.len() as i64,
            ],
        )?;
        let id = tx.last_insert_rowid();
        for file in files {
            tx.execute(
                "INSERT INTO submission_file (submission_id, name, size, content_type, local_path)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    id,
                    &file.name,
                    file.size as i64,
                    &file.content_type,
                    &file.local_path,
                ],
            )?;
        }
        tx.commit()?;
        Ok(id)
    }

    /// Loads a single submission row, or `None` when it has been
    /// deleted (completed or cancelled).
    pub fn find_submission(&self, id: SubmissionId) -> Result<Option<SubmissionRow>> {
        let inner = self.lock();
        let raw = inner
            .conn
            .query_row(
                &format!("SELECT {SUBMISSION_COLUMNS} FROM submission WHERE id = ?1"),
                rusqlite::params![id],
                decode_submission,
            )
            .optional()?;
        raw.map(RawSubmission::into_row).transpose()
    }

    /// Loads the file rows of a submission, ordered by id (the upload
    /// order).
    pub fn find_files(&self, submission_id: SubmissionId) -> Result<Vec<FileRow>> {
        let inner = self.lock();
        let mut stmt = inner.conn.prepare(&format!(
            "SELECT {FILE_COLUMNS} FROM submission_file WHERE submission_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(rusqlite::params![submission_id], decode_file)?;
        let mut files = Vec::new();
        for row in rows {
            files.push(row?);
        }
        Ok(files)
    }

    pub fn find_file(&self, file_id: FileId) -> Result<Option<FileRow>> {
        let inner = self.lock();
        let row = inner
            .conn
            .query_row(
                &format!("SELECT {FILE_COLUMNS} FROM submission_file WHERE id = ?1"),
                rusqlite::params![file_id],
                decode_file,
            )
            .optional()?;
        Ok(row)
    }

    /// Loads the single file of a media submission.
    pub fn find_file_for_submission(&self, submission_id: SubmissionId) -> Result<Option<FileRow>> {
        let inner = self.lock();
        let row = inner
            .conn
            .query_row(
                &format!(
                    "SELECT {FILE_COLUMNS} FROM submission_file \
                     WHERE submission_id = ?1 ORDER BY id LIMIT 1"
                ),
                rusqlite::params![submission_id],
                decode_file,
            )
            .optional()?;
        Ok(row)
    }

    /// All non-draft submissions, oldest first. Used to resume the
    /// queue after a process restart.
    pub fn pending_submissions(&self) -> Result<Vec<SubmissionRow>> {
        let inner = self.lock();
        let mut stmt = inner.conn.prepare(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submission WHERE is_draft = 0 ORDER BY id"
        ))?;
        let rows = stmt.query_map([], decode_submission)?;
        let mut submissions = Vec::new();
        for row in rows {
            submissions.push(row?.into_row()?);
        }
        Ok(submissions)
    }

    /// Deletes a submission; its file rows go with it via the cascade.
    /// Deleting an already-gone row is not an error.
    pub fn delete_submission(&self, id: SubmissionId) -> Result<()> {
        let mut inner = self.lock();
        let rows = inner
            .conn
            .execute("DELETE FROM submission WHERE id = ?1", rusqlite::params![id])?;
        if rows > 0 {
            inner.notify(id, StoreChange::Submission);
        }
        Ok(())
    }

    /// Deletes one file row. When it was the submission's last file the
    /// submission row is deleted in the same transaction, so no empty
    /// file-submission can be observed.
    pub fn delete_file(&self, file_id: FileId) -> Result<()> {
        let mut inner = self.lock();
        let submission_id;
        let submission_deleted;
        {
            let tx = inner.conn.transaction()?;
            let owner: Option<SubmissionId> = tx
                .query_row(
                    "SELECT submission_id FROM submission_file WHERE id = ?1",
                    rusqlite::params![file_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(owner) = owner else {
                return Ok(());
            };
            tx.execute(
                "DELETE FROM submission_file WHERE id = ?1",
                rusqlite::params![file_id],
            )?;
            let remaining: i64 = tx.query_row(
                "SELECT COUNT(*) FROM submission_file WHERE submission_id = ?1",
                rusqlite::params![owner],
                |row| row.get(0),
            )?;
            if remaining == 0 {
                tx.execute(
                    "DELETE FROM submission WHERE id = ?1",
                    rusqlite::params![owner],
                )?;
            }
            tx.commit()?;
            submission_id = owner;
            submission_deleted = remaining == 0;
        }
        inner.notify(submission_id, StoreChange::Files);
        if submission_deleted {
            inner.notify(submission_id, StoreChange::Submission);
        }
        Ok(())
    }

    /// Deletes every file row of a submission, leaving the submission
    /// row in place.
    pub fn delete_files_for_submission(&self, submission_id: SubmissionId) -> Result<()> {
        let mut inner = self.lock();
        let rows = inner.conn.execute(
            "DELETE FROM submission_file WHERE submission_id = ?1",
            rusqlite::params![submission_id],
        )?;
        if rows > 0 {
            inner.notify(submission_id, StoreChange::Files);
        }
        Ok(())
    }

    /// Removes every previous attempt for an assignment and returns
    /// the local paths whose temp files became orphaned. A path is
    /// kept out of the result when the new attempt reuses it
    /// (`keep_paths`) or another submission still references it.
    pub fn delete_for_assignment(
        &self,
        assignment_id: i64,
        keep_paths: &[String],
    ) -> Result<Vec<String>> {
        let mut inner = self.lock();
        let ids;
        let orphaned;
        {
            let tx = inner.conn.transaction()?;
            ids = {
                let mut stmt = tx.prepare("SELECT id FROM submission WHERE assignment_id = ?1")?;
                let rows = stmt.query_map(rusqlite::params![assignment_id], |row| {
                    row.get::<_, SubmissionId>(0)
                })?;
                let mut ids: Vec<SubmissionId> = Vec::new();
                for row in rows {
                    ids.push(row?);
                }
                ids
            };
            let mut candidates: Vec<String> = Vec::new();
            {
                let mut stmt = tx.prepare(
                    "SELECT local_path FROM submission_file WHERE submission_id = ?1",
                )?;
                for id in &ids {
                    let rows = stmt.query_map(rusqlite::params![id], |row| {
                        row.get::<_, String>(0)
                    })?;
                    for row in rows {
                        candidates.push(row?);
                    }
                }
            }
            tx.execute(
                "DELETE FROM submission WHERE assignment_id = ?1",
                rusqlite::params![assignment_id],
            )?;

            let mut paths: Vec<String> = Vec::new();
            for path in candidates {
                if keep_paths.contains(&path) || paths.contains(&path) {
                    continue;
                }
                // Still referenced means another assignment's rows
                // share the temp file.
                let referenced: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM submission_file WHERE local_path = ?1)",
                    rusqlite::params![path],
                    |row| row.get(0),
                )?;
                if !referenced {
                    paths.push(path);
                }
            }
            tx.commit()?;
            orphaned = paths;
        }
        for id in ids {
            inner.notify(id, StoreChange::Submission);
        }
        Ok(orphaned)
    }

    /// The draft row for an assignment, if one was saved.
    pub fn find_draft(&self, assignment_id: i64) -> Result<Option<SubmissionRow>> {
        let inner = self.lock();
        let raw = inner
            .conn
            .query_row(
                &format!(
                    "SELECT {SUBMISSION_COLUMNS} FROM submission \
                     WHERE assignment_id = ?1 AND is_draft = 1 ORDER BY id LIMIT 1"
                ),
                rusqlite::params![assignment_id],
                decode_submission,
            )
            .optional()?;
        raw.map(RawSubmission::into_row).transpose()
    }

    /// Removes any draft rows for an assignment.
    pub fn delete_draft(&self, assignment_id: i64) -> Result<()> {
        let mut inner = self.lock();
        let ids;
        {
            let tx = inner.conn.transaction()?;
            ids = {
                let mut stmt = tx
                    .prepare("SELECT id FROM submission WHERE assignment_id = ?1 AND is_draft = 1")?;
                let rows = stmt.query_map(rusqlite::params![assignment_id], |row| {
                    row.get::<_, SubmissionId>(0)
                })?;
                let mut ids: Vec<SubmissionId> = Vec::new();
                for row in rows {
                    ids.push(row?);
                }
                ids
            };
            tx.execute(
                "DELETE FROM submission WHERE assignment_id = ?1 AND is_draft = 1",
                rusqlite::params![assignment_id],
            )?;
            tx.commit()?;
        }
        for id in ids {
            inner.notify(id, StoreChange::Submission);
        }
        Ok(())
    }

    /// Worker-side write: where the transfer currently stands. Writing
    /// to a deleted row affects nothing (the delete won the race).
    pub fn update_progress(
        &self,
        id: SubmissionId,
        current_file: u32,
        file_count: u32,
        fraction: f64,
    ) -> Result<()> {
        let mut inner = self.lock();
        let rows = inner.conn.execute(
            "UPDATE submission SET current_file = ?2, file_count = ?3, progress = ?4 WHERE id = ?1",
            rusqlite::params![id, current_file, file_count, fraction],
        )?;
        if rows > 0 {
            inner.notify(id, StoreChange::Submission);
        }
        Ok(())
    }

    /// Worker-side write: flips the submission error flag.
    pub fn set_submission_failed(&self, id: SubmissionId, failed: bool) -> Result<()> {
        let mut inner = self.lock();
        let rows = inner.conn.execute(
            "UPDATE submission SET failed = ?2 WHERE id = ?1",
            rusqlite::params![id, failed],
        )?;
        if rows > 0 {
            inner.notify(id, StoreChange::Submission);
        }
        Ok(())
    }

    /// Worker-side write: records the remote attachment id after a
    /// confirmed upload and clears any previous error.
    pub fn set_file_uploaded(&self, file_id: FileId, attachment_id: i64) -> Result<()> {
        let mut inner = self.lock();
        let owner: Option<SubmissionId> = inner
            .conn
            .query_row(
                "SELECT submission_id FROM submission_file WHERE id = ?1",
                rusqlite::params![file_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(owner) = owner else {
            return Ok(());
        };
        inner.conn.execute(
            "UPDATE submission_file SET attachment_id = ?2, failed = 0, error = NULL WHERE id = ?1",
            rusqlite::params![file_id, attachment_id],
        )?;
        inner.notify(owner, StoreChange::Files);
        Ok(())
    }

    /// Worker-side write: records a per-file upload failure.
    pub fn set_file_error(&self, file_id: FileId, message: &str) -> Result<()> {
        let mut inner = self.lock();
        let owner: Option<SubmissionId> = inner
            .conn
            .query_row(
                "SELECT submission_id FROM submission_file WHERE id = ?1",
                rusqlite::params![file_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(owner) = owner else {
            return Ok(());
        };
        inner.conn.execute(
            "UPDATE submission_file SET failed = 1, error = ?2 WHERE id = ?1",
            rusqlite::params![file_id, message],
        )?;
        inner.notify(owner, StoreChange::Files);
        Ok(())
    }
}

struct RawSubmission {
    id: SubmissionId,
    assignment_id: i64,
    course_id: i64,
    assignment_name: String,
    kind: String,
    entry: Option<String>,
    failed: bool,
    is_draft: bool,
    current_file: u32,
    file_count: u32,
    progress: Option<f64>,
}

impl RawSubmission {
    fn into_row(self) -> Result<SubmissionRow> {
        let kind = SubmissionKind::parse(&self.kind)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown submission kind: {}", self.kind)))?;
        Ok(SubmissionRow {
            id: self.id,
            assignment_id: self.assignment_id,
            course_id: self.course_id,
            assignment_name: self.assignment_name,
            kind,
            entry: self.entry,
            failed: self.failed,
            is_draft: self.is_draft,
            current_file: self.current_file,
            file_count: self.file_count,
            progress: self.progress,
        })
    }
}

fn decode_submission(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSubmission> {
    Ok(RawSubmission {
        id: row.get(0)?,
        assignment_id: row.get(1)?,
        course_id: row.get(2)?,
        assignment_name: row.get(3)?,
        kind: row.get(4)?,
        entry: row.get(5)?,
        failed: row.get(6)?,
        is_draft: row.get(7)?,
        current_file: row.get(8)?,
        file_count: row.get(9)?,
        progress: row.get(10)?,
    })
}

fn decode_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRow> {
    Ok(FileRow {
        id: row.get(0)?,
        submission_id: row.get(1)?,
        name: row.get(2)?,
        size: row.get::<_, i64>(3)? as u64,
        content_type: row.get(4)?,
        local_path: row.get(5)?,
        attachment_id: row.get(6)?,
        failed: row.get(7)?,
        error: row.get(8)?,
    })
}
