/// Identifier of a persisted submission row.
pub type SubmissionId = i64;

/// Identifier of a persisted submission file row.
pub type FileId = i64;

/// A local file staged on the picker screen, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedFile {
    pub name: String,
    pub size: u64,
    pub content_type: String,
    pub path: String,
    pub error: Option<String>,
}

/// A persisted file row as shown on the upload status screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFile {
    pub id: FileId,
    pub name: String,
    pub size: u64,
    pub failed: bool,
    pub error: Option<String>,
}
