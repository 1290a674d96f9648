use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One entry of a directory listing. Produced on demand, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemEntry {
    pub name: String,
    pub full_path: PathBuf,
    pub is_directory: bool,
}

impl FileSystemEntry {
    pub fn new(full_path: PathBuf, is_directory: bool) -> Self {
        let name = full_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            name,
            full_path,
            is_directory,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Delete,
    Replace,
}

impl Action {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "create" => Some(Action::Create),
            "delete" => Some(Action::Delete),
            "replace" => Some(Action::Replace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Delete => "delete",
            Action::Replace => "replace",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized create/delete/replace instruction, independent of the wire
/// format it was decoded from. `path` is relative to the workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRecord {
    pub action: Action,
    pub path: String,
    pub content: String,
}

impl OperationRecord {
    pub fn new(action: Action, path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            action,
            path: path.into(),
            content: content.into(),
        }
    }
}

/// What a batch did to disk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplySummary {
    pub created: usize,
    pub replaced: usize,
    pub deleted: usize,
    pub missing_deletes: usize,
    pub overwritten: Vec<PathBuf>,
}

impl ApplySummary {
    pub fn applied(&self) -> usize {
        self.created + self.replaced + self.deleted + self.missing_deletes
    }
}

/// The `{success, message}` reply handed back to the host after a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct FileContext {
    pub path: PathBuf,
    pub content: String,
}

#[derive(Debug)]
pub struct Bundle {
    pub file_map: String,
    pub file_contents: String,
    pub user_instructions: String,
    pub file_count: usize,
}
