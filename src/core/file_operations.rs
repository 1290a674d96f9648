use crate::core::payload_parser::{self, RecordResult};
use crate::domain::error::ApplyError;
use crate::domain::models::{Action, ApplySummary, OperationRecord, RunResult};
use log::{debug, info, warn};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Applies operation records under one workspace root, strictly in order.
///
/// The first failing operation stops the batch. Earlier operations stay
/// applied; there is no rollback.
pub struct FileOperationApplier {
    root: PathBuf,
}

impl FileOperationApplier {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn apply(&self, operations: &[OperationRecord]) -> Result<ApplySummary, ApplyError> {
        let mut summary = ApplySummary::default();
        for op in operations {
            self.apply_one(op, &mut summary)?;
        }
        info!("Applied {} operations", summary.applied());
        Ok(summary)
    }

    /// Like [`apply`](Self::apply), but record-level decode errors are raised
    /// only when the batch reaches them.
    pub fn apply_decoded(&self, records: Vec<RecordResult>) -> Result<ApplySummary, ApplyError> {
        let mut summary = ApplySummary::default();
        for record in records {
            let op = record?;
            self.apply_one(&op, &mut summary)?;
        }
        info!("Applied {} operations", summary.applied());
        Ok(summary)
    }

    /// Join a record path onto the root, refusing anything that could land outside it.
    pub fn resolve(&self, op: &OperationRecord) -> Result<PathBuf, ApplyError> {
        let escape = || ApplyError::PathEscape {
            action: op.action,
            path: op.path.clone(),
        };

        let mut relative = PathBuf::new();
        for component in Path::new(&op.path).components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(escape());
                }
            }
        }
        if relative.as_os_str().is_empty() {
            return Err(escape());
        }
        Ok(self.root.join(relative))
    }

    /// Reject `target` when the nearest entry that exists on disk resolves
    /// outside the root through a symlink.
    ///
    /// Writes follow a symlink at the target itself, so the check starts
    /// there; a delete removes the link rather than what it points to, so
    /// the check starts at the parent.
    fn ensure_contained(&self, op: &OperationRecord, target: &Path) -> Result<(), ApplyError> {
        let Ok(real_root) = fs::canonicalize(&self.root) else {
            return Ok(());
        };
        let start = match op.action {
            Action::Delete => target.parent(),
            Action::Create | Action::Replace => Some(target),
        };
        let Some(start) = start else {
            return Ok(());
        };

        for candidate in start.ancestors().take_while(|p| p.starts_with(&self.root)) {
            if fs::symlink_metadata(candidate).is_err() {
                continue;
            }
            return match fs::canonicalize(candidate) {
                Ok(real) if real.starts_with(&real_root) => Ok(()),
                _ => {
                    warn!("{} resolves outside {}", op.path, self.root.display());
                    Err(ApplyError::PathEscape {
                        action: op.action,
                        path: op.path.clone(),
                    })
                }
            };
        }
        Ok(())
    }

    fn apply_one(&self, op: &OperationRecord, summary: &mut ApplySummary) -> Result<(), ApplyError> {
        let target = self.resolve(op)?;
        self.ensure_contained(op, &target)?;
        let failed = |source: io::Error| ApplyError::OperationFailed {
            action: op.action,
            path: op.path.clone(),
            source,
        };

        match op.action {
            Action::Create => {
                if target.exists() {
                    warn!("{} already exists, overwriting", op.path);
                    summary.overwritten.push(target.clone());
                }
                write_with_parents(&target, &op.content).map_err(failed)?;
                summary.created += 1;
                info!("Created {}", op.path);
            }
            Action::Replace => {
                write_with_parents(&target, &op.content).map_err(failed)?;
                summary.replaced += 1;
                info!("Replaced {}", op.path);
            }
            Action::Delete => match fs::symlink_metadata(&target) {
                Ok(meta) => {
                    if meta.is_dir() {
                        fs::remove_dir_all(&target).map_err(failed)?;
                    } else {
                        fs::remove_file(&target).map_err(failed)?;
                    }
                    summary.deleted += 1;
                    info!("Deleted {}", op.path);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("{} does not exist, nothing to delete", op.path);
                    summary.missing_deletes += 1;
                }
                Err(e) => return Err(failed(e)),
            },
        }
        Ok(())
    }
}

fn write_with_parents(target: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(target, content)
}

/// Decode `raw` and apply it under `root`, reporting the outcome as a message.
///
/// A payload that cannot be decoded never touches disk. With
/// `validate_upfront` every record must be valid before the first write;
/// otherwise a bad record stops the batch where it appears.
pub fn run_file_operations(root: &Path, raw: &str, validate_upfront: bool) -> RunResult {
    match execute(root, raw, validate_upfront) {
        Ok(summary) => RunResult {
            success: true,
            message: describe(&summary),
        },
        Err(e) => {
            warn!("File operations failed: {}", e);
            RunResult {
                success: false,
                message: e.to_string(),
            }
        }
    }
}

fn execute(root: &Path, raw: &str, validate_upfront: bool) -> Result<ApplySummary, ApplyError> {
    let applier = FileOperationApplier::new(root);
    if validate_upfront {
        let operations = payload_parser::parse(raw)?;
        applier.apply(&operations)
    } else {
        let records = payload_parser::decode(raw)?;
        applier.apply_decoded(records)
    }
}

fn describe(summary: &ApplySummary) -> String {
    let mut message = format!(
        "Applied {} file operations ({} created, {} replaced, {} deleted",
        summary.applied(),
        summary.created,
        summary.replaced,
        summary.deleted
    );
    if summary.missing_deletes > 0 {
        message.push_str(&format!(", {} already absent", summary.missing_deletes));
    }
    message.push(')');
    if !summary.overwritten.is_empty() {
        message.push_str(&format!(
            "; {} existing files overwritten",
            summary.overwritten.len()
        ));
    }
    message
}
