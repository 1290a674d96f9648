use crate::core::ignore_rules::{IgnoreRules, IgnoreStack};
use crate::domain::models::FileSystemEntry;
use log::{debug, warn};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Paths collected from a subtree walk, plus the number of I/O failures that
/// were skipped along the way.
#[derive(Debug, Default, Clone)]
pub struct Enumeration {
    pub paths: Vec<PathBuf>,
    pub errors: usize,
}

impl Enumeration {
    pub fn is_partial(&self) -> bool {
        self.errors > 0
    }
}

/// List one directory for a tree view. Hidden entries are omitted; directories
/// come first, then files, each sorted by name. Unreadable directories list as empty.
pub fn list_dir(dir: &Path) -> Vec<FileSystemEntry> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot list {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut result: Vec<FileSystemEntry> = entries
        .filter_map(Result::ok)
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| {
            let is_dir = e.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
            FileSystemEntry::new(e.path(), is_dir)
        })
        .collect();

    result.sort_by(|a, b| {
        b.is_directory
            .cmp(&a.is_directory)
            .then_with(|| a.name.cmp(&b.name))
    });
    result
}

/// Every descendant of `dir` that survives ignore filtering. Ignored
/// directories are not descended. Each directory entered adds its own
/// `.gitignore` on top of `stack` for its subtree only.
pub fn collect_selectable(dir: &Path, stack: &IgnoreStack, rules: &IgnoreRules) -> Enumeration {
    let mut out = Enumeration::default();
    descend_filtered(dir, stack, rules, &mut out);
    debug!(
        "Collected {} selectable paths under {} ({} errors)",
        out.paths.len(),
        dir.display(),
        out.errors
    );
    out
}

fn descend_filtered(dir: &Path, stack: &IgnoreStack, rules: &IgnoreRules, out: &mut Enumeration) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Skipping unreadable directory {}: {}", dir.display(), e);
            out.errors += 1;
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry in {}: {}", dir.display(), e);
                out.errors += 1;
                continue;
            }
        };

        let path = entry.path();
        let is_dir = match entry.file_type() {
            Ok(ft) => ft.is_dir(),
            Err(e) => {
                debug!("Cannot stat {}: {}", path.display(), e);
                out.errors += 1;
                continue;
            }
        };

        if rules.is_ignored(stack, &path, is_dir) {
            debug!("Ignoring {}", path.display());
            continue;
        }

        out.paths.push(path.clone());
        if is_dir {
            let child_stack = stack.enter(&path);
            descend_filtered(&path, &child_stack, rules, out);
        }
    }
}

/// Every descendant of `dir`, with no filtering at all.
pub fn collect_all_descendants(dir: &Path) -> Enumeration {
    let mut out = Enumeration::default();

    for entry in walkdir::WalkDir::new(dir).min_depth(1) {
        match entry {
            Ok(entry) => out.paths.push(entry.into_path()),
            Err(e) => {
                debug!("Skipping during walk of {}: {}", dir.display(), e);
                out.errors += 1;
            }
        }
    }

    debug!(
        "Collected {} descendants under {} ({} errors)",
        out.paths.len(),
        dir.display(),
        out.errors
    );
    out
}

pub fn read_file_contents(path: &Path) -> anyhow::Result<String> {
    if !path.exists() {
        warn!("File does not exist: {}", path.display());
        return Ok(String::new());
    }
    if !path.is_file() {
        warn!("Not a file: {}", path.display());
        return Ok(String::new());
    }
    if path.metadata()?.len() == 0 {
        debug!("File is empty: {}", path.display());
        return Ok(String::new());
    }

    debug!("Reading file contents: {}", path.display());
    let mut file = fs::File::open(path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    debug!("Read {} bytes from file", contents.len());
    Ok(contents)
}
