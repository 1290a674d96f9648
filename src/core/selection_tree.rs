use crate::core::ignore_rules::{IgnoreRules, IgnoreStack};
use crate::domain::config::WorkspaceConfig;
use crate::domain::models::FileSystemEntry;
use crate::infra::file_system::{Enumeration, collect_all_descendants, collect_selectable};
use log::{debug, info};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Result of one toggle, for logging and host diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub path: PathBuf,
    pub selected: bool,
    /// Paths added or removed, the toggled path included.
    pub affected: usize,
    /// I/O failures swallowed while walking a directory.
    pub errors: usize,
}

/// The set of paths marked for inclusion in a bundle.
///
/// Membership does not track the disk: a path stays selected after it is
/// deleted until a toggle or a deletion notice removes it.
#[derive(Debug, Clone)]
pub struct SelectionTree {
    root: PathBuf,
    rules: IgnoreRules,
    selected: HashSet<PathBuf>,
}

impl SelectionTree {
    pub fn new(root: impl Into<PathBuf>, rules: IgnoreRules) -> Self {
        Self {
            root: root.into(),
            rules,
            selected: HashSet::new(),
        }
    }

    pub fn from_config(config: &WorkspaceConfig) -> Self {
        Self::new(
            config.root.clone(),
            IgnoreRules::new(config.ignored_names.clone()),
        )
    }

    pub fn is_selected(&self, path: &Path) -> bool {
        self.selected.contains(path)
    }

    /// Selected paths in no particular order.
    pub fn selected_paths(&self) -> Vec<PathBuf> {
        self.selected.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Flip the selection state of `entry`.
    ///
    /// Files flip alone and are never filtered. A directory flips together
    /// with its subtree: selecting walks with ignore filtering (ignored
    /// directories are pruned), deselecting walks everything so that no
    /// hidden selection is left behind. The subtree is enumerated before the
    /// set is touched, so callers never observe a half-applied toggle. Selected
    /// paths under the directory that the walk no longer reaches, such as
    /// entries removed from disk without a notice, are cleared as well.
    pub fn toggle(&mut self, entry: &FileSystemEntry) -> ToggleOutcome {
        let path = entry.full_path.clone();
        let select = !self.is_selected(&path);

        if !entry.is_directory {
            if select {
                self.selected.insert(path.clone());
            } else {
                self.selected.remove(&path);
            }
            debug!(
                "{} file {}",
                if select { "Selected" } else { "Deselected" },
                path.display()
            );
            return ToggleOutcome {
                path,
                selected: select,
                affected: 1,
                errors: 0,
            };
        }

        let descendants = self.enumerate_subtree(&path, select);
        let affected = self.apply(&path, &descendants.paths, select);

        if descendants.is_partial() {
            debug!(
                "Walk of {} skipped {} unreadable entries",
                path.display(),
                descendants.errors
            );
        }
        info!(
            "{} directory {} ({} paths)",
            if select { "Selected" } else { "Deselected" },
            path.display(),
            affected
        );

        ToggleOutcome {
            path,
            selected: select,
            affected,
            errors: descendants.errors,
        }
    }

    fn enumerate_subtree(&self, dir: &Path, select: bool) -> Enumeration {
        if select {
            let stack = IgnoreStack::for_scope(&self.root, dir);
            collect_selectable(dir, &stack, &self.rules)
        } else {
            collect_all_descendants(dir)
        }
    }

    fn apply(&mut self, dir: &Path, descendants: &[PathBuf], select: bool) -> usize {
        if !select {
            let before = self.selected.len();
            self.selected.retain(|p| !p.starts_with(dir));
            return before - self.selected.len();
        }

        let mut affected = 0;
        for path in std::iter::once(dir).chain(descendants.iter().map(PathBuf::as_path)) {
            if self.selected.insert(path.to_path_buf()) {
                affected += 1;
            }
        }
        affected
    }

    pub(crate) fn insert(&mut self, path: PathBuf) -> bool {
        self.selected.insert(path)
    }

    pub(crate) fn remove(&mut self, path: &Path) -> bool {
        self.selected.remove(path)
    }
}
