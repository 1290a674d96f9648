use crate::core::selection_tree::SelectionTree;
use log::debug;
use std::path::{Path, PathBuf};

/// A filesystem change reported by the host's watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeChange {
    Created(PathBuf),
    Deleted(PathBuf),
}

/// Reconcile `tree` with one change. Returns true when the selection changed.
pub fn sync(tree: &mut SelectionTree, change: &TreeChange) -> bool {
    match change {
        TreeChange::Created(path) => handle_created(tree, path),
        TreeChange::Deleted(path) => handle_deleted(tree, path),
    }
}

/// A new path inherits selection from the nearest selected ancestor, if any.
pub fn handle_created(tree: &mut SelectionTree, path: &Path) -> bool {
    match selected_ancestor(tree, path) {
        Some(ancestor) => {
            debug!(
                "{} created under selected {}",
                path.display(),
                ancestor.display()
            );
            tree.insert(path.to_path_buf())
        }
        None => false,
    }
}

pub fn handle_deleted(tree: &mut SelectionTree, path: &Path) -> bool {
    let removed = tree.remove(path);
    if removed {
        debug!("Dropped deleted path {} from selection", path.display());
    }
    removed
}

fn selected_ancestor<'a>(tree: &SelectionTree, path: &'a Path) -> Option<&'a Path> {
    path.ancestors().skip(1).find(|ancestor| tree.is_selected(ancestor))
}
