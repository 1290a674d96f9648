use crate::core::change_sync::{self, TreeChange};
use crate::core::context_generator::{build_bundle, collect_files, format_bundle};
use crate::core::file_operations::run_file_operations;
use crate::core::selection_tree::SelectionTree;
use crate::domain::config::WorkspaceConfig;
use crate::domain::models::{FileSystemEntry, RunResult};
use crate::infra::file_system::{list_dir, read_file_contents};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Hook the host uses to redraw its tree view after the selection changes.
pub trait RefreshListener {
    fn refresh(&self);
}

impl<F: Fn()> RefreshListener for F {
    fn refresh(&self) {
        self()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Request {
    ToggleSelection { path: PathBuf, is_directory: bool },
    GetSelectedPaths,
    NotifyCreated { path: PathBuf },
    NotifyDeleted { path: PathBuf },
    RunFileOperations { payload: String },
    ListDirectory { path: Option<PathBuf> },
    BuildBundle { prompt: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Response {
    Toggled {
        path: PathBuf,
        selected: bool,
        affected: usize,
        errors: usize,
    },
    Selected { paths: Vec<PathBuf> },
    Synced { changed: bool },
    OperationResult(RunResult),
    Entries { entries: Vec<FileSystemEntry> },
    Bundle { text: String, file_count: usize },
    Error { message: String },
}

/// Owns the selection for one workspace and answers host messages.
pub struct Session {
    config: WorkspaceConfig,
    tree: SelectionTree,
    listener: Box<dyn RefreshListener>,
}

impl Session {
    pub fn new(config: WorkspaceConfig) -> Self {
        Self::with_listener(config, || {})
    }

    pub fn with_listener(config: WorkspaceConfig, listener: impl RefreshListener + 'static) -> Self {
        let tree = SelectionTree::from_config(&config);
        Self {
            config,
            tree,
            listener: Box::new(listener),
        }
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn tree(&self) -> &SelectionTree {
        &self.tree
    }

    pub fn handle(&mut self, request: Request) -> Response {
        debug!("Handling {:?}", request);
        match request {
            Request::ToggleSelection { path, is_directory } => {
                let entry = FileSystemEntry::new(self.config.resolve(path), is_directory);
                let outcome = self.tree.toggle(&entry);
                self.listener.refresh();
                Response::Toggled {
                    path: outcome.path,
                    selected: outcome.selected,
                    affected: outcome.affected,
                    errors: outcome.errors,
                }
            }
            Request::GetSelectedPaths => Response::Selected {
                paths: self.selected_paths(),
            },
            Request::NotifyCreated { path } => {
                self.sync(TreeChange::Created(self.config.resolve(path)))
            }
            Request::NotifyDeleted { path } => {
                self.sync(TreeChange::Deleted(self.config.resolve(path)))
            }
            Request::RunFileOperations { payload } => Response::OperationResult(run_file_operations(
                &self.config.root,
                &payload,
                self.config.validate_upfront,
            )),
            Request::ListDirectory { path } => {
                let dir = match path {
                    Some(p) => self.config.resolve(p),
                    None => self.config.root.clone(),
                };
                Response::Entries {
                    entries: list_dir(&dir),
                }
            }
            Request::BuildBundle { prompt } => {
                let (text, file_count) = self.bundle(prompt);
                Response::Bundle { text, file_count }
            }
        }
    }

    /// Selected paths, sorted for stable output.
    pub fn selected_paths(&self) -> Vec<PathBuf> {
        let mut paths = self.tree.selected_paths();
        paths.sort();
        paths
    }

    /// Toggle by path, resolving relative paths against the root and
    /// detecting whether the target is a directory.
    pub fn toggle_path(&mut self, path: impl AsRef<Path>) -> Response {
        let full = self.config.resolve(path);
        let is_directory = full.is_dir();
        self.handle(Request::ToggleSelection {
            path: full,
            is_directory,
        })
    }

    /// The formatted bundle text and the number of files in it.
    pub fn bundle(&self, prompt: Option<String>) -> (String, usize) {
        let files = collect_files(&self.selected_paths(), &self.config, read_file_contents);
        let bundle = build_bundle(files, &self.config.root, prompt);
        (format_bundle(&bundle), bundle.file_count)
    }

    fn sync(&mut self, change: TreeChange) -> Response {
        let changed = change_sync::sync(&mut self.tree, &change);
        self.listener.refresh();
        Response::Synced { changed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::fs;
    use std::rc::Rc;
    use tempfile::TempDir;

    fn workspace() -> (TempDir, WorkspaceConfig) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("other")).unwrap();
        fs::write(root.join("src/lib.rs"), "pub fn a() {}").unwrap();
        fs::write(root.join("README.md"), "# Demo").unwrap();
        let config = WorkspaceConfig::new(root);
        (temp_dir, config)
    }

    #[test]
    fn test_messages_drive_selection_and_refresh() {
        let (_temp_dir, config) = workspace();
        let root = config.root.clone();
        let refreshes = Rc::new(Cell::new(0));
        let counter = refreshes.clone();
        let mut session = Session::with_listener(config, move || counter.set(counter.get() + 1));

        let response = session.handle(Request::ToggleSelection {
            path: PathBuf::from("src"),
            is_directory: true,
        });
        assert!(matches!(response, Response::Toggled { selected: true, affected: 2, .. }));

        session.handle(Request::NotifyCreated {
            path: PathBuf::from("src/new.ts"),
        });
        session.handle(Request::NotifyCreated {
            path: PathBuf::from("other/new.ts"),
        });
        session.handle(Request::NotifyDeleted {
            path: PathBuf::from("src/lib.rs"),
        });

        assert_eq!(
            session.handle(Request::GetSelectedPaths),
            Response::Selected {
                paths: vec![root.join("src"), root.join("src/new.ts")]
            }
        );
        assert_eq!(refreshes.get(), 4);
    }

    #[test]
    fn test_run_file_operations_message() {
        let (_temp_dir, config) = workspace();
        let root = config.root.clone();
        let mut session = Session::new(config);

        let response = session.handle(Request::RunFileOperations {
            payload: r#"[{"action":"replace","path":"src/lib.rs","content":"pub fn b() {}"}]"#.to_string(),
        });
        match response {
            Response::OperationResult(result) => assert!(result.success, "{}", result.message),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(fs::read_to_string(root.join("src/lib.rs")).unwrap(), "pub fn b() {}");

        let response = session.handle(Request::RunFileOperations {
            payload: "not a payload".to_string(),
        });
        assert!(matches!(response, Response::OperationResult(RunResult { success: false, .. })));
    }

    #[test]
    fn test_bundle_from_selection() {
        let (_temp_dir, config) = workspace();
        let mut session = Session::new(config);
        session.toggle_path("src");
        session.toggle_path("README.md");

        let (text, count) = session.bundle(Some("Explain".to_string()));
        assert_eq!(count, 2);
        assert!(text.contains("├── README.md\n├── src/lib.rs\n"));
        assert!(text.contains("pub fn a() {}"));
        assert!(text.ends_with("<user_instructions>\nExplain\n</user_instructions>"));
    }

    #[test]
    fn test_list_directory_message() {
        let (_temp_dir, config) = workspace();
        let mut session = Session::new(config);

        match session.handle(Request::ListDirectory { path: None }) {
            Response::Entries { entries } => {
                let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
                assert_eq!(names, vec!["other", "src", "README.md"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_request_wire_shape() {
        let request: Request =
            serde_json::from_str(r#"{"command":"toggleSelection","path":"src","isDirectory":true}"#).unwrap();
        assert_eq!(
            request,
            Request::ToggleSelection {
                path: PathBuf::from("src"),
                is_directory: true
            }
        );

        let request: Request = serde_json::from_str(r#"{"command":"getSelectedPaths"}"#).unwrap();
        assert_eq!(request, Request::GetSelectedPaths);

        let json = serde_json::to_value(Response::OperationResult(RunResult {
            success: true,
            message: "ok".to_string(),
        }))
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "operationResult", "success": true, "message": "ok"})
        );
    }
}
