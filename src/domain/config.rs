use std::path::{Path, PathBuf};

pub const DEFAULT_IGNORED_NAMES: &[&str] = &["node_modules"];

pub const DEFAULT_BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "webp", "ico", "svg", "pdf",
];

#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    pub root: PathBuf,
    /// Directory or file names excluded by name when a folder selection expands.
    pub ignored_names: Vec<String>,
    /// Extensions (without the dot) left out of an assembled bundle.
    pub binary_extensions: Vec<String>,
    /// Validate every record of a batch before the first mutation.
    pub validate_upfront: bool,
}

impl WorkspaceConfig {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        Self {
            root,
            ignored_names: DEFAULT_IGNORED_NAMES.iter().map(|s| s.to_string()).collect(),
            binary_extensions: DEFAULT_BINARY_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            validate_upfront: false,
        }
    }

    pub fn with_ignored_names(mut self, names: &[&str]) -> Self {
        self.ignored_names = names
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    pub fn with_binary_extensions(mut self, extensions: &[&str]) -> Self {
        self.binary_extensions = extensions
            .iter()
            .map(|s| s.trim().trim_start_matches('.').to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    pub fn with_validate_upfront(mut self, validate_upfront: bool) -> Self {
        self.validate_upfront = validate_upfront;
        self
    }

    /// Resolve a host-supplied path against the root. Absolute paths pass through.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn is_binary(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let e = e.to_lowercase();
                self.binary_extensions.iter().any(|b| b.trim_start_matches('.') == e)
            })
            .unwrap_or(false)
    }
}
