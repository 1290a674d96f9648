use ignore::gitignore::{Gitignore, GitignoreBuilder};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const GITIGNORE_FILE: &str = ".gitignore";

/// Compiled `.gitignore` patterns scoped to one directory level.
#[derive(Debug, Clone)]
pub struct IgnoreContext {
    scope_root: PathBuf,
    matcher: Gitignore,
}

impl IgnoreContext {
    /// Compile `.gitignore`-syntax text for `scope_root`. Returns `None` when
    /// the text holds no usable pattern.
    pub fn build(scope_root: &Path, pattern_text: &str) -> Option<Self> {
        let mut builder = GitignoreBuilder::new(scope_root);

        // Leading whitespace is part of a pattern; the builder strips the rest.
        for line in pattern_text.lines() {
            let line = line.trim_end_matches('\r');
            if let Err(e) = builder.add_line(None, line) {
                debug!(
                    "Skipping bad ignore pattern {:?} in {}: {}",
                    line,
                    scope_root.display(),
                    e
                );
            }
        }

        match builder.build() {
            Ok(matcher) if matcher.is_empty() => None,
            Ok(matcher) => {
                debug!(
                    "Compiled {} ignore patterns for {}",
                    matcher.len(),
                    scope_root.display()
                );
                Some(Self {
                    scope_root: scope_root.to_path_buf(),
                    matcher,
                })
            }
            Err(e) => {
                debug!("Failed to compile ignore rules for {}: {}", scope_root.display(), e);
                None
            }
        }
    }

    /// Read `<scope_root>/.gitignore`. An absent or unreadable file contributes nothing.
    pub fn load(scope_root: &Path) -> Option<Self> {
        let gitignore_path = scope_root.join(GITIGNORE_FILE);
        if !gitignore_path.is_file() {
            return None;
        }
        match fs::read_to_string(&gitignore_path) {
            Ok(text) => Self::build(scope_root, &text),
            Err(e) => {
                debug!("Could not read {}: {}", gitignore_path.display(), e);
                None
            }
        }
    }

    pub fn scope_root(&self) -> &Path {
        &self.scope_root
    }

    pub fn matches(&self, full_path: &Path, is_dir: bool) -> bool {
        let relative = match full_path.strip_prefix(&self.scope_root) {
            Ok(rel) => rel,
            Err(_) => return false,
        };
        if relative.as_os_str().is_empty() {
            return false;
        }
        self.matcher
            .matched_path_or_any_parents(relative, is_dir)
            .is_ignore()
    }
}

struct Frame {
    context: IgnoreContext,
    parent: Option<Arc<Frame>>,
}

/// Ignore contexts active for one branch of a descent, ordered root to leaf.
///
/// The stack is persistent: `push` returns a new stack sharing its ancestors,
/// so sibling branches never see each other's contexts.
#[derive(Clone, Default)]
pub struct IgnoreStack {
    head: Option<Arc<Frame>>,
    depth: usize,
}

impl IgnoreStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, context: IgnoreContext) -> Self {
        Self {
            head: Some(Arc::new(Frame {
                context,
                parent: self.head.clone(),
            })),
            depth: self.depth + 1,
        }
    }

    /// The stack to use inside `dir`: this one plus `dir`'s own `.gitignore`, if any.
    pub fn enter(&self, dir: &Path) -> Self {
        match IgnoreContext::load(dir) {
            Some(context) => self.push(context),
            None => self.clone(),
        }
    }

    /// Stack for a descent starting at `dir`, seeded with every `.gitignore`
    /// between `workspace_root` and `dir` inclusive.
    pub fn for_scope(workspace_root: &Path, dir: &Path) -> Self {
        let relative = match dir.strip_prefix(workspace_root) {
            Ok(rel) => rel,
            Err(_) => return Self::new().enter(dir),
        };

        let mut current = workspace_root.to_path_buf();
        let mut stack = Self::new().enter(&current);
        for component in relative.components() {
            current.push(component);
            stack = stack.enter(&current);
        }
        stack
    }

    pub fn len(&self) -> usize {
        self.depth
    }

    pub fn is_empty(&self) -> bool {
        self.depth == 0
    }

    pub fn contexts(&self) -> Vec<&IgnoreContext> {
        let mut out = Vec::with_capacity(self.depth);
        let mut frame = self.head.as_deref();
        while let Some(f) = frame {
            out.push(&f.context);
            frame = f.parent.as_deref();
        }
        out.reverse();
        out
    }

    pub fn matches(&self, full_path: &Path, is_dir: bool) -> bool {
        self.contexts()
            .into_iter()
            .any(|ctx| ctx.matches(full_path, is_dir))
    }
}

/// Name-based exclusions applied before any pattern check: hidden entries and
/// the configured names (`node_modules` by default).
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    ignored_names: Vec<String>,
}

impl IgnoreRules {
    pub fn new(ignored_names: Vec<String>) -> Self {
        Self { ignored_names }
    }

    pub fn is_excluded_name(&self, name: &str) -> bool {
        name.starts_with('.') || self.ignored_names.iter().any(|n| n == name)
    }

    pub fn is_ignored(&self, stack: &IgnoreStack, full_path: &Path, is_dir: bool) -> bool {
        let name = full_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        if self.is_excluded_name(&name) {
            return true;
        }
        stack.matches(full_path, is_dir)
    }
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self::new(
            crate::domain::config::DEFAULT_IGNORED_NAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }
}
