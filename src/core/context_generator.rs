use crate::domain::config::WorkspaceConfig;
use crate::domain::models::{Bundle, FileContext};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// Read the selected files that belong in a bundle. Directories, binary
/// extensions and unreadable files are skipped. Output is sorted by path.
pub fn collect_files(
    selected: &[PathBuf],
    config: &WorkspaceConfig,
    file_reader: impl Fn(&Path) -> anyhow::Result<String>,
) -> Vec<FileContext> {
    let mut paths: Vec<&PathBuf> = selected
        .iter()
        .filter(|p| !p.is_dir())
        .filter(|p| {
            let binary = config.is_binary(p);
            if binary {
                debug!("Skipping binary file {}", p.display());
            }
            !binary
        })
        .collect();
    paths.sort();

    let mut files = Vec::new();
    for path in paths {
        debug!("Reading file: {}", path.display());
        match file_reader(path) {
            Ok(content) => files.push(FileContext {
                path: path.clone(),
                content,
            }),
            Err(e) => warn!("Error reading file {}: {}", path.display(), e),
        }
    }

    info!("Loaded {} of {} selected paths", files.len(), selected.len());
    files
}

fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

pub fn build_bundle(files: Vec<FileContext>, root: &Path, user_prompt: Option<String>) -> Bundle {
    debug!("Building bundle from {} files", files.len());
    let mut file_map = String::new();
    let mut file_contents = String::new();

    for file in &files {
        let shown = display_path(&file.path, root);
        file_map.push_str(&format!("├── {}\n", shown));
        file_contents.push_str(&format!(
            "\nFile: {}\n```{}\n{}\n```\n",
            shown,
            file.path.extension().and_then(|e| e.to_str()).unwrap_or(""),
            file.content
        ));
    }

    let user_instructions = match user_prompt {
        Some(prompt) if !prompt.trim().is_empty() => {
            info!("Including user prompt in bundle");
            prompt
        }
        _ => {
            debug!("No user prompt provided");
            String::new()
        }
    };

    Bundle {
        file_map,
        file_contents,
        user_instructions,
        file_count: files.len(),
    }
}

pub fn format_bundle(bundle: &Bundle) -> String {
    debug!("Formatting bundle with {} files", bundle.file_count);
    let mut result = String::new();

    result.push_str("<file_map>\n");
    result.push_str(&bundle.file_map);
    result.push_str("</file_map>\n\n\n");

    result.push_str("<file_contents>");
    result.push_str(&bundle.file_contents);
    result.push_str("</file_contents>");

    if !bundle.user_instructions.is_empty() {
        result.push_str("\n\n<user_instructions>\n");
        result.push_str(&bundle.user_instructions);
        result.push_str("\n</user_instructions>");
    }

    result
}

/// Join ad-hoc and saved prompt text, in that order.
pub fn combine_prompts(inline: Option<String>, saved: Option<String>) -> Option<String> {
    let parts: Vec<String> = [inline, saved]
        .into_iter()
        .flatten()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_collect_files_skips_dirs_binaries_and_errors() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        let config = WorkspaceConfig::new(root);

        let selected = vec![
            root.join("src/main.rs"),
            root.join("src"),
            root.join("logo.png"),
            root.join("broken.rs"),
            root.join("a.rs"),
        ];
        let reader = |path: &Path| -> anyhow::Result<String> {
            if path.ends_with("broken.rs") {
                Err(anyhow::anyhow!("permission denied"))
            } else {
                Ok(format!("content of {}", path.file_name().unwrap().to_string_lossy()))
            }
        };

        let files = collect_files(&selected, &config, reader);
        let paths: Vec<_> = files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(paths, vec![root.join("a.rs"), root.join("src/main.rs")]);
        assert_eq!(files[1].content, "content of main.rs");
    }

    #[test]
    fn test_build_bundle() {
        let root = Path::new("/ws");
        let files = vec![
            FileContext {
                path: PathBuf::from("/ws/test/file1.rs"),
                content: "fn test() {}".to_string(),
            },
            FileContext {
                path: PathBuf::from("/ws/test/file2.py"),
                content: "class Test: pass".to_string(),
            },
        ];

        let bundle = build_bundle(files, root, Some("Refactor this code".to_string()));

        assert_eq!(bundle.file_count, 2);
        assert_eq!(bundle.file_map, "├── test/file1.rs\n├── test/file2.py\n");
        assert_eq!(bundle.user_instructions, "Refactor this code");
        assert!(bundle.file_contents.contains("File: test/file1.rs\n```rs\nfn test() {}\n```"));
        assert!(bundle.file_contents.contains("```py\nclass Test: pass\n```"));
    }

    #[test]
    fn test_blank_prompt_is_dropped() {
        let bundle = build_bundle(Vec::new(), Path::new("/ws"), Some("   ".to_string()));
        assert!(bundle.user_instructions.is_empty());
        assert!(!format_bundle(&bundle).contains("<user_instructions>"));
    }

    #[test]
    fn test_format_bundle() {
        let bundle = Bundle {
            file_map: "├── dir1/a.rs\n".to_string(),
            file_contents: "content1\n".to_string(),
            user_instructions: "prompt1".to_string(),
            file_count: 1,
        };

        let formatted = format_bundle(&bundle);

        assert!(formatted.contains("<file_map>\n├── dir1/a.rs\n</file_map>"));
        assert!(formatted.contains("<file_contents>content1\n</file_contents>"));
        assert!(formatted.contains("<user_instructions>\nprompt1\n</user_instructions>"));
    }

    #[test]
    fn test_combine_prompts() {
        assert_eq!(combine_prompts(None, None), None);
        assert_eq!(combine_prompts(Some(" ".into()), None), None);
        assert_eq!(
            combine_prompts(Some("Fix the bug".into()), Some("Answer with file operations.\n".into())),
            Some("Fix the bug\n\nAnswer with file operations.".to_string())
        );
    }
}
