use crate::core::context_generator::combine_prompts;
use crate::core::file_operations::run_file_operations;
use crate::core::session::{Response, Session};
use crate::domain::config::WorkspaceConfig;
use crate::infra::logger::setup_logger;
use crate::infra::output::{print_run_result, write_output};
use crate::infra::server::run_json_lines;
use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{debug, info, warn};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "prompt-master")]
#[command(version)]
#[command(about = "Bundle selected files into an LLM prompt and apply the file operations it returns", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Select files and folders and print the assembled prompt document
    Bundle {
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// File or folder to toggle; folders expand with ignore rules applied
        #[arg(long = "select", required = true)]
        select: Vec<PathBuf>,

        /// Names always skipped when a folder expands
        #[arg(long, default_value = "node_modules")]
        exclude: String,

        /// File extensions left out of the bundle
        #[arg(long, default_value = DEFAULT_BINARY_LIST)]
        binary_extensions: String,

        #[arg(long)]
        prompt: Option<String>,

        /// Saved prompt text appended after --prompt
        #[arg(long)]
        prompt_file: Option<PathBuf>,

        #[arg(long)]
        output: Option<String>,
    },
    /// Apply a create/delete/replace payload (JSON array or XML document)
    Apply {
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Read the payload from this file instead of stdin
        #[arg(long)]
        payload: Option<PathBuf>,

        /// Reject the whole batch if any operation is invalid, before writing anything
        #[arg(long)]
        validate_upfront: bool,
    },
    /// Answer host messages as JSON lines on stdin/stdout
    Serve {
        #[arg(long, default_value = ".")]
        root: PathBuf,

        #[arg(long, default_value = "node_modules")]
        exclude: String,

        #[arg(long, default_value = DEFAULT_BINARY_LIST)]
        binary_extensions: String,

        #[arg(long)]
        validate_upfront: bool,
    },
}

const DEFAULT_BINARY_LIST: &str = "png,jpg,jpeg,gif,bmp,webp,ico,svg,pdf";

fn split_list(value: &str) -> Vec<&str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logger(cli.verbose)?;

    match cli.command {
        Commands::Bundle {
            root,
            select,
            exclude,
            binary_extensions,
            prompt,
            prompt_file,
            output,
        } => {
            info!("Starting bundle command");
            debug!(
                "Command parameters: root={}, select={:?}, exclude={}, prompt_file={:?}, output={:?}",
                root.display(),
                select,
                exclude,
                prompt_file,
                output
            );

            let config = WorkspaceConfig::new(&root)
                .with_ignored_names(&split_list(&exclude))
                .with_binary_extensions(&split_list(&binary_extensions));
            let saved = match prompt_file {
                Some(path) => Some(
                    fs::read_to_string(&path)
                        .with_context(|| format!("reading prompt file {}", path.display()))?,
                ),
                None => None,
            };
            bundle(config, &select, combine_prompts(prompt, saved), output)
        }
        Commands::Apply {
            root,
            payload,
            validate_upfront,
        } => {
            info!("Starting apply command");
            let raw = match payload {
                Some(path) => fs::read_to_string(&path)
                    .with_context(|| format!("reading payload {}", path.display()))?,
                None => {
                    let mut raw = String::new();
                    io::stdin().read_to_string(&mut raw).context("reading payload from stdin")?;
                    raw
                }
            };

            let config = WorkspaceConfig::new(&root).with_validate_upfront(validate_upfront);
            let result = run_file_operations(&config.root, &raw, config.validate_upfront);
            print_run_result(&result)?;
            if !result.success {
                anyhow::bail!("file operations were not fully applied");
            }
            Ok(())
        }
        Commands::Serve {
            root,
            exclude,
            binary_extensions,
            validate_upfront,
        } => {
            let config = WorkspaceConfig::new(&root)
                .with_ignored_names(&split_list(&exclude))
                .with_binary_extensions(&split_list(&binary_extensions))
                .with_validate_upfront(validate_upfront);
            let stdin = io::stdin();
            run_json_lines(config, stdin.lock(), io::stdout())
        }
    }
}

fn bundle(
    config: WorkspaceConfig,
    select: &[PathBuf],
    prompt: Option<String>,
    output: Option<String>,
) -> anyhow::Result<()> {
    let mut session = Session::new(config);

    for path in select {
        if let Response::Toggled {
            path,
            selected,
            affected,
            errors,
        } = session.toggle_path(path)
        {
            debug!("Toggled {} -> {} ({} paths)", path.display(), selected, affected);
            if errors > 0 {
                warn!("{} entries under {} could not be read", errors, path.display());
            }
        }
    }

    if session.tree().is_empty() {
        info!("Nothing selected");
        return Ok(());
    }

    let (text, file_count) = session.bundle(prompt);
    info!("Bundled {} files", file_count);
    write_output(&text, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cli_parsing_bundle() {
        let cli = Cli::try_parse_from([
            "prompt-master",
            "bundle",
            "--root",
            "./ws",
            "--select",
            "src",
            "--select",
            "README.md",
            "--prompt",
            "Test prompt",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Bundle {
                root,
                select,
                exclude,
                binary_extensions,
                prompt,
                prompt_file,
                ..
            } => {
                assert_eq!(root, PathBuf::from("./ws"));
                assert_eq!(select, vec![PathBuf::from("src"), PathBuf::from("README.md")]);
                assert_eq!(exclude, "node_modules");
                assert_eq!(
                    WorkspaceConfig::new("/tmp")
                        .with_binary_extensions(&split_list(&binary_extensions))
                        .binary_extensions,
                    WorkspaceConfig::new("/tmp").binary_extensions
                );
                assert_eq!(prompt, Some("Test prompt".to_string()));
                assert!(prompt_file.is_none());
            }
            _ => panic!("expected bundle"),
        }
    }

    #[test]
    fn test_cli_bundle_requires_select() {
        assert!(Cli::try_parse_from(["prompt-master", "bundle"]).is_err());
    }

    #[test]
    fn test_cli_parsing_apply() {
        let cli = Cli::try_parse_from([
            "prompt-master",
            "apply",
            "--payload",
            "ops.json",
            "--validate-upfront",
        ])
        .unwrap();

        match cli.command {
            Commands::Apply {
                root,
                payload,
                validate_upfront,
            } => {
                assert_eq!(root, PathBuf::from("."));
                assert_eq!(payload, Some(PathBuf::from("ops.json")));
                assert!(validate_upfront);
            }
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_bundle_skips_custom_binary_extensions() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("pkg")).unwrap();
        fs::write(root.join("pkg/lib.rs"), "pub fn f() {}").unwrap();
        fs::write(root.join("pkg/app.wasm"), "\0asm").unwrap();
        let out = root.join("bundle.txt");

        let cli = Cli::try_parse_from([
            "prompt-master",
            "bundle",
            "--select",
            "pkg",
            "--binary-extensions",
            "wasm",
        ])
        .unwrap();
        let Commands::Bundle { binary_extensions, .. } = cli.command else {
            panic!("expected bundle");
        };
        let config = WorkspaceConfig::new(root)
            .with_binary_extensions(&split_list(&binary_extensions));

        bundle(
            config,
            &[PathBuf::from("pkg")],
            None,
            Some(out.to_string_lossy().to_string()),
        )
        .unwrap();

        let text = fs::read_to_string(&out).unwrap();
        assert!(text.contains("pkg/lib.rs"));
        assert!(!text.contains("app.wasm"));
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("node_modules, target,,dist "), vec!["node_modules", "target", "dist"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_bundle_writes_output_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("src/node_modules")).unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(root.join("src/node_modules/dep.js"), "dep").unwrap();
        let out = root.join("bundle.txt");

        bundle(
            WorkspaceConfig::new(root),
            &[PathBuf::from("src")],
            Some("Review".to_string()),
            Some(out.to_string_lossy().to_string()),
        )
        .unwrap();

        let text = fs::read_to_string(&out).unwrap();
        assert!(text.contains("├── src/main.rs"));
        assert!(!text.contains("dep.js"));
        assert!(text.contains("<user_instructions>\nReview\n</user_instructions>"));
    }
}
