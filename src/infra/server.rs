use crate::core::session::{Request, Response, Session};
use crate::domain::config::WorkspaceConfig;
use log::{debug, info, warn};
use serde_json::json;
use std::cell::Cell;
use std::io::{BufRead, Write};
use std::rc::Rc;

/// Serve host messages as JSON lines: one request per input line, one
/// response per output line. A `{"event":"refresh"}` line follows any
/// response that changed the selection view.
pub fn run_json_lines(
    config: WorkspaceConfig,
    input: impl BufRead,
    mut output: impl Write,
) -> anyhow::Result<()> {
    let dirty = Rc::new(Cell::new(false));
    let flag = dirty.clone();
    let mut session = Session::with_listener(config, move || flag.set(true));
    info!("Serving workspace {}", session.config().root.display());

    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => session.handle(request),
            Err(e) => {
                warn!("Rejected request: {}", e);
                Response::Error {
                    message: format!("invalid request: {}", e),
                }
            }
        };

        writeln!(output, "{}", serde_json::to_string(&response)?)?;
        if dirty.replace(false) {
            debug!("Selection changed, asking host to refresh");
            writeln!(output, "{}", json!({ "event": "refresh" }))?;
        }
        output.flush()?;
    }

    info!("Input closed, shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn serve(config: WorkspaceConfig, input: &str) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        run_json_lines(config, Cursor::new(input.to_string()), &mut out).unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_json_lines_session() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("src")).unwrap();
        fs::write(temp_dir.path().join("src/a.rs"), "").unwrap();
        let config = WorkspaceConfig::new(temp_dir.path());
        let root = config.root.clone();

        let lines = serve(
            config,
            concat!(
                "{\"command\":\"toggleSelection\",\"path\":\"src\",\"isDirectory\":true}\n",
                "\n",
                "{\"command\":\"getSelectedPaths\"}\n",
                "not json\n",
                "{\"command\":\"runFileOperations\",\"payload\":\"[{\\\"action\\\":\\\"create\\\",\\\"path\\\":\\\"b.txt\\\",\\\"content\\\":\\\"x\\\"}]\"}\n",
            ),
        );

        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0]["kind"], "toggled");
        assert_eq!(lines[0]["affected"], 2);
        assert_eq!(lines[1], json!({ "event": "refresh" }));
        assert_eq!(lines[2]["kind"], "selected");
        assert_eq!(lines[2]["paths"].as_array().unwrap().len(), 2);
        assert_eq!(lines[3]["kind"], "error");
        assert_eq!(lines[4]["kind"], "operationResult");
        assert_eq!(lines[4]["success"], true);
        assert_eq!(fs::read_to_string(root.join("b.txt")).unwrap(), "x");
    }
}
