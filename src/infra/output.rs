use crate::domain::models::RunResult;
use crossterm::{
    ExecutableCommand,
    style::{Color, ResetColor, SetForegroundColor},
};
use log::{debug, info};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

pub trait OutputWriter {
    fn write(&self, content: &str) -> anyhow::Result<()>;
}

pub struct FileWriter {
    path: String,
}

impl FileWriter {
    pub fn new(path: String) -> Self {
        Self { path }
    }
}

impl OutputWriter for FileWriter {
    fn write(&self, content: &str) -> anyhow::Result<()> {
        debug!("Writing output to file: {}", self.path);
        fs::write(Path::new(&self.path), content)?;
        info!("Output written to file: {}", self.path);
        Ok(())
    }
}

pub struct ConsoleWriter;

impl OutputWriter for ConsoleWriter {
    fn write(&self, content: &str) -> anyhow::Result<()> {
        debug!("Writing output to console");
        let mut stdout = io::stdout();
        stdout.write_all(content.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub fn create_writer(output_path: &Option<String>) -> Box<dyn OutputWriter> {
    match output_path {
        Some(path) => Box::new(FileWriter::new(path.clone())),
        None => Box::new(ConsoleWriter),
    }
}

pub fn write_output(formatted_content: &str, output_path: Option<String>) -> anyhow::Result<()> {
    let writer = create_writer(&output_path);
    writer.write(formatted_content)?;

    if let Some(path) = output_path {
        let mut stderr = io::stderr();
        stderr.execute(SetForegroundColor(Color::Green))?;
        writeln!(stderr, "Bundle written to {} ({} bytes)", path, formatted_content.len())?;
        stderr.execute(ResetColor)?;
    }
    Ok(())
}

/// Print the `{success, message}` outcome of a batch, green or red.
pub fn print_run_result(result: &RunResult) -> anyhow::Result<()> {
    let mut stdout = io::stdout();
    let (color, label) = if result.success {
        (Color::Green, "✓")
    } else {
        (Color::Red, "✗")
    };

    stdout.execute(SetForegroundColor(color))?;
    write!(stdout, "{} ", label)?;
    stdout.execute(ResetColor)?;
    writeln!(stdout, "{}", result.message)?;
    Ok(())
}
