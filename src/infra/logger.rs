use env_logger::Builder;
use log::Level;
use std::io::Write;

pub const LOG_LEVEL_ENV: &str = "PROMPT_MASTER_LOG_LEVEL";

pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "error",
        1 => "warn",
        2 => "info",
        _ => "debug",
    }
}

/// Logs go to stderr; stdout carries bundles, results and JSON lines.
pub fn setup_logger(verbosity: u8) -> Result<(), log::SetLoggerError> {
    let env = env_logger::Env::default().filter_or(LOG_LEVEL_ENV, level_for(verbosity));

    Builder::from_env(env)
        .format(|buf, record| {
            let level_color = match record.level() {
                Level::Error => "31", // Red
                Level::Warn => "33",  // Yellow
                Level::Info => "32",  // Green
                Level::Debug => "36", // Cyan
                Level::Trace => "35", // Magenta
            };

            writeln!(
                buf,
                "\x1B[{}m[{}]\x1B[0m [{}] {}",
                level_color,
                record.level(),
                buf.timestamp(),
                record.args()
            )
        })
        .format_timestamp_secs()
        .target(env_logger::Target::Stderr)
        .try_init()
}
