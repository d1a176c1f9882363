// File logging setup
// The terminal belongs to the UI, so log lines go to a file in the per-user data directory

use directories::ProjectDirs;
use std::env;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;

pub const LOG_ENV: &str = "XTFADE_LOG";
pub const LOG_FILE: &str = "xtfade.log";

/// Parse a level name ("warn", "DEBUG", "off"), defaulting to info
pub fn level_from(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|v| LevelFilter::from_str(v.trim()).ok())
        .unwrap_or(LevelFilter::INFO)
}

fn log_path() -> Option<PathBuf> {
    let dir = match ProjectDirs::from("com", "xhbl", "xtfade") {
        Some(proj) => proj.data_local_dir().to_path_buf(),
        None => env::current_dir().ok()?,
    };
    Some(dir.join(LOG_FILE))
}

/// Install the global subscriber; returns the log file path when logging is active.
/// Failures leave the game running without logs.
pub fn init() -> Option<PathBuf> {
    let level = level_from(env::var(LOG_ENV).ok().as_deref());
    if level == LevelFilter::OFF {
        return None;
    }
    let path = log_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok()?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path).ok()?;
    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_max_level(level)
        .try_init()
        .ok()?;
    Some(path)
}
