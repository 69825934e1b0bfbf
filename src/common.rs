/// Small helpers shared by the resolver, the config loader and the logging setup.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use directories::ProjectDirs;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, EnvFilter};
use unicode_normalization::UnicodeNormalization;

use crate::error::{RecoverError, Result};

pub const APP_NAME: &str = "playlist-recover";

// Re-ripped and re-tagged files drift between "01 - Track.mp3" and "Track.mp3".
static TRACK_NUMBER_PREFIX_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d\- ]+").unwrap());

/// Strip any leading run of digits, hyphens and spaces from a filename and compose it to NFC.
pub fn normalize_filename(filename: &str) -> String {
    TRACK_NUMBER_PREFIX_REGEX.replace(filename, "").nfc().collect()
}

/// Expand a leading `~` in a user-supplied path. `$VAR` is left alone.
pub fn expand_home(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// [`expand_home`] for an owned path. Paths that are not valid UTF-8 are returned untouched.
pub fn expand_home_path(path: PathBuf) -> PathBuf {
    match path.to_str() {
        Some(s) => expand_home(s),
        None => path,
    }
}

pub fn file_name_string(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stderr,
    File,
}

static LOGGING_INITIALIZED: Mutex<bool> = Mutex::new(false);

/// Install the global tracing subscriber. Safe to call more than once; only the first call has an
/// effect. For file output the returned guard must be held until the process exits, otherwise
/// buffered lines are dropped.
pub fn initialize_logging(output: LogOutput) -> Result<Option<WorkerGuard>> {
    let mut initialized = LOGGING_INITIALIZED.lock().unwrap_or_else(|e| e.into_inner());
    if *initialized {
        return Ok(None);
    }
    *initialized = true;
    drop(initialized);

    let log_despite_testing = std::env::var("LOG_TEST").is_ok();
    let is_testing = std::env::var("CARGO_TEST").is_ok();
    if is_testing && !log_despite_testing {
        return Ok(None);
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match output {
        LogOutput::Stderr => {
            tracing::subscriber::set_global_default(stderr_subscriber(env_filter, log_despite_testing))
                .map_err(|e| RecoverError::Generic(format!("Failed to install logger: {e}")))?;
            Ok(None)
        }
        LogOutput::File => {
            let log_dir = log_dir()?;
            let (subscriber, guard) = file_subscriber(env_filter, &log_dir)?;
            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| RecoverError::Generic(format!("Failed to install logger: {e}")))?;
            Ok(Some(guard))
        }
    }
}

pub(crate) fn stderr_subscriber(env_filter: EnvFilter, verbose: bool) -> impl Subscriber + Send + Sync {
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(!verbose)
        .with_thread_ids(verbose)
        .with_line_number(verbose)
        .with_file(verbose)
        .finish()
}

/// A subscriber writing to `<log_dir>/playlist-recover.log` through a non-blocking worker.
pub(crate) fn file_subscriber(env_filter: EnvFilter, log_dir: &Path) -> Result<(impl Subscriber + Send + Sync, WorkerGuard)> {
    fs::create_dir_all(log_dir)?;
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .max_log_files(10)
        .filename_prefix(APP_NAME)
        .filename_suffix("log")
        .build(log_dir)
        .map_err(|e| RecoverError::Generic(format!("Failed to open log file in {}: {e}", log_dir.display())))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .finish();
    Ok((subscriber, guard))
}

fn log_dir() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("", "", APP_NAME)
        .ok_or_else(|| RecoverError::Generic("Failed to get project directories".to_string()))?;
    let dir = if cfg!(target_os = "macos") {
        proj_dirs.cache_dir()
    } else {
        proj_dirs.state_dir().unwrap_or(proj_dirs.cache_dir())
    };
    Ok(dir.to_path_buf())
}

static ILLEGAL_DIRNAME_CHARS_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[/\x00]+").unwrap());

/// Make a playlist display name usable as a single directory segment on the host filesystem.
pub fn sanitize_dirname(name: &str) -> String {
    let name = ILLEGAL_DIRNAME_CHARS_REGEX.replace_all(name, "_");
    match name.as_ref() {
        "" | "." | ".." => "_".to_string(),
        _ => name.into_owned(),
    }
}
