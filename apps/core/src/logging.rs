use std::any::Any;
use std::ffi::OsStr;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "multihighlight.log";
const ARCHIVE_PREFIX: &str = "multihighlight-";
const ROTATE_AT_BYTES: u64 = 1_000_000;
const KEPT_ARCHIVES: usize = 5;

static INSTALLED: OnceLock<()> = OnceLock::new();
static PANIC_HOOK: OnceLock<()> = OnceLock::new();

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("log file error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid log filter '{filter}': {message}")]
    Filter { filter: String, message: String },
}

/// Installs the global `tracing` subscriber. `RUST_LOG` overrides `filter`.
/// With a `log_dir` events are appended to a rotated log file there,
/// otherwise they go to stderr. Later calls are no-ops.
pub fn init(filter: &str, log_dir: Option<&Path>) -> Result<(), LoggingError> {
    if INSTALLED.get().is_some() {
        return Ok(());
    }

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(from_env) => from_env,
        Err(_) => EnvFilter::try_new(filter).map_err(|error| LoggingError::Filter {
            filter: filter.to_string(),
            message: error.to_string(),
        })?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);
    let installed = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            rotate_if_needed(dir)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file_path(dir))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .is_ok()
        }
        None => builder.with_writer(io::stderr).try_init().is_ok(),
    };

    // Embedders and test harnesses may own the global slot already.
    if !installed {
        tracing::debug!("global tracing subscriber already set; keeping it");
    }
    let _ = INSTALLED.set(());

    install_panic_hook();
    Ok(())
}

pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(LOG_FILE_NAME)
}

fn rotate_if_needed(log_dir: &Path) -> io::Result<()> {
    let current = log_file_path(log_dir);
    let size = match fs::metadata(&current) {
        Ok(meta) => meta.len(),
        Err(error) if error.kind() == io::ErrorKind::NotFound => 0,
        Err(error) => return Err(error),
    };
    if size < ROTATE_AT_BYTES {
        return Ok(());
    }

    fs::rename(&current, log_dir.join(archive_name(SystemTime::now())))?;
    prune_archives(log_dir)
}

// Zero-padded so lexical order is chronological.
fn archive_name(at: SystemTime) -> String {
    let millis = at
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    format!("{ARCHIVE_PREFIX}{millis:020}.log")
}

fn is_archive(path: &Path) -> bool {
    path.file_name()
        .and_then(OsStr::to_str)
        .is_some_and(|name| name.starts_with(ARCHIVE_PREFIX) && name.ends_with(".log"))
}

fn prune_archives(log_dir: &Path) -> io::Result<()> {
    let mut archives: Vec<PathBuf> = fs::read_dir(log_dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| is_archive(path))
        .collect();
    archives.sort_unstable();

    let surplus = archives.len().saturating_sub(KEPT_ARCHIVES);
    for stale in &archives[..surplus] {
        fs::remove_file(stale).ok();
    }
    Ok(())
}

fn install_panic_hook() {
    PANIC_HOOK.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let location = info.location().map(ToString::to_string);
            tracing::error!(
                location = location.as_deref().unwrap_or("<unknown>"),
                message = panic_message(info.payload()),
                "panic"
            );
            previous(info);
        }));
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
