use anyhow::{Context, Result};
use std::fs;
use std::fs::File;
use std::io;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

static INIT_ONCE: std::sync::Once = std::sync::Once::new();
pub fn init_tracing_once() {
    INIT_ONCE.call_once(|| {
        let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
    });
}

const TRIES: usize = 16;
const DELAY_MS: u64 = 50;

/// Transient errors seen on shared volumes (NAS mounts, AV filter drivers on Windows).
fn is_retriable_io_error(e: &io::Error) -> bool {
    if matches!(e.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock) {
        return true;
    }
    // Windows: 5 access denied, 32 sharing violation, 33 lock violation, 1224 user-mapped section open
    cfg!(windows) && matches!(e.raw_os_error(), Some(5) | Some(32) | Some(33) | Some(1224))
}

/// Run `op` with linear backoff while it fails with a transient error.
fn with_backoff<T>(mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    let mut last_err = None;
    for i in 0..TRIES {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if is_retriable_io_error(&e) => {
                last_err = Some(e);
                sleep(Duration::from_millis(DELAY_MS.saturating_mul((i + 1) as u64)));
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "retries exhausted")))
}

pub fn open_with_backoff(path: &Path) -> io::Result<File> {
    with_backoff(|| File::open(path))
}

pub fn create_with_backoff(path: &Path) -> io::Result<File> {
    with_backoff(|| File::create(path))
}

/// Copy `src` over `dest`, creating the destination directory.
pub fn copy_with_backoff(src: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    with_backoff(|| fs::copy(src, dest))
        .with_context(|| format!("copy {} -> {}", src.display(), dest.display()))?;
    Ok(())
}

/// Remove a file; succeeds if it doesn't exist.
pub fn remove_with_backoff(path: &Path) -> Result<()> {
    match with_backoff(|| fs::remove_file(path)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
    }
}

/// Promote `tmp` to `dest`. Falls back to copy+remove when rename is refused
/// (cross-device moves, sharing violations).
pub fn replace_file_atomic_backoff(tmp: &Path, dest: &Path) -> Result<()> {
    if with_backoff(|| fs::rename(tmp, dest)).is_ok() {
        return Ok(());
    }
    remove_with_backoff(dest)?;
    copy_with_backoff(tmp, dest)?;
    remove_with_backoff(tmp)
}

/// Sibling temp path used while a file is being written.
pub fn tmp_path_for(dest: &Path) -> std::path::PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}
