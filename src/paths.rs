//! Base directory discovery and relative path anchoring.
//!
//! Relative paths found in the configuration (log files) are resolved
//! against the directory holding the running executable, so the daemon
//! behaves the same regardless of the working directory it was started from.

use std::io;
use std::path::{Path, PathBuf};

/// Config file looked up in the base directory when `--config` is omitted.
pub const DEFAULT_CONFIG_FILE: &str = "server.toml";

/// Directory containing the running executable.
pub fn base_dir() -> io::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("executable {} has no parent directory", exe.display()),
        )
    })
}

/// Default config path for the given base directory.
pub fn default_config_path(base: &Path) -> PathBuf {
    base.join(DEFAULT_CONFIG_FILE)
}

/// Join `path` onto `base` unless it is already absolute.
pub fn anchor(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
