//! Filesystem locations used by the lip-sync driver.
//!
//! Uses the [`dirs`] crate for platform-appropriate resolution. The config
//! directory can be overridden with `LIPSYNC_CONFIG_DIR`.

use std::path::PathBuf;

/// Application config directory.
///
/// Resolves to `dirs::config_dir()/lipsync/` by default. Override with
/// the `LIPSYNC_CONFIG_DIR` environment variable.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("LIPSYNC_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("lipsync"))
        .unwrap_or_else(|| PathBuf::from("/tmp/lipsync-config"))
}

/// Path of the main config file.
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}
