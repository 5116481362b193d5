// File system locations for the local store and settings
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory name under the platform data dir, matches the bundle identifier
pub const APP_DIR_NAME: &str = "com.grow.app";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to get app data directory")]
    NoAppDataDir,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Get the app data directory for Grow, creating it if needed
pub fn get_app_data_dir() -> StorageResult<PathBuf> {
    let data_dir = dirs::data_dir().ok_or(StorageError::NoAppDataDir)?;
    ensure_dir(data_dir.join(APP_DIR_NAME))
}

/// Path of the SQLite file backing the named store
pub fn store_path(dir: &Path, store_name: &str) -> PathBuf {
    dir.join(format!("{}.db", store_name))
}

/// Path of the optional settings file
pub fn config_path(dir: &Path) -> PathBuf {
    dir.join("config.json")
}

fn ensure_dir(dir: PathBuf) -> StorageResult<PathBuf> {
    fs::create_dir_all(&dir)?;
    Ok(dir)
}
