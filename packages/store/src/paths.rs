#![allow(clippy::module_name_repetitions)]
//! Canonical file paths for the tech map data directory.
//!
//! Everything lives under `data/` in the project root unless the
//! `TECH_MAP_DATA_DIR` environment variable points somewhere else.

use std::path::{Path, PathBuf};

/// Environment variable that overrides [`data_dir`].
pub const DATA_DIR_ENV: &str = "TECH_MAP_DATA_DIR";

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`. Falls back to the
/// current directory if the manifest is not nested as expected.
#[must_use]
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Returns the data directory.
#[must_use]
pub fn data_dir() -> PathBuf {
    match std::env::var(DATA_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => project_root().join("data"),
    }
}

/// Returns the path of the place store `DuckDB` file.
#[must_use]
pub fn place_store_db_path() -> PathBuf {
    data_dir().join("places.duckdb")
}

/// Returns the path of the persisted session state.
#[must_use]
pub fn session_path() -> PathBuf {
    data_dir().join("session.json")
}

/// Returns the path of the optional engine configuration file.
#[must_use]
pub fn config_path() -> PathBuf {
    project_root().join("tech_map.toml")
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
