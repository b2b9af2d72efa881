//! Shared helpers for the integration suites.

pub mod bundled_collections_test;
pub mod config_test;
pub mod doctor_test;
pub mod end_to_end_test;
pub mod request_chaining_test;

use std::fs;
use std::path::{Path, PathBuf};

/// `collections/` at the crate root.
pub fn collections_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("collections")
}

/// Path of a bundled collection, e.g. `bundled("sales")`.
pub fn bundled(name: &str) -> PathBuf {
    collections_dir().join(format!("{}.postman_collection.json", name))
}

/// Writes `content` to `dir/name` and returns the path.
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("failed to write test file");
    path
}
