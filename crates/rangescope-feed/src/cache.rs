//! On-disk catalog cache.

use std::io::ErrorKind;
use std::path::Path;

use rangescope_catalog::{parse_catalog, Catalog};

use crate::error::FeedError;

/// Load the cached catalog. A missing, empty, or invalid file counts as "no
/// data yet" rather than an error.
pub fn load_cache(path: &Path) -> Option<Catalog> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no catalog cache yet");
            return None;
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to read catalog cache");
            return None;
        }
    };
    if contents.trim().is_empty() {
        return None;
    }

    match parse_catalog(&contents) {
        Ok(catalog) => Some(catalog),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "ignoring invalid catalog cache");
            None
        }
    }
}

/// Write `catalog` as pretty-printed JSON, creating parent directories.
pub fn save_cache(path: &Path, catalog: &Catalog) -> Result<(), FeedError> {
    let json = catalog.to_json_pretty()?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(FeedError::io(parent))?;
    }
    std::fs::write(path, json).map_err(FeedError::io(path))?;
    tracing::info!(path = %path.display(), "catalog cache saved");
    Ok(())
}
