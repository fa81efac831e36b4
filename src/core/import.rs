use std::fs::File;
use std::path::Path;

use crate::core::error::{LauncherError, LauncherResult};

/// Checks that `path` is a readable, non-empty zip before the UI sees it.
pub fn validate_import_archive(path: &Path) -> LauncherResult<usize> {
    let file = File::open(path).map_err(|source| LauncherError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let archive = zip::ZipArchive::new(file)?;
    if archive.is_empty() {
        return Err(LauncherError::Other(format!(
            "{} contains no files",
            path.display()
        )));
    }
    Ok(archive.len())
}
