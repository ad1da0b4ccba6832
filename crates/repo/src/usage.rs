use std::path::Path;

use walkdir::WalkDir;

use crate::RepoError;

/// Total size in bytes of the regular files under `root`.
///
/// A missing root counts as empty.
pub fn storage_usage(root: &Path) -> Result<u64, RepoError> {
    if !root.exists() {
        return Ok(0);
    }

    let mut total = 0u64;
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }

    Ok(total)
}
