//! Process-wide repository lock.
//!
//! A path is locked while a [`RepoLock`] for it is alive. The registry lives in
//! memory, so a crashed process never leaves a stale lock behind.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use parking_lot::Mutex;
use tracing::trace;

use crate::RepoError;

static HELD: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();

fn held() -> &'static Mutex<HashSet<PathBuf>> {
    HELD.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Exclusive claim on a repository path, released on drop.
#[derive(Debug)]
pub(crate) struct RepoLock {
    path: PathBuf,
}

impl RepoLock {
    /// Claim `path`, failing with [`RepoError::Locked`] if already claimed.
    pub(crate) fn acquire(path: &Path) -> Result<Self, RepoError> {
        let path = fs::canonicalize(path)?;

        if !held().lock().insert(path.clone()) {
            return Err(RepoError::Locked(path));
        }

        trace!(path = %path.display(), "Acquired repository lock");
        Ok(Self { path })
    }

    #[cfg(test)]
    pub(crate) fn is_held(path: &Path) -> bool {
        fs::canonicalize(path).is_ok_and(|path| held().lock().contains(&path))
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        held().lock().remove(&self.path);
        trace!(path = %self.path.display(), "Released repository lock");
    }
}
