//! Directory management for the Ark node.

use crate::args::DataDirArgs;
use directories::ProjectDirs;
use std::path::PathBuf;

/// Name of the repository directory inside the data directory.
pub const REPO_DIR: &str = "repo";

/// Returns the default project directories for Ark.
pub fn default_project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("io", "arken", "ark")
}

/// Returns the default data directory path.
pub fn default_data_dir() -> Option<PathBuf> {
    default_project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

/// Resolved data directories.
#[derive(Debug, Clone)]
pub struct DataDirs {
    /// Root data directory
    pub root: PathBuf,
}

impl DataDirs {
    pub fn new(args: &DataDirArgs) -> Self {
        let root = args
            .datadir
            .clone()
            .unwrap_or_else(|| default_data_dir().unwrap_or_else(|| PathBuf::from(".ark")));
        Self { root }
    }

    /// Returns the path of the node repository.
    pub fn repo(&self) -> PathBuf {
        self.root.join(REPO_DIR)
    }
}
