//! Application paths for config and snapshot cache.

use directories::ProjectDirs;
use std::path::PathBuf;

/// Application paths.
pub struct AppPaths {
    /// Configuration directory.
    pub config: PathBuf,
    /// Cache directory.
    pub cache: PathBuf,
}

impl AppPaths {
    /// Create paths for the agdash application.
    #[must_use]
    pub fn new() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("dev", "agdash", "agdash") {
            Self {
                config: proj_dirs.config_dir().to_path_buf(),
                cache: proj_dirs.cache_dir().to_path_buf(),
            }
        } else {
            // Fallback to home directory
            let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
            Self {
                config: home.join(".config/agdash"),
                cache: home.join(".cache/agdash"),
            }
        }
    }

    /// Path to the config file.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.toml")
    }

    /// Default directory for metric snapshots.
    #[must_use]
    pub fn snapshot_dir(&self) -> PathBuf {
        self.cache.join("snapshots")
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

/// Module-level function for accessing dirs crate.
mod dirs {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
    }
}
