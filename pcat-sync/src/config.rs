//! Path and worker resolution for pcat-sync
//!
//! Each setting resolves CLI → TOML → compiled default. The root folder
//! itself follows the shared resolver (CLI → `PCAT_ROOT_FOLDER` → TOML →
//! OS default).

use pcat_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig};
use pcat_common::Result;
use std::path::PathBuf;
use tracing::info;

/// Overrides given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root_folder: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub workers: Option<usize>,
}

/// Fully resolved locations for one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct SyncPaths {
    pub root_folder: PathBuf,
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub workers: usize,
}

impl SyncPaths {
    /// Resolve without touching the filesystem
    pub fn resolve(cli: &CliOverrides, toml: &TomlConfig) -> Self {
        let root_folder = RootFolderResolver::new()
            .with_cli_arg(cli.root_folder.clone())
            .with_toml(toml)
            .resolve();
        let initializer = RootFolderInitializer::new(root_folder.clone());

        let data_dir = cli
            .data_dir
            .clone()
            .or_else(|| toml.data_dir.clone())
            .unwrap_or_else(|| initializer.data_dir());
        let database_path = cli
            .database
            .clone()
            .or_else(|| toml.database_path.clone())
            .unwrap_or_else(|| initializer.database_path());
        let workers = cli
            .workers
            .unwrap_or_else(|| toml.sync.effective_workers())
            .max(1);

        Self {
            root_folder,
            data_dir,
            database_path,
            workers,
        }
    }

    /// Create the root folder if missing
    pub fn ensure_root_folder(&self) -> Result<()> {
        RootFolderInitializer::new(self.root_folder.clone()).ensure_directory_exists()?;
        info!("Root folder: {}", self.root_folder.display());
        info!("Data directory: {}", self.data_dir.display());
        info!("Database: {}", self.database_path.display());
        Ok(())
    }
}
