//! Process-wide configuration: where the registry and catalogs live and
//! which Siril executable to run.

use std::path::{Path, PathBuf};

use crate::error::{DarkError, Result};

/// Registry file name inside the home directory
pub const REGISTRY_FILE_NAME: &str = ".siril-dark-libraries.json";
/// Catalog directory name inside the home directory
pub const STORE_DIR_NAME: &str = ".siril-dark-libraries";
/// Siril console executable looked up on PATH
pub const DEFAULT_SIRIL: &str = "siril-cli";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// JSON registry of all libraries
    pub registry_file: PathBuf,
    /// Directory holding one SQLite catalog per library
    pub store_dir: PathBuf,
    pub siril: PathBuf,
}

impl AppConfig {
    /// Fill in the defaults for every location that was not given explicitly.
    ///
    /// Defaults live in the home directory (falling back to the user data
    /// directory):
    /// - `~/.siril-dark-libraries.json`
    /// - `~/.siril-dark-libraries/`
    pub fn resolve(
        registry_file: Option<PathBuf>,
        store_dir: Option<PathBuf>,
        siril: Option<PathBuf>,
    ) -> Result<Self> {
        let base = || {
            dirs::home_dir().or_else(dirs::data_dir).ok_or_else(|| {
                DarkError::invalid(
                    "could not determine the home directory; pass --registry and --store-dir",
                )
            })
        };

        let registry_file = match registry_file {
            Some(path) => path,
            None => base()?.join(REGISTRY_FILE_NAME),
        };
        let store_dir = match store_dir {
            Some(path) => path,
            None => base()?.join(STORE_DIR_NAME),
        };

        Ok(AppConfig {
            registry_file,
            store_dir,
            siril: siril.unwrap_or_else(|| PathBuf::from(DEFAULT_SIRIL)),
        })
    }

    pub fn registry_file(&self) -> &Path {
        &self.registry_file
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }
}
