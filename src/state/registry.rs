use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::catalog::FrameCatalog;
use super::data::Library;
use crate::error::{DarkError, Result};
use crate::fits::HeaderExtractor;
use crate::indexer::{IndexReport, Indexer};

/// One library as stored in the registry file
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct LibraryEntry {
    /// Source directory of the dark frames
    path: PathBuf,
    /// SQLite catalog file
    db: PathBuf,
}

/// The Registry maps library names to their source directory and catalog.
///
/// It is loaded once at startup and written back in full after every
/// mutation. The document is a JSON object keyed by library name:
/// `{"ScopeA": {"path": "/darks/scope-a", "db": "/home/me/.siril-dark-libraries/%53cope%41.sqlite"}}`
pub struct Registry {
    file: PathBuf,
    store_dir: PathBuf,
    libraries: BTreeMap<String, LibraryEntry>,
}

impl Registry {
    /// Load the registry from `file`; a missing file is an empty registry.
    /// New catalogs are created inside `store_dir`.
    pub fn load(file: &Path, store_dir: &Path) -> Result<Self> {
        let libraries = match fs::read_to_string(file) {
            Ok(json) => serde_json::from_str(&json).map_err(|e| DarkError::Registry {
                path: file.to_path_buf(),
                reason: e.to_string(),
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(DarkError::Registry {
                    path: file.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        };

        Ok(Registry {
            file: file.to_path_buf(),
            store_dir: store_dir.to_path_buf(),
            libraries,
        })
    }

    /// Write the whole registry.
    ///
    /// The document goes to a sibling temporary file first and is renamed over
    /// the old one, so a crash leaves either the old or the new registry.
    fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.libraries).map_err(|e| DarkError::Registry {
            path: self.file.clone(),
            reason: e.to_string(),
        })?;

        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                DarkError::io(format!("creating registry directory {}", parent.display()), e)
            })?;
        }

        let tmp = self.file.with_extension("json.tmp");
        fs::write(&tmp, json)
            .map_err(|e| DarkError::io(format!("writing registry {}", tmp.display()), e))?;
        fs::rename(&tmp, &self.file)
            .map_err(|e| DarkError::io(format!("replacing registry {}", self.file.display()), e))?;
        Ok(())
    }

    /// Library names in ascending order
    pub fn list(&self) -> Vec<String> {
        self.libraries.keys().cloned().collect()
    }

    /// Look up a library; surrounding whitespace is ignored as in `create`
    pub fn get(&self, name: &str) -> Result<Library> {
        let name = name.trim();
        self.libraries
            .get(name)
            .map(|entry| Library {
                name: name.to_string(),
                source_dir: entry.path.clone(),
                store_path: entry.db.clone(),
            })
            .ok_or_else(|| DarkError::NotFound(name.to_string()))
    }

    /// Register a new library and run its first full index.
    ///
    /// If indexing fails the catalog file is removed again and the registry
    /// is left untouched.
    pub fn create(
        &mut self,
        name: &str,
        source_dir: &Path,
        extractor: &dyn HeaderExtractor,
    ) -> Result<(Library, IndexReport)> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DarkError::invalid("library name must not be empty"));
        }
        if source_dir.as_os_str().is_empty() {
            return Err(DarkError::invalid("source directory must not be empty"));
        }
        if !source_dir.is_dir() {
            return Err(DarkError::invalid(format!(
                "source directory {} does not exist",
                source_dir.display()
            )));
        }
        if self.libraries.contains_key(name) {
            return Err(DarkError::DuplicateName(name.to_string()));
        }

        let library = Library {
            name: name.to_string(),
            source_dir: source_dir.to_path_buf(),
            store_path: self.store_dir.join(store_file_name(name)),
        };

        // A catalog left behind by an earlier library of the same name
        remove_store(&library.store_path)?;

        let report = match index_new(&library, extractor) {
            Ok(report) => report,
            Err(e) => {
                if let Err(cleanup) = remove_store(&library.store_path) {
                    warn!("⚠️  Could not remove catalog after failed index: {}", cleanup);
                }
                return Err(e);
            }
        };

        self.libraries.insert(
            library.name.clone(),
            LibraryEntry {
                path: library.source_dir.clone(),
                db: library.store_path.clone(),
            },
        );
        self.save()?;

        info!("📚 Library '{}' created with {} frames", library.name, report.indexed);
        Ok((library, report))
    }

    /// Remove a library and its catalog. The frames in its source directory are kept.
    pub fn delete(&mut self, name: &str) -> Result<Library> {
        let library = self.get(name)?;
        remove_store(&library.store_path)?;
        self.libraries.remove(&library.name);
        self.save()?;

        info!("🗑️  Library '{}' deleted (frames remain untouched)", library.name);
        Ok(library)
    }

    /// Rebuild a library's catalog from its source directory
    pub fn rescan(&self, name: &str, extractor: &dyn HeaderExtractor) -> Result<IndexReport> {
        let library = self.get(name)?;
        let mut catalog = FrameCatalog::open(&library.store_path)?;
        Indexer::new(extractor).rescan(&library.source_dir, &mut catalog)
    }

    /// Open the catalog of a registered library
    pub fn open_catalog(&self, name: &str) -> Result<FrameCatalog> {
        let library = self.get(name)?;
        FrameCatalog::open(&library.store_path)
    }
}

fn index_new(library: &Library, extractor: &dyn HeaderExtractor) -> Result<IndexReport> {
    let mut catalog = FrameCatalog::open(&library.store_path)?;
    Indexer::new(extractor).index(&library.source_dir, &mut catalog)
}

fn remove_store(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DarkError::io(
            format!("deleting catalog {}", path.display()),
            e,
        )),
    }
}

/// Catalog file name for a library.
///
/// Lowercase ASCII letters, digits, `_` and `-` are kept; every other byte
/// is written as `%XX`. Distinct names therefore never share a file, even on
/// case-insensitive filesystems ("ScopeA" -> "%53cope%41.sqlite").
pub fn store_file_name(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len() + 7);
    for byte in name.bytes() {
        match byte {
            b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' => encoded.push(byte as char),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded.push_str(".sqlite");
    encoded
}
