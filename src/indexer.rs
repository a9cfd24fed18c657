//! Metadata indexer
//!
//! Walks a library's source directory, reads every frame header and stores
//! the frames that carry complete acquisition metadata.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::Result;
use crate::fits::{is_frame_file, HeaderExtractor};
use crate::state::catalog::FrameCatalog;
use crate::state::data::FrameRecord;

/// Outcome of one indexing run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Files with a recognized frame extension
    pub candidates: usize,
    /// Frames stored in the catalog
    pub indexed: usize,
    /// Files whose header could not be read
    pub unreadable: usize,
    /// Readable files lacking required metadata
    pub incomplete: usize,
}

/// List every frame file below `source_dir`, in file-name order.
///
/// Unreadable directory entries are skipped.
pub fn scan(source_dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(source_dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file() && is_frame_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect()
}

/// Reads frame headers and fills a library catalog
pub struct Indexer<'a> {
    extractor: &'a dyn HeaderExtractor,
}

impl<'a> Indexer<'a> {
    pub fn new(extractor: &'a dyn HeaderExtractor) -> Self {
        Self { extractor }
    }

    /// Index `source_dir` into `catalog`, adding to whatever it already holds
    pub fn index(&self, source_dir: &Path, catalog: &mut FrameCatalog) -> Result<IndexReport> {
        let (records, mut report) = self.collect(source_dir);
        report.indexed = catalog.insert_frames(&records)?;
        log_report(source_dir, &report);
        Ok(report)
    }

    /// Replace the catalog content with a fresh scan of `source_dir`.
    ///
    /// Files removed from disk disappear from the catalog; changed headers are
    /// re-read from scratch.
    pub fn rescan(&self, source_dir: &Path, catalog: &mut FrameCatalog) -> Result<IndexReport> {
        let (records, mut report) = self.collect(source_dir);
        report.indexed = catalog.replace_frames(&records)?;
        log_report(source_dir, &report);
        Ok(report)
    }

    /// Read every candidate header and keep the valid records
    fn collect(&self, source_dir: &Path) -> (Vec<FrameRecord>, IndexReport) {
        info!("🔍 Scanning folder: {}", source_dir.display());

        let files = scan(source_dir);
        let mut report = IndexReport {
            candidates: files.len(),
            ..Default::default()
        };
        let mut records = Vec::with_capacity(files.len());

        for (n, path) in files.iter().enumerate() {
            match self.extractor.read(path) {
                Ok(header) => match FrameRecord::from_header(path, &header) {
                    Some(record) => records.push(record),
                    None => {
                        debug!("Skipping {}: incomplete acquisition metadata", path.display());
                        report.incomplete += 1;
                    }
                },
                Err(e) => {
                    warn!("⚠️  {}", e);
                    report.unreadable += 1;
                }
            }

            if (n + 1) % 100 == 0 {
                debug!("⏳ Read {} of {} headers...", n + 1, files.len());
            }
        }

        (records, report)
    }
}

fn log_report(source_dir: &Path, report: &IndexReport) {
    info!(
        "✅ Indexed {}: {} frames, {} incomplete, {} unreadable",
        source_dir.display(),
        report.indexed,
        report.incomplete,
        report.unreadable
    );
}
