//! Shared data structures for the dark library
//!
//! These structs represent the data model that flows between
//! the header reader, the catalog database and the CLI.

use std::path::{Path, PathBuf};

use crate::fits::{
    HeaderMap, KEY_CCD_TEMP, KEY_EGAIN, KEY_EXPTIME, KEY_GAIN, KEY_HEIGHT, KEY_ISO, KEY_WIDTH,
    KEY_XBINNING, KEY_YBINNING,
};

/// A registered dark library
#[derive(Debug, Clone, PartialEq)]
pub struct Library {
    /// User-chosen unique name (e.g. "ScopeA")
    pub name: String,
    /// Directory the dark frames are scanned from (never modified)
    pub source_dir: PathBuf,
    /// SQLite catalog holding the indexed frames
    pub store_path: PathBuf,
}

/// One indexed dark frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    /// Full path to the FITS file
    pub path: String,
    /// Sensor temperature in °C
    pub ccd_temp: f64,
    /// ISO speed (DSLR), `None` for astro cameras
    pub iso: Option<i64>,
    /// Electronic gain (astro cameras), `None` for DSLRs
    pub gain: Option<f64>,
    /// Exposure time in seconds
    pub exptime: f64,
    pub width: i64,
    pub height: i64,
    pub xbinning: i64,
    pub ybinning: i64,
}

impl FrameRecord {
    /// Build a record from a frame header.
    ///
    /// Returns `None` unless temperature, exposure, both dimensions and both
    /// binning factors are present together with at least one of ISO or gain.
    pub fn from_header(path: &Path, header: &HeaderMap) -> Option<Self> {
        let real = |key: &str| header.get(key).and_then(|v| v.as_f64());
        let int = |key: &str| header.get(key).and_then(|v| v.as_i64());

        let iso = int(KEY_ISO);
        let gain = real(KEY_GAIN).or_else(|| real(KEY_EGAIN));
        if iso.is_none() && gain.is_none() {
            return None;
        }

        Some(FrameRecord {
            path: path.to_string_lossy().to_string(),
            ccd_temp: real(KEY_CCD_TEMP)?,
            iso,
            gain,
            exptime: real(KEY_EXPTIME)?,
            width: int(KEY_WIDTH)?,
            height: int(KEY_HEIGHT)?,
            xbinning: int(KEY_XBINNING)?,
            ybinning: int(KEY_YBINNING)?,
        })
    }

    /// Composite resolution key, e.g. "4144x2822"
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Composite binning key, e.g. "1x1"
    pub fn binning(&self) -> String {
        format!("{}x{}", self.xbinning, self.ybinning)
    }
}
