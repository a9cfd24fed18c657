/// FITS header access
///
/// This module handles:
/// - The header-extraction seam used by the indexer (`HeaderExtractor`)
/// - Reading the primary HDU keywords through cfitsio (`fitsio`)
/// - The keyword names that carry dark-frame acquisition metadata

pub mod header;

use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;

pub use header::FitsHeaderReader;

/// CCD sensor temperature in degrees Celsius
pub const KEY_CCD_TEMP: &str = "CCD-TEMP";
/// ISO speed (DSLR / mirrorless cameras)
pub const KEY_ISO: &str = "ISOSPEED";
/// Electronic gain (dedicated astro cameras)
pub const KEY_GAIN: &str = "GAIN";
/// Alternative gain keyword written by some capture programs
pub const KEY_EGAIN: &str = "EGAIN";
pub const KEY_EXPTIME: &str = "EXPTIME";
pub const KEY_WIDTH: &str = "NAXIS1";
pub const KEY_HEIGHT: &str = "NAXIS2";
pub const KEY_XBINNING: &str = "XBINNING";
pub const KEY_YBINNING: &str = "YBINNING";

/// Keywords read from the header; the dimensions come from the image shape
pub const ACQUISITION_KEYS: [&str; 7] = [
    KEY_CCD_TEMP,
    KEY_ISO,
    KEY_GAIN,
    KEY_EGAIN,
    KEY_EXPTIME,
    KEY_XBINNING,
    KEY_YBINNING,
];

/// File extensions recognized as frames (compared lowercase)
pub const FRAME_EXTENSIONS: [&str; 3] = ["fit", "fits", "fts"];

/// A single header value as read from the primary HDU
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Int(i64),
    Real(f64),
    Text(String),
}

impl HeaderValue {
    /// Numeric view of the value; text and non-finite numbers (NaN, inf) are `None`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Int(v) => Some(*v as f64),
            HeaderValue::Real(v) if v.is_finite() => Some(*v),
            HeaderValue::Real(_) | HeaderValue::Text(_) => None,
        }
    }

    /// Integer view of the value; integral reals (e.g. `1.0`) are accepted
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HeaderValue::Int(v) => Some(*v),
            HeaderValue::Real(v) if v.is_finite() && v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }
}

/// Keyword -> value mapping of one primary header
pub type HeaderMap = HashMap<String, HeaderValue>;

/// Extracts acquisition headers from a frame file.
///
/// Implementations return `DarkError::UnreadableFrame` when the file cannot
/// be read or is not in the expected format.
pub trait HeaderExtractor {
    fn read(&self, path: &Path) -> Result<HeaderMap>;
}

/// Check whether a path has one of the recognized frame extensions
pub fn is_frame_file(path: &Path) -> bool {
    match path.extension() {
        Some(extension) => {
            let ext = extension.to_string_lossy().to_lowercase();
            FRAME_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}
