use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::FitsFile;
use std::path::Path;

use tracing::trace;

use super::{HeaderExtractor, HeaderMap, HeaderValue, ACQUISITION_KEYS, KEY_HEIGHT, KEY_WIDTH};
use crate::error::{DarkError, Result};

/// Reads the acquisition metadata of a FITS frame from its primary HDU.
///
/// Only the header unit is parsed; the pixel data is never read, so even very
/// large frames are cheap to index.
#[derive(Debug, Default, Clone, Copy)]
pub struct FitsHeaderReader;

impl FitsHeaderReader {
    pub fn new() -> Self {
        Self
    }
}

impl HeaderExtractor for FitsHeaderReader {
    fn read(&self, path: &Path) -> Result<HeaderMap> {
        let unreadable = |reason: String| DarkError::UnreadableFrame {
            path: path.to_path_buf(),
            reason,
        };

        let mut fptr = FitsFile::open(path)
            .map_err(|e| unreadable(format!("cannot open FITS file: {}", e)))?;
        let hdu = fptr
            .primary_hdu()
            .map_err(|e| unreadable(format!("cannot access primary HDU: {}", e)))?;

        let mut header = HeaderMap::new();

        // Shape is reported in reverse NAXIS order: [.., NAXIS2, NAXIS1]
        if let HduInfo::ImageInfo { shape, .. } = &hdu.info {
            if let [.., height, width] = shape.as_slice() {
                header.insert(KEY_WIDTH.to_string(), HeaderValue::Int(*width as i64));
                header.insert(KEY_HEIGHT.to_string(), HeaderValue::Int(*height as i64));
            }
        }

        for key in ACQUISITION_KEYS {
            if let Some(value) = read_key_optional(&hdu, &mut fptr, key) {
                header.insert(key.to_string(), value);
            }
        }

        trace!("Read {} header keywords from {}", header.len(), path.display());
        Ok(header)
    }
}

/// Numeric keywords come back as reals; anything cfitsio cannot convert is kept as text
fn read_key_optional(hdu: &FitsHdu, fptr: &mut FitsFile, key: &str) -> Option<HeaderValue> {
    if let Ok(real) = hdu.read_key::<f64>(fptr, key) {
        return Some(HeaderValue::Real(real));
    }
    hdu.read_key::<String>(fptr, key).ok().map(HeaderValue::Text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fits::testutil::{write_fits, FRAME_SIZE};

    #[test]
    fn test_reads_acquisition_keywords() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("dark.fit");
        write_fits(
            &path,
            FRAME_SIZE,
            &[
                ("CCD-TEMP", HeaderValue::Real(-10.5)),
                ("ISOSPEED", HeaderValue::Int(800)),
                ("EXPTIME", HeaderValue::Real(120.0)),
                ("XBINNING", HeaderValue::Int(2)),
                ("INSTRUME", HeaderValue::Text("ZWO ASI294MC Pro".into())),
            ],
        );

        let header = FitsHeaderReader::new().read(&path).unwrap();
        assert_eq!(header.get("NAXIS1"), Some(&HeaderValue::Int(64)));
        assert_eq!(header.get("NAXIS2"), Some(&HeaderValue::Int(48)));
        assert_eq!(header.get("CCD-TEMP"), Some(&HeaderValue::Real(-10.5)));
        assert_eq!(header.get("ISOSPEED").and_then(|v| v.as_i64()), Some(800));
        assert_eq!(header.get("EXPTIME").and_then(|v| v.as_f64()), Some(120.0));
        assert_eq!(header.get("XBINNING").and_then(|v| v.as_i64()), Some(2));
        assert!(header.get("YBINNING").is_none());
        // Only acquisition keywords are collected
        assert!(header.get("INSTRUME").is_none());
    }

    #[test]
    fn test_text_value_is_kept_as_text() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("dark.fit");
        write_fits(
            &path,
            FRAME_SIZE,
            &[("EXPTIME", HeaderValue::Text("long".into()))],
        );

        let header = FitsHeaderReader::new().read(&path).unwrap();
        assert_eq!(header.get("EXPTIME"), Some(&HeaderValue::Text("long".into())));
        assert_eq!(header.get("EXPTIME").and_then(|v| v.as_f64()), None);
    }

    #[test]
    fn test_rejects_non_fits_and_missing_files() {
        let tmp = tempfile::tempdir().unwrap();

        let text = tmp.path().join("notes.fit");
        std::fs::write(&text, "hello").unwrap();
        let err = FitsHeaderReader::new().read(&text).unwrap_err();
        assert!(matches!(err, DarkError::UnreadableFrame { .. }));

        let bogus = tmp.path().join("bogus.fit");
        std::fs::write(&bogus, " ".repeat(2880)).unwrap();
        assert!(matches!(
            FitsHeaderReader::new().read(&bogus),
            Err(DarkError::UnreadableFrame { .. })
        ));

        let missing = tmp.path().join("missing.fit");
        assert!(FitsHeaderReader::new().read(&missing).is_err());
    }
}
