//! Deterministic output locations for master darks

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::filter::CompleteCriteria;

/// Replace every character outside `[A-Za-z0-9_-]` with `_`
pub fn sanitize_library_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `<output_root>/<sanitized library>/<exposure>s/`
pub fn output_dir(output_root: &Path, library_name: &str, exposure: &str) -> PathBuf {
    output_root
        .join(sanitize_library_name(library_name))
        .join(format!("{}s", exposure))
}

/// `master-dark_iso<iso>_<exp>s_<temp>c_<resolution>_bin<binning>_<count>x_<date>.fit`
pub fn master_file_name(criteria: &CompleteCriteria, frame_count: usize, date: NaiveDate) -> String {
    format!(
        "master-dark_iso{}_{}s_{}c_{}_bin{}_{}x_{}.fit",
        criteria.iso_or_gain,
        criteria.exposure,
        criteria.temperature_label,
        criteria.resolution,
        criteria.binning,
        frame_count,
        date.format("%Y-%m-%d")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria(temperature_label: &str) -> CompleteCriteria {
        CompleteCriteria {
            temperature_label: temperature_label.to_string(),
            iso_or_gain: "800".into(),
            exposure: "120".into(),
            resolution: "4144x2822".into(),
            binning: "1x1".into(),
        }
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_library_name("ScopeA"), "ScopeA");
        assert_eq!(sanitize_library_name("My Scope/ASI 294"), "My_Scope_ASI_294");
        assert_eq!(sanitize_library_name("kühl-1"), "k_hl-1");
        assert_eq!(
            sanitize_library_name(crate::master::staging::STAGING_DIR_NAME),
            "_master_dark_tmp"
        );
    }

    #[test]
    fn test_master_file_name() {
        let date = NaiveDate::from_ymd_opt(2025, 8, 14).unwrap();
        assert_eq!(
            master_file_name(&criteria("-10"), 2, date),
            "master-dark_iso800_120s_-10c_4144x2822_bin1x1_2x_2025-08-14.fit"
        );
        assert_eq!(
            master_file_name(&criteria("-15--5"), 12, date),
            "master-dark_iso800_120s_-15--5c_4144x2822_bin1x1_12x_2025-08-14.fit"
        );
    }

    #[test]
    fn test_output_dir() {
        assert_eq!(
            output_dir(Path::new("/masters"), "Scope A", "120"),
            PathBuf::from("/masters/Scope_A/120s")
        );
    }
}
