use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{info, warn};

use super::backend::{RejectionMethod, StackRequest, SynthesisBackend};
use super::naming::{master_file_name, output_dir};
use super::staging::StagingDir;
use crate::error::{DarkError, Result};
use crate::filter::{CompleteCriteria, FrameFilter, SelectionCriteria, MIN_STACK_FRAMES};
use crate::state::catalog::FrameCatalog;

/// Parameters of one master dark run
#[derive(Debug, Clone)]
pub struct MasterDarkRequest<'a> {
    /// Library name, used for the output folder
    pub library_name: &'a str,
    pub criteria: &'a SelectionCriteria,
    /// Maximum number of frames to stack (at least 2)
    pub desired_count: usize,
    /// Target directory; staging and output folders are created inside it
    pub output_root: &'a Path,
    /// Calendar date written into the file name
    pub date: NaiveDate,
}

/// Select matching frames, stage them, stack them and publish the master dark.
///
/// Returns the path of the written master. The staging directory is removed
/// on every exit path; a partial output left by a failing backend is kept.
pub fn synthesize(
    catalog: &FrameCatalog,
    request: &MasterDarkRequest<'_>,
    backend: &dyn SynthesisBackend,
) -> Result<PathBuf> {
    let criteria = CompleteCriteria::try_from(request.criteria)?;
    if request.desired_count < MIN_STACK_FRAMES {
        return Err(DarkError::invalid(format!(
            "at least {} frames must be requested, got {}",
            MIN_STACK_FRAMES, request.desired_count
        )));
    }

    // Nothing on disk is touched before this point
    let filter = FrameFilter::from_criteria(request.criteria);
    let frames = catalog.matching_paths(&filter, request.desired_count)?;
    if frames.len() < MIN_STACK_FRAMES {
        return Err(DarkError::InsufficientFrames {
            found: frames.len(),
        });
    }
    info!(
        "🎯 Stacking {} frames from library '{}'",
        frames.len(),
        request.library_name
    );

    let staging = StagingDir::acquire(request.output_root)?;
    for (index, frame) in frames.iter().enumerate() {
        staging.stage(index, frame)?;
    }

    let out_dir = output_dir(request.output_root, request.library_name, &criteria.exposure);
    fs::create_dir_all(&out_dir)
        .map_err(|e| DarkError::io(format!("creating output folder {}", out_dir.display()), e))?;
    let output = out_dir.join(master_file_name(&criteria, frames.len(), request.date));

    let stack_request = StackRequest {
        working_dir: staging.path().to_path_buf(),
        method: RejectionMethod::default(),
        output: output.clone(),
    };
    let stacked = backend.stack(&stack_request);

    if let Err(e) = staging.release() {
        warn!("⚠️  {}", e);
    }

    // A partial output from a failed run stays for inspection
    stacked?;
    info!("✅ Master dark created: {}", output.display());
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::TemperatureConstraint;
    use crate::state::catalog::tests::frame;
    use crate::master::staging::STAGING_DIR_NAME;
    use std::cell::RefCell;

    /// Writes the output file and remembers what it was given
    #[derive(Default)]
    struct RecordingBackend {
        staged: RefCell<Vec<String>>,
        requests: RefCell<Vec<StackRequest>>,
    }

    impl SynthesisBackend for RecordingBackend {
        fn stack(&self, request: &StackRequest) -> Result<()> {
            let mut staged: Vec<String> = fs::read_dir(&request.working_dir)
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
                .collect();
            staged.sort();
            *self.staged.borrow_mut() = staged;
            self.requests.borrow_mut().push(request.clone());
            fs::write(&request.output, "master").unwrap();
            Ok(())
        }
    }

    /// Leaves a partial output behind and fails
    struct FailingBackend;

    impl SynthesisBackend for FailingBackend {
        fn stack(&self, request: &StackRequest) -> Result<()> {
            fs::write(&request.output, "partial").unwrap();
            Err(DarkError::SynthesisBackend("stacking aborted: out of memory".into()))
        }
    }

    struct ScopeA {
        tmp: tempfile::TempDir,
        catalog: FrameCatalog,
    }

    impl ScopeA {
        fn output_root(&self) -> PathBuf {
            self.tmp.path().join("masters")
        }
    }

    /// Three cataloged ScopeA darks on disk
    fn scope_a() -> ScopeA {
        let tmp = tempfile::tempdir().unwrap();
        let darks = tmp.path().join("darks");
        fs::create_dir_all(&darks).unwrap();

        let mut records = Vec::new();
        for n in 1..=3 {
            let path = darks.join(format!("dark_{}.fit", n));
            fs::write(&path, format!("dark {}", n)).unwrap();
            records.push(frame(&path.to_string_lossy(), -10.0, Some(800), None, 120.0));
        }

        let mut catalog = FrameCatalog::open_in_memory().unwrap();
        catalog.insert_frames(&records).unwrap();
        fs::create_dir_all(tmp.path().join("masters")).unwrap();
        ScopeA { tmp, catalog }
    }

    fn full_criteria() -> SelectionCriteria {
        SelectionCriteria {
            temperature: Some(TemperatureConstraint::Exact(-10.0)),
            iso_or_gain: Some("800".into()),
            exposure: Some("120".into()),
            resolution: Some("4144x2822".into()),
            binning: Some("1x1".into()),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 14).unwrap()
    }

    fn entries(dir: &Path) -> Vec<PathBuf> {
        let mut entries: Vec<PathBuf> = fs::read_dir(dir).unwrap().map(|e| e.unwrap().path()).collect();
        entries.sort();
        entries
    }

    #[test]
    fn test_synthesize_publishes_master() {
        let lib = scope_a();
        let root = lib.output_root();
        let criteria = full_criteria();
        let backend = RecordingBackend::default();

        let output = synthesize(
            &lib.catalog,
            &MasterDarkRequest {
                library_name: "ScopeA",
                criteria: &criteria,
                desired_count: 2,
                output_root: &root,
                date: date(),
            },
            &backend,
        )
        .unwrap();

        assert_eq!(
            output,
            root.join("ScopeA")
                .join("120s")
                .join("master-dark_iso800_120s_-10c_4144x2822_bin1x1_2x_2025-08-14.fit")
        );
        assert!(output.exists());
        assert!(!root.join(STAGING_DIR_NAME).exists());
        assert_eq!(*backend.staged.borrow(), vec!["0001_dark_1.fit", "0002_dark_2.fit"]);

        let requests = backend.requests.borrow();
        assert_eq!(requests[0].method, RejectionMethod { low_sigma: 3.0, high_sigma: 3.0 });
        assert_eq!(requests[0].working_dir, root.join(STAGING_DIR_NAME));
    }

    #[test]
    fn test_backend_failure_cleans_staging_and_keeps_output() {
        let lib = scope_a();
        let root = lib.output_root();
        let criteria = full_criteria();

        let err = synthesize(
            &lib.catalog,
            &MasterDarkRequest {
                library_name: "ScopeA",
                criteria: &criteria,
                desired_count: 2,
                output_root: &root,
                date: date(),
            },
            &FailingBackend,
        )
        .unwrap_err();

        assert!(matches!(err, DarkError::SynthesisBackend(_)));
        assert!(err.to_string().contains("out of memory"));
        assert!(!root.join(STAGING_DIR_NAME).exists());
        assert!(root
            .join("ScopeA/120s/master-dark_iso800_120s_-10c_4144x2822_bin1x1_2x_2025-08-14.fit")
            .exists());
    }

    #[test]
    fn test_insufficient_frames_leaves_output_root_unchanged() {
        let lib = scope_a();
        let root = lib.output_root();
        let mut criteria = full_criteria();
        criteria.temperature = Some(TemperatureConstraint::Exact(-20.0));

        let before = entries(&root);
        let err = synthesize(
            &lib.catalog,
            &MasterDarkRequest {
                library_name: "ScopeA",
                criteria: &criteria,
                desired_count: 3,
                output_root: &root,
                date: date(),
            },
            &RecordingBackend::default(),
        )
        .unwrap_err();

        assert!(matches!(err, DarkError::InsufficientFrames { found: 0 }));
        assert_eq!(entries(&root), before);
    }

    #[test]
    fn test_incomplete_criteria_and_small_count_are_rejected() {
        let lib = scope_a();
        let root = lib.output_root();

        let mut criteria = full_criteria();
        criteria.binning = None;
        let request = MasterDarkRequest {
            library_name: "ScopeA",
            criteria: &criteria,
            desired_count: 2,
            output_root: &root,
            date: date(),
        };
        assert!(matches!(
            synthesize(&lib.catalog, &request, &RecordingBackend::default()),
            Err(DarkError::InvalidInput(_))
        ));

        let criteria = full_criteria();
        let request = MasterDarkRequest {
            criteria: &criteria,
            desired_count: 1,
            ..request
        };
        assert!(matches!(
            synthesize(&lib.catalog, &request, &RecordingBackend::default()),
            Err(DarkError::InvalidInput(_))
        ));
        assert!(entries(&root).is_empty());
    }

    #[test]
    fn test_library_named_like_staging_keeps_its_masters() {
        let lib = scope_a();
        let root = lib.output_root();
        let earlier = root.join("master_dark_tmp").join("60s").join("earlier.fit");
        fs::create_dir_all(earlier.parent().unwrap()).unwrap();
        fs::write(&earlier, "master").unwrap();

        let criteria = full_criteria();
        let output = synthesize(
            &lib.catalog,
            &MasterDarkRequest {
                library_name: "master_dark_tmp",
                criteria: &criteria,
                desired_count: 2,
                output_root: &root,
                date: date(),
            },
            &RecordingBackend::default(),
        )
        .unwrap();

        assert!(output.starts_with(root.join("master_dark_tmp")));
        assert!(output.exists());
        assert!(earlier.exists());
        assert!(!root.join(STAGING_DIR_NAME).exists());
    }

    #[test]
    fn test_range_label_and_actual_count_in_name() {
        let lib = scope_a();
        let root = lib.output_root();
        let mut criteria = full_criteria();
        criteria.temperature = Some(TemperatureConstraint::Range {
            min: Some(-12.0),
            max: Some(-8.0),
        });

        let output = synthesize(
            &lib.catalog,
            &MasterDarkRequest {
                library_name: "Scope A",
                criteria: &criteria,
                desired_count: 10,
                output_root: &root,
                date: date(),
            },
            &RecordingBackend::default(),
        )
        .unwrap();

        assert_eq!(
            output,
            root.join("Scope_A/120s/master-dark_iso800_120s_-12--8c_4144x2822_bin1x1_3x_2025-08-14.fit")
        );
    }
}
