//! Synthesis backends
//!
//! The stacking itself is delegated to an external engine. The pipeline only
//! hands over a working directory containing the staged frames, the
//! combination method and the destination file.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use tracing::{debug, info};

use crate::error::{DarkError, Result};

/// Sequence name used for the converted frames inside the staging directory
const SEQUENCE_NAME: &str = "seq_dark";

/// Statistical outlier rejection with fixed sigma thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RejectionMethod {
    pub low_sigma: f64,
    pub high_sigma: f64,
}

impl Default for RejectionMethod {
    fn default() -> Self {
        Self {
            low_sigma: 3.0,
            high_sigma: 3.0,
        }
    }
}

/// Everything the backend needs for one stacking run
#[derive(Debug, Clone, PartialEq)]
pub struct StackRequest {
    /// Directory holding only the staged input frames
    pub working_dir: PathBuf,
    pub method: RejectionMethod,
    /// Where the master frame must be written
    pub output: PathBuf,
}

/// An external image-stacking engine
pub trait SynthesisBackend {
    /// Combine the frames in `request.working_dir` into `request.output`.
    /// Failures are reported as `SynthesisBackend` errors with diagnostics.
    fn stack(&self, request: &StackRequest) -> Result<()>;
}

/// Drives Siril in console mode (`siril-cli -s -`), feeding the script on stdin
#[derive(Debug, Clone)]
pub struct SirilCli {
    executable: PathBuf,
}

impl SirilCli {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Siril script: enter the staging directory, convert the frames to a
    /// sequence, stack it with rejection into the destination
    pub fn script(request: &StackRequest) -> String {
        format!(
            "requires 1.2.0\n\
             cd \"{}\"\n\
             convert {seq}\n\
             stack {seq} rej {} {} -out=\"{}\"\n",
            request.working_dir.display(),
            request.method.low_sigma,
            request.method.high_sigma,
            request.output.display(),
            seq = SEQUENCE_NAME,
        )
    }
}

impl SynthesisBackend for SirilCli {
    fn stack(&self, request: &StackRequest) -> Result<()> {
        let script = Self::script(request);
        debug!("Siril script:\n{}", script);

        let mut child = Command::new(&self.executable)
            .arg("-d")
            .arg(&request.working_dir)
            .arg("-s")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                DarkError::SynthesisBackend(format!(
                    "could not start '{}' (set SIRIL_CLI or --siril to override): {}",
                    self.executable.display(),
                    e
                ))
            })?;

        // stdin is dropped right after writing, which closes the pipe
        let sent = child
            .stdin
            .take()
            .map(|mut stdin| stdin.write_all(script.as_bytes()))
            .transpose();
        if let Err(e) = sent {
            return Err(abort(child, &format!("could not send script to Siril: {}", e)));
        }

        let output = child.wait_with_output().map_err(|e| {
            DarkError::SynthesisBackend(format!("waiting for Siril failed: {}", e))
        })?;

        if !output.status.success() {
            return Err(DarkError::SynthesisBackend(diagnostic(
                &output.stdout,
                &output.stderr,
                &format!("Siril exited with {}", output.status),
            )));
        }
        if !request.output.exists() {
            return Err(DarkError::SynthesisBackend(diagnostic(
                &output.stdout,
                &output.stderr,
                "Siril finished without writing the master dark",
            )));
        }

        info!("🌑 Siril stacked master dark: {}", request.output.display());
        Ok(())
    }
}

/// Kill and reap a Siril process that cannot complete its run
fn abort(mut child: Child, reason: &str) -> DarkError {
    if let Err(e) = child.kill() {
        debug!("Siril already exited: {}", e);
    }
    match child.wait_with_output() {
        Ok(output) => DarkError::SynthesisBackend(diagnostic(&output.stdout, &output.stderr, reason)),
        Err(e) => DarkError::SynthesisBackend(format!("{} (waiting for Siril failed: {})", reason, e)),
    }
}

/// Prefer stderr, then stdout, then the fallback message
fn diagnostic(stdout: &[u8], stderr: &[u8], fallback: &str) -> String {
    let stderr = String::from_utf8_lossy(stderr).trim().to_string();
    let stdout = String::from_utf8_lossy(stdout).trim().to_string();
    if !stderr.is_empty() {
        format!("{}: {}", fallback, stderr)
    } else if !stdout.is_empty() {
        format!("{}: {}", fallback, stdout)
    } else {
        fallback.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> StackRequest {
        StackRequest {
            working_dir: PathBuf::from("/out/.master_dark_tmp"),
            method: RejectionMethod::default(),
            output: PathBuf::from("/out/ScopeA/120s/master.fit"),
        }
    }

    #[test]
    fn test_script_commands() {
        let script = SirilCli::script(&request());
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(
            lines,
            vec![
                "requires 1.2.0",
                "cd \"/out/.master_dark_tmp\"",
                "convert seq_dark",
                "stack seq_dark rej 3 3 -out=\"/out/ScopeA/120s/master.fit\"",
            ]
        );
    }

    #[test]
    fn test_missing_executable_is_backend_error() {
        let siril = SirilCli::new("/nonexistent/siril-cli");
        let err = siril.stack(&request()).unwrap_err();
        assert!(matches!(err, DarkError::SynthesisBackend(_)));
        assert!(err.to_string().contains("could not start"));
    }

    #[cfg(unix)]
    #[test]
    fn test_abort_kills_and_reaps_the_process() {
        let child = Command::new("sleep")
            .arg("30")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();

        let started = std::time::Instant::now();
        let err = abort(child, "could not send script to Siril");
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
        assert!(matches!(err, DarkError::SynthesisBackend(_)));
        assert!(err.to_string().contains("could not send script to Siril"));
    }

    #[cfg(unix)]
    #[test]
    fn test_backend_exiting_early_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let request = StackRequest {
            working_dir: tmp.path().to_path_buf(),
            method: RejectionMethod::default(),
            output: tmp.path().join("master.fit"),
        };
        let err = SirilCli::new("true").stack(&request).unwrap_err();
        assert!(matches!(err, DarkError::SynthesisBackend(_)));
    }

    #[test]
    fn test_diagnostic_prefers_stderr() {
        assert_eq!(diagnostic(b"out", b"err\n", "failed"), "failed: err");
        assert_eq!(diagnostic(b" out ", b"", "failed"), "failed: out");
        assert_eq!(diagnostic(b"", b"", "failed"), "failed");
    }
}
