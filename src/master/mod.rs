/// Master dark synthesis
///
/// This module handles:
/// - The scoped staging directory for frame copies (staging.rs)
/// - Output folder and file naming (naming.rs)
/// - The external stacking engine seam and its Siril adapter (backend.rs)
/// - The select / stage / stack / publish pipeline (pipeline.rs)

pub mod backend;
pub mod naming;
pub mod pipeline;
pub mod staging;

pub use backend::{RejectionMethod, SirilCli, StackRequest, SynthesisBackend};
pub use pipeline::{synthesize, MasterDarkRequest};
