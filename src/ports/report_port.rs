//! Report emission port.

use crate::domain::error::LsquantError;
use crate::domain::pipeline::PipelineOutput;
use std::path::{Path, PathBuf};

/// Port for persisting the results of a pipeline run.
pub trait ReportPort {
    /// Write the report under `output_dir` and return the files written.
    fn write(&self, output: &PipelineOutput, output_dir: &Path) -> Result<Vec<PathBuf>, LsquantError>;
}
