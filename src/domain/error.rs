//! Domain error types.

use chrono::NaiveDate;
use std::fmt;

use crate::domain::model::ModelError;

/// Pipeline stage an error was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Features,
    Portfolio,
    Simulation,
    Summary,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Features => "features",
            Stage::Portfolio => "portfolio",
            Stage::Simulation => "simulation",
            Stage::Summary => "summary",
        };
        f.write_str(name)
    }
}

/// Top-level error type for lsquant.
#[derive(Debug, thiserror::Error)]
pub enum LsquantError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("invalid panel: {reason}")]
    InvalidPanel { reason: String },

    #[error("insufficient data in {stage} stage: {reason}")]
    InsufficientData { stage: Stage, reason: String },

    #[error("unsupported model kind '{kind}'")]
    UnsupportedModel { kind: String },

    #[error("empty score set: {reason}")]
    EmptyScoreSet { reason: String },

    #[error("model fit failed at {date} (training window {window}): {source}")]
    Model {
        date: NaiveDate,
        window: String,
        #[source]
        source: ModelError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LsquantError {
    pub fn insufficient(stage: Stage, reason: impl Into<String>) -> Self {
        LsquantError::InsufficientData {
            stage,
            reason: reason.into(),
        }
    }
}

impl From<&LsquantError> for std::process::ExitCode {
    fn from(err: &LsquantError) -> Self {
        let code: u8 = match err {
            LsquantError::Io(_) => 1,
            LsquantError::ConfigParse { .. } | LsquantError::ConfigInvalid { .. } => 2,
            LsquantError::Data { .. } | LsquantError::InvalidPanel { .. } => 3,
            LsquantError::UnsupportedModel { .. } | LsquantError::Model { .. } => 4,
            LsquantError::InsufficientData { .. } | LsquantError::EmptyScoreSet { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
