use evimpact_core::{AnalysisError, CoreError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] evimpact_core::ValidationError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("failed to load '{path}': {source}")]
    Load { path: String, source: CoreError },

    #[error("command error: {0}")]
    Command(String),

    #[error("strict mode failed: warnings={warning_count}, errors={error_count}")]
    StrictModeViolation {
        warning_count: usize,
        error_count: usize,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Analysis(AnalysisError::InvalidConfiguration(_)) => 2,
            Self::Analysis(AnalysisError::Internal(_)) => 1,
            Self::Load { source, .. } => match source {
                CoreError::Validation(_) => 2,
                CoreError::Serialization(_) => 4,
                CoreError::Io(_) => 10,
            },
            Self::Command(_) => 2,
            Self::StrictModeViolation { .. } => 5,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}
