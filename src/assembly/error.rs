use std::path::PathBuf;
use thiserror::Error;

/// Stage failures raised while assembling one cluster.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AssemblyError {
    #[error("assembler exited with status {status}")]
    AssemblerFailure { status: i32 },
    #[error("assembler log is missing the completion marker")]
    MalformedLog(PathBuf),
    #[error("reference alignment failed: {0}")]
    ReferenceAlignment(String),
    #[error("{0}")]
    Io(String),
}

impl AssemblyError {
    pub fn is_assembler_failure(&self) -> bool {
        matches!(
            self,
            AssemblyError::AssemblerFailure { .. } | AssemblyError::MalformedLog(_)
        )
    }
}

impl From<String> for AssemblyError {
    fn from(msg: String) -> Self {
        AssemblyError::Io(msg)
    }
}
