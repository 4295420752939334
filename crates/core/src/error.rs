//! Error types for recompilation

use std::path::PathBuf;

/// Errors raised while rebuilding and compiling a verified contract
#[derive(Debug, thiserror::Error)]
pub enum RecompileError {
    #[error("No usable solc executable for version {version} and no in-process compiler available")]
    ExecutableNotFound { version: String },

    #[error("Failed to download solc: {0}")]
    Download(String),

    #[error("Compilation output size too large (limit: {limit} bytes)")]
    OutputTooLarge { limit: usize },

    #[error("Compilation error: {0}")]
    CompilationError(String),

    #[error("Recompilation error (probably caused by invalid metadata)")]
    RecompilationError,

    #[error("Compiler error:\n{message}")]
    CompilerReported { message: String },

    #[error("Invalid compiler version: {0:?}")]
    InvalidVersion(String),

    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Invalid compiler input: {0}")]
    InvalidInput(String),

    #[error("Invalid compiler output: {0}")]
    InvalidOutput(#[source] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Block explorer request failed: {0}")]
    Explorer(String),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RecompileError {
    /// True when solc ran and rejected the reconstructed sources
    pub fn is_compiler_reported(&self) -> bool {
        matches!(self, RecompileError::CompilerReported { .. })
    }

    /// Stable tag for machine-readable error output
    pub fn kind(&self) -> &'static str {
        match self {
            RecompileError::ExecutableNotFound { .. } => "executable_not_found",
            RecompileError::Download(_) => "download_error",
            RecompileError::OutputTooLarge { .. } => "output_too_large",
            RecompileError::CompilationError(_) => "compilation_error",
            RecompileError::RecompilationError => "recompilation_error",
            RecompileError::CompilerReported { .. } => "compiler_reported_error",
            RecompileError::InvalidVersion(_) => "invalid_version",
            RecompileError::InvalidSource(_) => "invalid_source",
            RecompileError::InvalidInput(_) => "invalid_input",
            RecompileError::InvalidOutput(_) => "invalid_output",
            RecompileError::Config(_) => "invalid_config",
            RecompileError::Explorer(_) => "explorer_error",
            RecompileError::Io { .. } => "io_error",
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RecompileError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = RecompileError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compiler_reported_is_distinguished() {
        let reported = RecompileError::CompilerReported {
            message: "Error: boom".to_string(),
        };
        assert!(reported.is_compiler_reported());
        assert_eq!(reported.kind(), "compiler_reported_error");
        assert_eq!(reported.to_string(), "Compiler error:\nError: boom");

        let infra = RecompileError::OutputTooLarge { limit: 16 };
        assert!(!infra.is_compiler_reported());
        assert_eq!(infra.kind(), "output_too_large");

        let download = RecompileError::Download("connection reset".to_string());
        assert!(!download.is_compiler_reported());
        assert_eq!(download.kind(), "download_error");
    }
}
