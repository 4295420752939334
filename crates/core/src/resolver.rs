//! Locating a usable solc executable in the local cache directories

use crate::{
    config::CompilerConfig,
    version::{CompilerVersion, Platform},
};
use std::{
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

/// A solc binary that answered `--version` successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableHandle {
    pub path: PathBuf,
    pub version: CompilerVersion,
}

/// Checks that the binary at `path` runs and exits with status 0 on `--version`
///
/// Failures are logged and reported as `false`.
pub fn validate_executable(path: &Path) -> bool {
    let output = Command::new(path)
        .arg("--version")
        .stdin(Stdio::null())
        .output();

    match output {
        Ok(output) if output.status.success() => {
            tracing::debug!(
                "Validated solc at {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stdout).trim()
            );
            true
        }
        Ok(output) => {
            tracing::error!(
                solc_path = %path.display(),
                status = ?output.status.code(),
                "solc --version failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            false
        }
        Err(e) => {
            tracing::error!(solc_path = %path.display(), error = %e, "Failed to run solc");
            false
        }
    }
}

/// Searches the configured directories for a cached executable
#[derive(Debug, Clone)]
pub struct ExecutableResolver {
    candidate_dirs: Vec<PathBuf>,
    install_dir: PathBuf,
    platform: Platform,
}

impl ExecutableResolver {
    pub fn new(config: &CompilerConfig) -> Self {
        Self {
            candidate_dirs: config
                .candidate_dirs()
                .iter()
                .map(|d| d.to_path_buf())
                .collect(),
            install_dir: config.cache_dir.clone(),
            platform: config.platform,
        }
    }

    /// Candidate executable paths for `version`, in search order
    pub fn candidates(&self, version: &CompilerVersion) -> Vec<PathBuf> {
        let file_name = version.executable_name(self.platform);
        self.candidate_dirs
            .iter()
            .map(|dir| dir.join(&file_name))
            .collect()
    }

    /// Where a fetched executable for `version` is written
    pub fn install_path(&self, version: &CompilerVersion) -> PathBuf {
        self.install_dir.join(version.executable_name(self.platform))
    }

    /// Returns the first existing candidate that validates, if any
    pub fn resolve(&self, version: &CompilerVersion) -> Option<ExecutableHandle> {
        for path in self.candidates(version) {
            if !path.exists() {
                tracing::debug!("No cached solc at {}", path.display());
                continue;
            }

            if validate_executable(&path) {
                tracing::info!("Using cached solc {} at {}", version, path.display());
                return Some(ExecutableHandle {
                    path,
                    version: version.clone(),
                });
            }
        }

        None
    }
}
