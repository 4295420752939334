//! Configuration for executable resolution, fetching and invocation

use crate::{
    error::{RecompileError, Result},
    version::Platform,
};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Default temporary cache directory for downloaded executables
pub const DEFAULT_CACHE_DIR: &str = "/tmp/solc-repo";

/// Default named repository directory, relative to the working directory
pub const DEFAULT_REPO_DIR: &str = "solc-repo";

/// Root of the solc release binaries
pub const DEFAULT_REPOSITORY_URL: &str = "https://github.com/ethereum/solc-bin/raw/gh-pages/";

/// Capture buffer for compiler standard output
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Environment variable overriding the temporary cache directory
pub const ENV_CACHE_DIR: &str = "SOLC_REPO_TMP";

/// Environment variable overriding the repository directory
pub const ENV_REPO_DIR: &str = "SOLC_REPO";

/// Main configuration for locating, fetching and running solc
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompilerConfig {
    /// Temporary cache directory, searched first and used as fetch destination
    pub cache_dir: PathBuf,

    /// Named repository directory, searched second
    pub repo_dir: PathBuf,

    /// Root URL of the release artifact repository
    pub repository_url: String,

    /// Platform of the binaries to look for and download
    pub platform: Platform,

    /// Maximum accepted size of the compiler's standard output
    pub max_output_bytes: usize,

    /// Optional timeout for executable downloads, in seconds
    pub fetch_timeout_secs: Option<u64>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            repo_dir: PathBuf::from(DEFAULT_REPO_DIR),
            repository_url: DEFAULT_REPOSITORY_URL.to_string(),
            platform: Platform::default(),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            fetch_timeout_secs: None,
        }
    }
}

impl CompilerConfig {
    /// Defaults overridden by `SOLC_REPO_TMP` and `SOLC_REPO`
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Same as [`CompilerConfig::from_env`] with an injected variable lookup
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self::default().with_env_overrides(lookup)
    }

    /// Apply `SOLC_REPO_TMP` / `SOLC_REPO` on top of this configuration
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(ENV_CACHE_DIR).filter(|v| !v.is_empty()) {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(ENV_REPO_DIR).filter(|v| !v.is_empty()) {
            self.repo_dir = PathBuf::from(dir);
        }
        self
    }

    /// Load configuration from a TOML file; missing keys keep their defaults
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| RecompileError::io(path, e))?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            RecompileError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Directories searched for a cached executable, in order
    pub fn candidate_dirs(&self) -> [&Path; 2] {
        [self.cache_dir.as_path(), self.repo_dir.as_path()]
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }

    /// Validates the entire configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_output_bytes == 0 {
            return Err(RecompileError::Config(
                "max_output_bytes must be greater than zero".to_string(),
            ));
        }

        url::Url::parse(&self.repository_url).map_err(|e| {
            RecompileError::Config(format!(
                "Invalid repository URL {:?}: {}",
                self.repository_url, e
            ))
        })?;

        Ok(())
    }

    /// Create a new builder for CompilerConfig
    pub fn builder() -> CompilerConfigBuilder {
        CompilerConfigBuilder::default()
    }
}

/// Builder for creating CompilerConfig with a fluent API
#[derive(Default)]
pub struct CompilerConfigBuilder {
    config: CompilerConfig,
}

impl CompilerConfigBuilder {
    pub fn cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = path.into();
        self
    }

    pub fn repo_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.repo_dir = path.into();
        self
    }

    pub fn repository_url(mut self, url: impl Into<String>) -> Self {
        self.config.repository_url = url.into();
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.config.platform = platform;
        self
    }

    pub fn max_output_bytes(mut self, limit: usize) -> Self {
        self.config.max_output_bytes = limit;
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = Some(secs);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<CompilerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
