//! Compiler version strings and platform-specific executable names

use crate::error::{RecompileError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A pinned solc version, e.g. `0.8.19+commit.7dd6d404`
///
/// Block explorers report versions with a leading `v` tag; it is stripped on
/// parse so the stored value can be used directly in file names and URLs.
/// Only `[0-9A-Za-z.+-]` is accepted, so a version never names a path
/// outside the executable cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompilerVersion(String);

impl CompilerVersion {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let version = trimmed.strip_prefix('v').unwrap_or(trimmed);

        if version.is_empty() || !version.chars().all(is_version_char) {
            return Err(RecompileError::InvalidVersion(raw.to_string()));
        }

        Ok(Self(version.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the release binary in the solc-bin layout
    pub fn executable_name(&self, platform: Platform) -> String {
        format!("solc-{}-v{}", platform.dir_name(), self.0)
    }
}

fn is_version_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-')
}

impl fmt::Display for CompilerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Target platform of the downloaded solc builds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    #[default]
    LinuxAmd64,
    MacosxAmd64,
}

impl Platform {
    /// Directory name used by the artifact repository
    pub fn dir_name(&self) -> &'static str {
        match self {
            Platform::LinuxAmd64 => "linux-amd64",
            Platform::MacosxAmd64 => "macosx-amd64",
        }
    }
}
