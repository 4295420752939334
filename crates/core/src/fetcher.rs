//! Downloading pinned solc releases into the local cache

use crate::{
    error::{RecompileError, Result},
    resolver::validate_executable,
    utils,
    version::{CompilerVersion, Platform},
};
use async_trait::async_trait;
use std::{path::Path, sync::Arc, time::Duration};
use url::Url;

const USER_AGENT: &str = concat!("solc-recompile/", env!("CARGO_PKG_VERSION"));

/// Status and body of a completed download request
#[derive(Debug, Clone)]
pub struct DownloadResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl DownloadResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Transport used to fetch release binaries
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Issue a GET request; only transport failures are errors
    async fn download(&self, url: &Url) -> Result<DownloadResponse>;
}

/// `reqwest` backed downloader
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| RecompileError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &Url) -> Result<DownloadResponse> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| RecompileError::Download(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| RecompileError::Download(e.to_string()))?;

        Ok(DownloadResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// Percent-encode a single path segment the way `encodeURIComponent` does
fn encode_component(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => encoded.push(byte as char),
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

/// Deterministic download location of `file_name` for `platform`
pub fn download_url(repository_url: &str, platform: Platform, file_name: &str) -> Result<Url> {
    let mut root = repository_url.to_string();
    if !root.ends_with('/') {
        root.push('/');
    }

    let url = format!(
        "{}{}/{}",
        root,
        platform.dir_name(),
        encode_component(file_name)
    );

    Url::parse(&url)
        .map_err(|e| RecompileError::Config(format!("Invalid download URL {url:?}: {e}")))
}

/// Downloads executables into the cache and validates them
#[derive(Clone)]
pub struct ExecutableFetcher {
    downloader: Arc<dyn Downloader>,
    repository_url: String,
    platform: Platform,
}

impl std::fmt::Debug for ExecutableFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutableFetcher")
            .field("repository_url", &self.repository_url)
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

impl ExecutableFetcher {
    pub fn new(
        downloader: Arc<dyn Downloader>,
        repository_url: impl Into<String>,
        platform: Platform,
    ) -> Self {
        Self {
            downloader,
            repository_url: repository_url.into(),
            platform,
        }
    }

    /// Fetch `version` into `dest`; true only if the written binary validates
    ///
    /// Nothing is written unless the server answers 200. Every failure is
    /// logged and reported as `false`.
    pub async fn fetch(&self, version: &CompilerVersion, dest: &Path) -> bool {
        let file_name = version.executable_name(self.platform);
        let url = match download_url(&self.repository_url, self.platform, &file_name) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(%version, error = %e, "Cannot build solc download URL");
                return false;
            }
        };

        tracing::info!(%version, %url, "Fetching executable solc");

        let response = match self.downloader.download(&url).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(%version, %url, error = %e, "Failed fetching executable solc");
                return false;
            }
        };

        if !response.is_ok() {
            tracing::error!(
                %version,
                %url,
                status = response.status,
                "Failed fetching executable solc"
            );
            return false;
        }

        tracing::info!(%version, "Fetched executable solc ({} bytes)", response.body.len());
        tracing::debug!(%version, "solc sha256 {}", utils::hash_bytes(&response.body));

        if let Err(e) = install_executable(dest, &response.body) {
            tracing::error!(%version, error = %e, "Failed to store executable solc");
            return false;
        }

        let path = dest.to_path_buf();
        match tokio::task::spawn_blocking(move || validate_executable(&path)).await {
            Ok(valid) => valid,
            Err(e) => {
                tracing::error!(%version, error = %e, "solc validation task failed");
                false
            }
        }
    }
}

/// Replace the file at `dest` with `bytes`, marked executable
fn install_executable(dest: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| RecompileError::io(parent, e))?;
    }

    // Another process may recreate `dest` between the remove and the write;
    // the write then overwrites its copy.
    match std::fs::remove_file(dest) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(RecompileError::io(dest, e)),
    }

    write_executable(dest, bytes).map_err(|e| RecompileError::io(dest, e))?;
    tracing::debug!("Wrote solc to {}", dest.display());
    Ok(())
}

#[cfg(unix)]
fn write_executable(dest: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::{
        io::Write,
        os::unix::fs::{OpenOptionsExt, PermissionsExt},
    };

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o755)
        .open(dest)?;
    file.write_all(bytes)?;
    // mode() is filtered by the umask
    file.set_permissions(std::fs::Permissions::from_mode(0o755))?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_executable(dest: &Path, bytes: &[u8]) -> std::io::Result<()> {
    std::fs::write(dest, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDownloader;
    use tempfile::TempDir;

    fn version() -> CompilerVersion {
        CompilerVersion::parse("v0.8.19+commit.7dd6d404").unwrap()
    }

    #[test]
    fn test_download_url_encodes_file_name() {
        let url = download_url(
            "https://github.com/ethereum/solc-bin/raw/gh-pages/",
            Platform::LinuxAmd64,
            "solc-linux-amd64-v0.8.19+commit.7dd6d404",
        )
        .unwrap();

        assert_eq!(
            url.as_str(),
            "https://github.com/ethereum/solc-bin/raw/gh-pages/linux-amd64/solc-linux-amd64-v0.8.19%2Bcommit.7dd6d404"
        );
    }

    #[test]
    fn test_download_url_without_trailing_slash() {
        let url = download_url("http://localhost:8080/bin", Platform::MacosxAmd64, "solc a").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/bin/macosx-amd64/solc%20a");
    }

    #[tokio::test]
    async fn test_non_ok_status_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("cache").join(version().executable_name(Platform::LinuxAmd64));
        let downloader = MockDownloader::new(404, b"Not Found");
        let fetcher = ExecutableFetcher::new(
            downloader.clone(),
            "https://example.com/solc-bin/",
            Platform::LinuxAmd64,
        );

        assert!(!fetcher.fetch(&version(), &dest).await);
        assert!(!dest.exists());
        assert!(!dest.parent().unwrap().exists());
        assert_eq!(
            downloader.requests.lock().unwrap().as_slice(),
            ["https://example.com/solc-bin/linux-amd64/solc-linux-amd64-v0.8.19%2Bcommit.7dd6d404"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_replaces_and_validates() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let dest = dir
            .path()
            .join("nested/cache")
            .join(version().executable_name(Platform::LinuxAmd64));
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(&dest, "stale").unwrap();

        let script = b"#!/bin/sh\necho 'solc, the solidity compiler commandline interface'\n";
        let fetcher = ExecutableFetcher::new(
            MockDownloader::new(200, script),
            "https://example.com/",
            Platform::LinuxAmd64,
        );

        assert!(fetcher.fetch(&version(), &dest).await);
        assert_eq!(std::fs::read(&dest).unwrap(), script);
        let mode = std::fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_overwrites_concurrently_recreated_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("solc");
        // Left by another process after this one removed the old copy
        std::fs::write(&dest, "a longer binary written by another process").unwrap();

        write_executable(&dest, b"#!/bin/sh\n").unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"#!/bin/sh\n");
        let mode = std::fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_invalid_binary_fails_validation() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("solc");
        let fetcher = ExecutableFetcher::new(
            MockDownloader::new(200, b"#!/bin/sh\nexit 3\n"),
            "https://example.com/",
            Platform::LinuxAmd64,
        );

        assert!(!fetcher.fetch(&version(), &dest).await);
        assert!(dest.exists());
    }
}
