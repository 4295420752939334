//! Shared helpers for unit tests

use crate::{
    config::CompilerConfig,
    error::Result,
    fetcher::{DownloadResponse, Downloader},
};
use async_trait::async_trait;
use std::{
    path::Path,
    sync::{Arc, Mutex},
};
use tempfile::TempDir;
use url::Url;

/// Serves a canned response and records requested URLs
pub struct MockDownloader {
    response: DownloadResponse,
    pub requests: Mutex<Vec<String>>,
}

impl MockDownloader {
    pub fn new(status: u16, body: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            response: DownloadResponse {
                status,
                body: body.to_vec(),
            },
            requests: Mutex::new(vec![]),
        })
    }

    pub fn not_found() -> Arc<Self> {
        Self::new(404, b"Not Found")
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Downloader for MockDownloader {
    async fn download(&self, url: &Url) -> Result<DownloadResponse> {
        self.requests.lock().unwrap().push(url.to_string());
        Ok(self.response.clone())
    }
}

/// Shell script standing in for solc: answers `--version`, and for
/// `--standard-json` drains stdin and prints `stdout`
pub fn fake_solc(stdout: &str) -> String {
    format!(
        "#!/bin/sh\nif [ \"$1\" = \"--version\" ]; then\n  echo 'solc, the solidity compiler commandline interface'\n  exit 0\nfi\ncat > /dev/null\nprintf '%s' '{}'\n",
        stdout.replace('\'', "'\\''")
    )
}

#[cfg(unix)]
pub fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Config whose cache and repo directories live under `dir`
pub fn temp_config(dir: &TempDir) -> CompilerConfig {
    CompilerConfig::builder()
        .cache_dir(dir.path().join("cache"))
        .repo_dir(dir.path().join("repo"))
        .repository_url("https://example.com/solc-bin/")
        .build()
        .unwrap()
}
