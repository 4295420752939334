//! Running solc in standard-JSON mode

use crate::{
    config::CompilerConfig,
    error::{RecompileError, Result},
    fetcher::{Downloader, ExecutableFetcher, HttpDownloader},
    input::CompilerInput,
    resolver::{ExecutableHandle, ExecutableResolver},
    version::CompilerVersion,
};
use std::{
    io::{Read, Write},
    path::Path,
    process::{Command, Stdio},
    sync::Arc,
    time::Instant,
};
use tokio::sync::Mutex;

/// Compiler backend used when no solc executable can be obtained
///
/// Receives the serialised standard-JSON input and returns solc's raw JSON
/// output. Called from a blocking worker thread.
pub trait InProcessCompiler: Send + Sync {
    fn compile(&self, version: &CompilerVersion, input_json: &str) -> Result<String>;
}

/// Resolves, fetches and runs pinned solc executables
pub struct SolcCompiler {
    config: CompilerConfig,
    resolver: ExecutableResolver,
    fetcher: ExecutableFetcher,
    fallback: Option<Arc<dyn InProcessCompiler>>,
    // Serialises cache lookups and downloads for callers sharing this compiler
    install_lock: Mutex<()>,
}

impl std::fmt::Debug for SolcCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolcCompiler")
            .field("config", &self.config)
            .field("fallback", &self.fallback.is_some())
            .finish_non_exhaustive()
    }
}

impl SolcCompiler {
    /// Compiler downloading over HTTP
    pub fn new(config: CompilerConfig) -> Result<Self> {
        config.validate()?;
        let downloader = HttpDownloader::new(config.fetch_timeout())?;
        Ok(Self::with_downloader(config, Arc::new(downloader)))
    }

    pub fn with_downloader(config: CompilerConfig, downloader: Arc<dyn Downloader>) -> Self {
        let resolver = ExecutableResolver::new(&config);
        let fetcher = ExecutableFetcher::new(
            downloader,
            config.repository_url.clone(),
            config.platform,
        );

        Self {
            config,
            resolver,
            fetcher,
            fallback: None,
            install_lock: Mutex::new(()),
        }
    }

    /// Install the backend used when no executable is available
    pub fn with_fallback(mut self, fallback: Arc<dyn InProcessCompiler>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// A validated executable for `version`, from the cache or freshly fetched
    pub async fn executable(&self, version: &CompilerVersion) -> Option<ExecutableHandle> {
        let _guard = self.install_lock.lock().await;

        let resolver = self.resolver.clone();
        let wanted = version.clone();
        let resolved = tokio::task::spawn_blocking(move || resolver.resolve(&wanted))
            .await
            .unwrap_or_else(|e| {
                tracing::error!(%version, error = %e, "solc lookup task failed");
                None
            });

        if resolved.is_some() {
            return resolved;
        }

        let dest = self.resolver.install_path(version);
        if self.fetcher.fetch(version, &dest).await {
            Some(ExecutableHandle {
                path: dest,
                version: version.clone(),
            })
        } else {
            None
        }
    }

    /// Compile `input` with solc `version`, returning the raw JSON output
    pub async fn compile(&self, version: &CompilerVersion, input: &CompilerInput) -> Result<String> {
        input.validate()?;
        let input_json = input.to_json()?;

        if let Some(handle) = self.executable(version).await {
            tracing::info!(
                %version,
                solc_path = %handle.path.display(),
                "Compiling with external executable"
            );

            let limit = self.config.max_output_bytes;
            return tokio::task::spawn_blocking(move || {
                run_standard_json(&handle.path, &input_json, limit)
            })
            .await
            .map_err(|e| RecompileError::CompilationError(format!("compiler task failed: {e}")))?;
        }

        match &self.fallback {
            Some(fallback) => {
                tracing::info!(%version, "Compiling with in-process compiler");
                let fallback = Arc::clone(fallback);
                let version = version.clone();
                tokio::task::spawn_blocking(move || fallback.compile(&version, &input_json))
                    .await
                    .map_err(|e| {
                        RecompileError::CompilationError(format!("compiler task failed: {e}"))
                    })?
            }
            None => Err(RecompileError::ExecutableNotFound {
                version: version.to_string(),
            }),
        }
    }
}

/// Run `<solc> --standard-json`, feeding `input_json` on stdin
///
/// Blocks until the process exits. Standard output beyond
/// `max_output_bytes` kills the process.
pub fn run_standard_json(solc: &Path, input_json: &str, max_output_bytes: usize) -> Result<String> {
    let start = Instant::now();

    let mut child = Command::new(solc)
        .arg("--standard-json")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            tracing::error!(solc_path = %solc.display(), error = %e, "Failed to start solc");
            RecompileError::CompilationError(e.to_string())
        })?;

    let (Some(mut stdin), Some(stdout), Some(mut stderr)) =
        (child.stdin.take(), child.stdout.take(), child.stderr.take())
    else {
        let _ = child.kill();
        return Err(RecompileError::CompilationError(
            "solc stdio pipes unavailable".to_string(),
        ));
    };

    // Feed stdin and drain stderr concurrently so no pipe fills up
    let input = input_json.as_bytes().to_vec();
    let writer = std::thread::spawn(move || stdin.write_all(&input));
    let stderr_reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stderr.read_to_end(&mut buf);
        buf
    });

    let mut buf = Vec::new();
    let read = stdout
        .take(max_output_bytes as u64 + 1)
        .read_to_end(&mut buf);

    let too_large = buf.len() > max_output_bytes;
    if too_large || read.is_err() {
        let _ = child.kill();
    }

    let status = child.wait();
    let write_result = writer.join();
    let stderr_text = stderr_reader
        .join()
        .map(|b| String::from_utf8_lossy(&b).trim().to_string())
        .unwrap_or_default();

    if too_large {
        tracing::error!(
            solc_path = %solc.display(),
            limit = max_output_bytes,
            "Compilation output size too large"
        );
        return Err(RecompileError::OutputTooLarge {
            limit: max_output_bytes,
        });
    }

    read.map_err(|e| {
        tracing::error!(solc_path = %solc.display(), error = %e, "Failed to read solc output");
        RecompileError::CompilationError(e.to_string())
    })?;

    let status = status.map_err(|e| RecompileError::CompilationError(e.to_string()))?;

    if let Ok(Err(e)) = write_result {
        tracing::debug!("solc closed stdin early: {}", e);
    }

    if !status.success() {
        tracing::warn!(
            solc_path = %solc.display(),
            status = ?status.code(),
            "solc exited unsuccessfully: {}",
            stderr_text
        );
    }

    let output = String::from_utf8_lossy(&buf).into_owned();
    if output.trim().is_empty() {
        tracing::error!(
            solc_path = %solc.display(),
            stderr = %stderr_text,
            "Recompilation error (probably caused by invalid metadata)"
        );
        return Err(RecompileError::RecompilationError);
    }

    tracing::debug!(
        "solc produced {} bytes in {:.2}s",
        output.len(),
        start.elapsed().as_secs_f64()
    );

    Ok(output)
}
