//! Recompilation of verified Solidity contracts with pinned solc releases
pub mod compiler;
pub mod config;
pub mod error;
pub mod explorer;
pub mod fetcher;
pub mod input;
pub mod output;
pub mod recompile;
pub mod resolver;
mod utils;
pub mod version;

#[cfg(test)]
mod testing;

pub use compiler::{run_standard_json, InProcessCompiler, SolcCompiler};
pub use config::{CompilerConfig, CompilerConfigBuilder};
pub use error::{RecompileError, Result};
pub use explorer::{fetch_source, ContractSource, ExplorerResponse};
pub use fetcher::{download_url, DownloadResponse, Downloader, ExecutableFetcher, HttpDownloader};
pub use input::{build_input, CompilerInput, SourceKind};
pub use output::{extract_bytecode, CompilerOutput, RecompiledBytecode};
pub use recompile::{recompile, RecompiledContract};
pub use resolver::{validate_executable, ExecutableHandle, ExecutableResolver};
pub use version::{CompilerVersion, Platform};
