//! CLI for the solc-recompile library
//!
//! Rebuilds the compiler input of a verified contract from block-explorer
//! source metadata and recompiles it with the pinned solc release.

use clap::{Args, Parser, Subcommand};
use eyre::{Context, Result};
use serde::Serialize;
use solc_recompile::{
    build_input, explorer, recompile, CompilerConfig, CompilerVersion, ContractSource,
    ExplorerResponse, RecompileError, RecompiledContract, SolcCompiler,
};
use std::path::{Path, PathBuf};
use tracing::Level;

/// Recompile verified Solidity contracts from explorer source metadata
#[derive(Parser, Debug)]
#[command(name = "solc-recompile")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all logging except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output JSON to stdout
    #[arg(long, global = true)]
    json: bool,
}

/// Settings for locating, fetching and running solc
#[derive(Args, Debug, Clone, Default)]
struct CompilerSettings {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Temporary executable cache (overrides SOLC_REPO_TMP)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Named executable repository directory (overrides SOLC_REPO)
    #[arg(long)]
    repo_dir: Option<PathBuf>,

    /// Maximum size of the compiler output in bytes
    #[arg(long)]
    max_output_bytes: Option<usize>,

    /// Timeout for network requests, in seconds
    #[arg(long)]
    fetch_timeout: Option<u64>,
}

/// Where the explorer source entry comes from
#[derive(Args, Debug, Clone)]
struct SourceArgs {
    /// Saved `getsourcecode` response
    #[arg(required_unless_present = "address", conflicts_with = "address")]
    response: Option<PathBuf>,

    /// Contract address to fetch from the explorer API
    #[arg(long, requires = "api_key")]
    address: Option<String>,

    /// Explorer API key
    #[arg(long)]
    api_key: Option<String>,

    /// Explorer API endpoint
    #[arg(long, default_value = explorer::DEFAULT_EXPLORER_URL)]
    explorer_url: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Recompile a verified contract and print its bytecode
    Recompile {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        compiler: CompilerSettings,
    },

    /// Print the reconstructed standard-JSON compiler input
    Input {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        compiler: CompilerSettings,
    },

    /// Make sure a solc release is available locally and print its path
    Install {
        /// Compiler version, with or without the leading `v`
        version: String,

        #[command(flatten)]
        compiler: CompilerSettings,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "status")]
enum Output {
    #[serde(rename = "success")]
    Success {
        #[serde(flatten)]
        data: SuccessData,
    },

    #[serde(rename = "error")]
    Error { error_type: String, message: String },
}

#[derive(Debug, Serialize)]
#[serde(tag = "command")]
enum SuccessData {
    #[serde(rename = "recompile")]
    Recompile {
        #[serde(flatten)]
        contract: RecompiledContract,
    },

    #[serde(rename = "install")]
    Install { version: String, path: String },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        Level::ERROR
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let json = cli.json;
    let result = tokio::runtime::Runtime::new()
        .context("Failed to create async runtime")
        .and_then(|runtime| runtime.block_on(run(cli.command, json)));

    if let Err(e) = result {
        output_error(e, json);
        std::process::exit(1);
    }
}

async fn run(command: Commands, json: bool) -> Result<()> {
    match command {
        Commands::Recompile { source, compiler } => run_recompile(source, compiler, json).await,
        Commands::Input { source, compiler } => run_input(source, compiler).await,
        Commands::Install { version, compiler } => run_install(&version, compiler, json).await,
    }
}

/// Layer defaults, config file, environment and flags
fn build_config(settings: &CompilerSettings) -> Result<CompilerConfig> {
    let base = match &settings.config {
        Some(path) => CompilerConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => CompilerConfig::default(),
    };

    let mut config = base.with_env_overrides(|key| std::env::var(key).ok());

    if let Some(dir) = &settings.cache_dir {
        config.cache_dir = dir.clone();
    }
    if let Some(dir) = &settings.repo_dir {
        config.repo_dir = dir.clone();
    }
    if let Some(limit) = settings.max_output_bytes {
        config.max_output_bytes = limit;
    }
    if let Some(secs) = settings.fetch_timeout {
        config.fetch_timeout_secs = Some(secs);
    }

    config.validate()?;
    tracing::debug!("Using configuration: {:?}", config);
    Ok(config)
}

async fn load_source(args: &SourceArgs, config: &CompilerConfig) -> Result<ContractSource> {
    let response = match (&args.response, &args.address, &args.api_key) {
        (Some(path), _, _) => read_response(path)?,
        (None, Some(address), Some(api_key)) => {
            explorer::fetch_source(&args.explorer_url, address, api_key, config.fetch_timeout())
                .await
                .context("Failed to fetch verified source")?
        }
        _ => return Err(eyre::eyre!("Either a response file or --address with --api-key is required")),
    };

    Ok(response.first_source()?)
}

fn read_response(path: &Path) -> Result<ExplorerResponse> {
    ExplorerResponse::from_file(path)
        .with_context(|| format!("Failed to read explorer response {}", path.display()))
}

async fn run_recompile(args: SourceArgs, settings: CompilerSettings, json: bool) -> Result<()> {
    let config = build_config(&settings)?;
    let source = load_source(&args, &config).await?;
    let compiler = SolcCompiler::new(config)?;

    let contract = recompile(&source, &compiler).await?;

    if json {
        let output = Output::Success {
            data: SuccessData::Recompile { contract },
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!(
            "✅ Recompiled {} with solc {}",
            contract.contract_name, contract.compiler_version
        );
        if let Some(settings) = explorer_settings(&source) {
            println!("   Explorer settings: {settings}");
        }
        println!("{}", serde_json::to_string_pretty(&contract.bytecode)?);
    }

    Ok(())
}

async fn run_input(args: SourceArgs, settings: CompilerSettings) -> Result<()> {
    let config = build_config(&settings)?;
    let source = load_source(&args, &config).await?;

    let (kind, input) = build_input(&source)?;
    tracing::info!("Reconstructed {:?} input for {}", kind, source.contract_name);

    println!("{}", serde_json::to_string_pretty(&input)?);
    Ok(())
}

async fn run_install(version: &str, settings: CompilerSettings, json: bool) -> Result<()> {
    let config = build_config(&settings)?;
    let version = CompilerVersion::parse(version)?;
    let compiler = SolcCompiler::new(config)?;

    let handle = compiler
        .executable(&version)
        .await
        .ok_or(RecompileError::ExecutableNotFound {
            version: version.to_string(),
        })?;

    if json {
        let output = Output::Success {
            data: SuccessData::Install {
                version: version.to_string(),
                path: handle.path.display().to_string(),
            },
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("✅ solc {} available at {}", version, handle.path.display());
    }

    Ok(())
}

/// Optimizer and EVM settings the explorer reports for the verified build
fn explorer_settings(source: &ContractSource) -> Option<String> {
    fn present(value: &Option<String>) -> Option<&str> {
        value.as_deref().filter(|v| !v.is_empty())
    }

    let mut parts = Vec::new();
    if let Some(enabled) = present(&source.optimization_used) {
        let optimizer = if enabled == "1" { "enabled" } else { "disabled" };
        match present(&source.runs) {
            Some(runs) => parts.push(format!("optimizer {optimizer} ({runs} runs)")),
            None => parts.push(format!("optimizer {optimizer}")),
        }
    }
    if let Some(evm) = present(&source.evm_version) {
        parts.push(format!("evm {evm}"));
    }

    (!parts.is_empty()).then(|| parts.join(", "))
}

fn error_type(error: &eyre::Report) -> &'static str {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<RecompileError>())
        .map(RecompileError::kind)
        .unwrap_or("unknown_error")
}

fn output_error(error: eyre::Report, json: bool) {
    let reported = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<RecompileError>())
        .is_some_and(RecompileError::is_compiler_reported);

    if json {
        let output = Output::Error {
            error_type: error_type(&error).to_string(),
            message: format!("{error:#}"),
        };
        match serde_json::to_string(&output) {
            Ok(line) => eprintln!("{line}"),
            Err(_) => eprintln!("{error:#}"),
        }
    } else if reported {
        eprintln!("❌ solc rejected the reconstructed sources:\n{error}");
    } else {
        eprintln!("❌ Could not run the compiler: {error:#}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["solc-recompile", "recompile", "single.example.json"]);
        assert!(matches!(cli.command, Commands::Recompile { .. }));

        let cli = Cli::parse_from([
            "solc-recompile",
            "recompile",
            "--address",
            "0xa88f81f79bb05f25e9cd59572982388455380c06",
            "--api-key",
            "KEY",
            "--json",
        ]);
        assert!(cli.json);
        if let Commands::Recompile { source, .. } = cli.command {
            assert!(source.response.is_none());
            assert_eq!(source.explorer_url, explorer::DEFAULT_EXPLORER_URL);
        } else {
            panic!("expected recompile command");
        }

        let cli = Cli::parse_from(["solc-recompile", "install", "v0.8.19+commit.7dd6d404"]);
        assert!(matches!(cli.command, Commands::Install { ref version, .. } if version == "v0.8.19+commit.7dd6d404"));
    }

    #[test]
    fn test_source_required() {
        assert!(Cli::try_parse_from(["solc-recompile", "recompile"]).is_err());
        assert!(Cli::try_parse_from(["solc-recompile", "input", "--address", "0x1"]).is_err());
    }

    #[test]
    fn test_compiler_settings() {
        let cli = Cli::parse_from([
            "solc-recompile",
            "install",
            "0.8.19",
            "--cache-dir",
            "/tmp/cache",
            "--repo-dir",
            "repo",
            "--max-output-bytes",
            "4096",
            "--fetch-timeout",
            "30",
        ]);

        let Commands::Install { compiler, .. } = cli.command else {
            panic!("expected install command");
        };
        let config = build_config(&compiler).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/cache"));
        assert_eq!(config.repo_dir, PathBuf::from("repo"));
        assert_eq!(config.max_output_bytes, 4096);
        assert_eq!(config.fetch_timeout_secs, Some(30));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let settings = CompilerSettings {
            max_output_bytes: Some(0),
            ..Default::default()
        };
        assert!(build_config(&settings).is_err());
    }

    #[test]
    fn test_error_type_from_chain() {
        let report = eyre::Report::new(RecompileError::RecompilationError)
            .wrap_err("Recompilation failed");
        assert_eq!(error_type(&report), "recompilation_error");

        assert_eq!(error_type(&eyre::eyre!("other")), "unknown_error");
    }

    #[test]
    fn test_explorer_settings_summary() {
        let mut source = ContractSource {
            source_code: "contract A {}".to_string(),
            abi: "[]".to_string(),
            contract_name: "A".to_string(),
            compiler_version: "v0.8.19".to_string(),
            optimization_used: Some("1".to_string()),
            runs: Some("200".to_string()),
            evm_version: Some("Default".to_string()),
        };
        assert_eq!(
            explorer_settings(&source).as_deref(),
            Some("optimizer enabled (200 runs), evm Default")
        );

        source.optimization_used = Some("0".to_string());
        source.runs = None;
        source.evm_version = Some(String::new());
        assert_eq!(explorer_settings(&source).as_deref(), Some("optimizer disabled"));

        source.optimization_used = None;
        assert_eq!(explorer_settings(&source), None);
    }

    #[tokio::test]
    async fn test_input_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("single.example.json");
        std::fs::write(
            &path,
            r#"{"status":"1","message":"OK","result":[{"SourceCode":"contract A {}","ABI":"[]","ContractName":"A","CompilerVersion":"v0.8.19"}]}"#,
        )
        .unwrap();

        let args = SourceArgs {
            response: Some(path),
            address: None,
            api_key: None,
            explorer_url: explorer::DEFAULT_EXPLORER_URL.to_string(),
        };
        let source = load_source(&args, &CompilerConfig::default()).await.unwrap();
        assert_eq!(source.contract_name, "A");
    }
}
