//! End-to-end recompilation of an explorer source entry

use crate::{
    compiler::SolcCompiler,
    error::Result,
    explorer::ContractSource,
    input::{build_input, SourceKind},
    output::{extract_bytecode, CompilerOutput, RecompiledBytecode},
    version::CompilerVersion,
};
use serde::Serialize;
use std::time::Instant;

/// Bytecode rebuilt from verified sources
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecompiledContract {
    pub contract_name: String,
    pub compiler_version: String,
    pub source_kind: SourceKind,
    #[serde(flatten)]
    pub bytecode: RecompiledBytecode,
}

/// Rebuild the compiler input for `source`, compile it and extract bytecode
pub async fn recompile(source: &ContractSource, compiler: &SolcCompiler) -> Result<RecompiledContract> {
    let start = Instant::now();

    let version = CompilerVersion::parse(&source.compiler_version)?;
    let (source_kind, input) = build_input(source)?;

    tracing::info!(
        "Recompiling {} with solc {} ({} source files)",
        source.contract_name,
        version,
        input.sources.len()
    );

    let raw = compiler.compile(&version, &input).await?;
    let output = CompilerOutput::from_json(&raw)?;

    for warning in output.warnings() {
        tracing::debug!("solc {}: {}", warning.severity, warning.text());
    }

    let bytecode = extract_bytecode(&output, &source.contract_name)?;

    tracing::info!(
        "Recompiled {} in {:.2}s",
        source.contract_name,
        start.elapsed().as_secs_f64()
    );

    Ok(RecompiledContract {
        contract_name: source.contract_name.clone(),
        compiler_version: version.to_string(),
        source_kind,
        bytecode,
    })
}
