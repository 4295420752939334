//! Reconstruction of the solc standard-JSON input from explorer sources
//!
//! Explorers return either a single flattened source file, or a
//! standard-JSON document wrapped in one redundant pair of braces
//! (`{{ ... }}`). Both are turned into a [`CompilerInput`] whose output
//! selection asks only for the artifacts needed to compare bytecode.

use crate::{
    error::{RecompileError, Result},
    explorer::ContractSource,
    utils,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Source language tag sent to solc
pub const LANGUAGE: &str = "Solidity";

/// Artifacts requested for the target contract
pub const OUTPUT_SELECTION_FIELDS: [&str; 3] = [
    "evm.bytecode.object",
    "evm.deployedBytecode.object",
    "metadata",
];

/// file -> contract -> requested artifacts
pub type OutputSelection = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// The JSON document written to `solc --standard-json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilerInput {
    pub language: String,
    pub sources: BTreeMap<String, SourceFile>,
    pub settings: Settings,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keccak256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    /// Fields solc understands that are passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub optimizer: Optimizer,
    #[serde(default)]
    pub output_selection: OutputSelection,
    /// evmVersion, libraries, remappings, metadata, viaIR, ...
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Optimizer {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runs: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// How the explorer delivered the contract sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    SingleFile,
    MultiFile,
}

impl CompilerInput {
    /// Checks that every output selection key names a source file
    pub fn validate(&self) -> Result<()> {
        if let Some(missing) = self
            .settings
            .output_selection
            .keys()
            .find(|path| !self.sources.contains_key(*path))
        {
            return Err(RecompileError::InvalidInput(format!(
                "output selection refers to unknown source {missing:?}"
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| RecompileError::InvalidInput(e.to_string()))
    }
}

/// Multi-file bundles are serialised with a redundant outer pair of braces
pub fn is_multi_file(raw: &str) -> bool {
    raw.starts_with("{{")
}

/// Drop the first and last character of `raw` and parse the rest as JSON
pub fn unwrap_bundle(raw: &str) -> Result<Value> {
    let mut chars = raw.chars();
    if chars.next().is_none() || chars.next_back().is_none() {
        return Err(RecompileError::InvalidSource(
            "source bundle is too short".to_string(),
        ));
    }

    serde_json::from_str(chars.as_str())
        .map_err(|e| RecompileError::InvalidSource(format!("malformed source bundle: {e}")))
}

/// Hash of the source text in the format solc expects
pub fn content_hash(text: &str) -> String {
    utils::keccak256_hex(text.as_bytes())
}

/// Selection of [`OUTPUT_SELECTION_FIELDS`] for `contract_name` in every file
fn selection_for<'a>(
    files: impl IntoIterator<Item = &'a String>,
    contract_name: &str,
) -> OutputSelection {
    let fields: Vec<String> = OUTPUT_SELECTION_FIELDS.iter().map(|f| f.to_string()).collect();

    files
        .into_iter()
        .map(|file| {
            (
                file.clone(),
                BTreeMap::from([(contract_name.to_string(), fields.clone())]),
            )
        })
        .collect()
}

/// Wrap one flattened source file as `<ContractName>.sol`
pub fn single_file_input(contract_name: &str, source: &str) -> CompilerInput {
    let file_name = format!("{contract_name}.sol");

    let sources = BTreeMap::from([(
        file_name,
        SourceFile {
            keccak256: Some(content_hash(source)),
            content: Some(source.to_string()),
            ..Default::default()
        },
    )]);

    let settings = Settings {
        optimizer: Optimizer {
            enabled: false,
            ..Default::default()
        },
        output_selection: selection_for(sources.keys(), contract_name),
        extra: Map::new(),
    };

    CompilerInput {
        language: LANGUAGE.to_string(),
        sources,
        settings,
    }
}

/// Rebuild the input from a `{{ ... }}` bundle
///
/// The bundle is either a full standard-JSON document (has a `sources` key),
/// whose language and settings are kept, or a bare `path -> source` map.
/// In both cases the output selection is replaced with the bytecode fields
/// for `contract_name` in every file.
pub fn multi_file_input(contract_name: &str, raw: &str) -> Result<CompilerInput> {
    let Value::Object(mut bundle) = unwrap_bundle(raw)? else {
        return Err(RecompileError::InvalidSource(
            "source bundle is not a JSON object".to_string(),
        ));
    };

    let (language, sources, settings) = match bundle.remove("sources") {
        Some(sources) => {
            let language = bundle
                .remove("language")
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| LANGUAGE.to_string());
            let settings = match bundle.remove("settings") {
                Some(settings) => serde_json::from_value(settings).map_err(|e| {
                    RecompileError::InvalidSource(format!("malformed bundle settings: {e}"))
                })?,
                None => Settings::default(),
            };
            (language, sources, settings)
        }
        None => (LANGUAGE.to_string(), Value::Object(bundle), Settings::default()),
    };

    let sources: BTreeMap<String, SourceFile> = serde_json::from_value(sources)
        .map_err(|e| RecompileError::InvalidSource(format!("malformed bundle sources: {e}")))?;

    if sources.is_empty() {
        return Err(RecompileError::InvalidSource(
            "source bundle contains no files".to_string(),
        ));
    }

    tracing::debug!("Source bundle contains {} files", sources.len());

    let mut input = CompilerInput {
        language,
        sources,
        settings,
    };
    input.settings.output_selection = selection_for(input.sources.keys(), contract_name);

    Ok(input)
}

/// Reconstruct the compiler input for an explorer source entry
pub fn build_input(source: &ContractSource) -> Result<(SourceKind, CompilerInput)> {
    if is_multi_file(&source.source_code) {
        let input = multi_file_input(&source.contract_name, &source.source_code)?;
        Ok((SourceKind::MultiFile, input))
    } else {
        let abi = source.abi()?;
        tracing::debug!(
            "Single-file source for {} ({} ABI entries)",
            source.contract_name,
            abi.as_array().map_or(0, Vec::len)
        );
        let input = single_file_input(&source.contract_name, &source.source_code);
        Ok((SourceKind::SingleFile, input))
    }
}
