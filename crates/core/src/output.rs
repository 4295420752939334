//! Parsing solc output and extracting the target contract's bytecode

use crate::error::{RecompileError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// file -> contract name -> artifact
pub type Contracts = BTreeMap<String, BTreeMap<String, ContractArtifact>>;

/// The subset of `solc --standard-json` output used for comparison
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompilerOutput {
    #[serde(default)]
    pub contracts: Contracts,
    #[serde(default)]
    pub errors: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContractArtifact {
    #[serde(default)]
    pub evm: Option<Evm>,
    #[serde(default)]
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evm {
    #[serde(default)]
    pub bytecode: Option<Bytecode>,
    #[serde(default)]
    pub deployed_bytecode: Option<Bytecode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Bytecode {
    #[serde(default)]
    pub object: Option<String>,
}

/// A compiler diagnostic
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub formatted_message: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == "error"
    }

    /// Human readable text, preferring the formatted variant
    pub fn text(&self) -> &str {
        self.formatted_message
            .as_deref()
            .or(self.message.as_deref())
            .unwrap_or_default()
    }
}

impl CompilerOutput {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(RecompileError::InvalidOutput)
    }

    /// Diagnostics that did not prevent compilation
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.errors.iter().filter(|d| !d.is_error())
    }

    /// Newline-joined text of all error-severity diagnostics
    pub fn error_messages(&self) -> String {
        self.errors
            .iter()
            .filter(|d| d.is_error())
            .map(Diagnostic::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Creation and deployed bytecode as `0x`-prefixed hex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecompiledBytecode {
    pub creation_bytecode: String,
    pub deployed_bytecode: String,
}

/// First file, in path order, that defines `contract_name`
///
/// When several files define a contract with the same name the first one
/// wins; which of them the explorer actually verified is not known here.
pub fn find_contract_file<'a>(contracts: &'a Contracts, contract_name: &str) -> Option<&'a str> {
    contracts
        .iter()
        .find(|(_, per_file)| per_file.contains_key(contract_name))
        .map(|(file, _)| file.as_str())
}

fn prefixed(object: &str) -> String {
    format!("0x{}", object.strip_prefix("0x").unwrap_or(object))
}

/// Pull the bytecode of `contract_name` out of the compiler output
///
/// Any missing piece is reported as the compiler's own error messages.
pub fn extract_bytecode(output: &CompilerOutput, contract_name: &str) -> Result<RecompiledBytecode> {
    let evm = find_contract_file(&output.contracts, contract_name)
        .and_then(|file| output.contracts.get(file))
        .and_then(|per_file| per_file.get(contract_name))
        .and_then(|artifact| artifact.evm.as_ref());

    let objects = evm.and_then(|evm| {
        let creation = evm.bytecode.as_ref()?.object.as_deref()?;
        let deployed = evm.deployed_bytecode.as_ref()?.object.as_deref()?;
        Some((creation, deployed))
    });

    match objects {
        Some((creation, deployed)) => Ok(RecompiledBytecode {
            creation_bytecode: prefixed(creation),
            deployed_bytecode: prefixed(deployed),
        }),
        None => Err(RecompileError::CompilerReported {
            message: output.error_messages(),
        }),
    }
}
