//! Block explorer `getsourcecode` responses

use crate::error::{RecompileError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{path::Path, time::Duration};

/// Default Etherscan API endpoint
pub const DEFAULT_EXPLORER_URL: &str = "https://api.etherscan.io/api";

/// Envelope returned by `module=contract&action=getsourcecode`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    /// Array of source entries, or an error string
    pub result: Value,
}

/// Verified source metadata of one contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContractSource {
    pub source_code: String,
    #[serde(rename = "ABI", default)]
    pub abi: String,
    pub contract_name: String,
    pub compiler_version: String,
    #[serde(default)]
    pub optimization_used: Option<String>,
    #[serde(default)]
    pub runs: Option<String>,
    #[serde(rename = "EVMVersion", default)]
    pub evm_version: Option<String>,
}

impl ContractSource {
    /// Parse the ABI JSON string
    pub fn abi(&self) -> Result<Value> {
        serde_json::from_str(&self.abi).map_err(|e| {
            RecompileError::InvalidSource(format!(
                "invalid ABI for {}: {}",
                self.contract_name, e
            ))
        })
    }
}

impl ExplorerResponse {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            RecompileError::InvalidSource(format!("malformed explorer response: {e}"))
        })
    }

    /// Read a response saved to disk
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RecompileError::io(path, e))?;
        Self::from_json(&content)
    }

    /// The first source entry, which is the one recompiled
    pub fn first_source(&self) -> Result<ContractSource> {
        let entries = match &self.result {
            Value::Array(entries) => entries,
            Value::String(reason) => {
                return Err(RecompileError::Explorer(format!(
                    "{} ({})",
                    reason, self.message
                )))
            }
            other => {
                return Err(RecompileError::InvalidSource(format!(
                    "unexpected explorer result: {other}"
                )))
            }
        };

        let first = entries.first().ok_or_else(|| {
            RecompileError::InvalidSource("explorer response has no results".to_string())
        })?;

        serde_json::from_value(first.clone())
            .map_err(|e| RecompileError::InvalidSource(format!("malformed source entry: {e}")))
    }
}

/// Request the verified sources of `address` from a block explorer
pub async fn fetch_source(
    api_url: &str,
    address: &str,
    api_key: &str,
    timeout: Option<Duration>,
) -> Result<ExplorerResponse> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    let client = builder
        .build()
        .map_err(|e| RecompileError::Config(format!("Failed to create HTTP client: {e}")))?;

    tracing::info!(address, api_url, "Fetching verified source from explorer");

    let response = client
        .get(api_url)
        .query(&[
            ("module", "contract"),
            ("action", "getsourcecode"),
            ("address", address),
            ("apikey", api_key),
        ])
        .send()
        .await
        .map_err(|e| RecompileError::Explorer(e.to_string()))?;

    if !response.status().is_success() {
        return Err(RecompileError::Explorer(format!(
            "HTTP status {}",
            response.status()
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| RecompileError::Explorer(e.to_string()))?;

    ExplorerResponse::from_json(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response_with(result: Value) -> String {
        json!({"status": "1", "message": "OK", "result": result}).to_string()
    }

    #[test]
    fn test_first_source_fields() {
        let json = response_with(json!([{
            "SourceCode": "contract Token {}",
            "ABI": "[{\"type\":\"constructor\",\"inputs\":[]}]",
            "ContractName": "Token",
            "CompilerVersion": "v0.8.19+commit.7dd6d404",
            "OptimizationUsed": "0",
            "Runs": "200",
            "EVMVersion": "Default",
            "LicenseType": "MIT"
        }]));

        let source = ExplorerResponse::from_json(&json)
            .unwrap()
            .first_source()
            .unwrap();

        assert_eq!(source.contract_name, "Token");
        assert_eq!(source.compiler_version, "v0.8.19+commit.7dd6d404");
        assert_eq!(source.runs.as_deref(), Some("200"));
        assert_eq!(source.abi().unwrap().as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_result() {
        let response = ExplorerResponse::from_json(&response_with(json!([]))).unwrap();
        assert_eq!(response.first_source().unwrap_err().kind(), "invalid_source");
    }

    #[test]
    fn test_error_result_string() {
        let json = json!({"status": "0", "message": "NOTOK", "result": "Invalid API Key"});
        let response = ExplorerResponse::from_json(&json.to_string()).unwrap();

        let err = response.first_source().unwrap_err();
        assert_eq!(err.kind(), "explorer_error");
        assert!(err.to_string().contains("Invalid API Key"));
    }

    #[test]
    fn test_invalid_abi() {
        let source = ContractSource {
            source_code: String::new(),
            abi: "Contract source code not verified".to_string(),
            contract_name: "X".to_string(),
            compiler_version: "0.8.0".to_string(),
            optimization_used: None,
            runs: None,
            evm_version: None,
        };
        assert!(source.abi().is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("single.example.json");
        std::fs::write(
            &path,
            response_with(json!([{
                "SourceCode": "contract A {}",
                "ABI": "[]",
                "ContractName": "A",
                "CompilerVersion": "0.4.24"
            }])),
        )
        .unwrap();

        let source = ExplorerResponse::from_file(&path)
            .unwrap()
            .first_source()
            .unwrap();
        assert_eq!(source.source_code, "contract A {}");
        assert!(source.evm_version.is_none());
    }
}
