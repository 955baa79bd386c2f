//! In-memory `.env` file handling.
//!
//! The raw byte preimage is kept alongside the parsed key/value pairs so the
//! rendered file can be written back verbatim, preserving comments,
//! whitespace and ordering.

use crate::error::{ConduitError, Result, TemplateStage};
use std::path::Path;

/// An environment file: raw bytes plus the parsed `KEY=VALUE` mapping.
#[derive(Debug, Clone)]
pub struct EnvFile {
    bytes: Vec<u8>,
    variables: Vec<(String, String)>,
}

impl EnvFile {
    /// Parse an environment file body.
    ///
    /// Blank lines and `#` comments are skipped; every other line must be a
    /// `KEY=VALUE` pair. Values may be wrapped in single or double quotes.
    pub fn parse(bytes: Vec<u8>) -> Result<Self> {
        let content = std::str::from_utf8(&bytes).map_err(|e| {
            ConduitError::template(TemplateStage::Environment, format!("not valid UTF-8: {}", e))
        })?;

        let mut variables = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                ConduitError::template(
                    TemplateStage::Environment,
                    format!("malformed line {}: expected KEY=VALUE", idx + 1),
                )
            })?;
            variables.push((key.trim().to_string(), unquote(value.trim()).to_string()));
        }

        Ok(Self { bytes, variables })
    }

    /// Load and parse an environment file from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| ConduitError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(bytes)
    }

    /// Write the raw byte preimage to disk, verbatim.
    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.bytes).map_err(|e| ConduitError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Look up a variable by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.variables
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The parsed key/value pairs, in file order.
    pub fn variables(&self) -> &[(String, String)] {
        &self.variables
    }

    /// The raw file bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}
