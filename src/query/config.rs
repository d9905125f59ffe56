#![allow(missing_docs)]

//! Compile options and their TOML representation.
//!
//! ```toml
//! [compile]
//! typed_op_behavior = "honor_parameters"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How type operators (`CAST`, `IS`, ...) treat type parameters such as
/// `DECIMAL(p, s)`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypedOpBehavior {
    /// Parameters are parsed but ignored.
    #[default]
    Legacy,
    /// Parameters are honoured and therefore validated.
    HonorParameters,
}

/// Options consumed by the validator and the compiler.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    pub typed_op_behavior: TypedOpBehavior,
}

impl CompileOptions {
    /// Options that ignore type parameters.
    pub fn legacy() -> Self {
        Self::default()
    }

    /// Standard-conforming options.
    pub fn standard() -> Self {
        Self {
            typed_op_behavior: TypedOpBehavior::HonorParameters,
        }
    }

    /// Parses the `[compile]` table of a TOML document. A document without
    /// the table yields the defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(contents).map_err(|source| ConfigError::Parse { path: None, source })?;
        Ok(raw.compile)
    }

    /// Reads options from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })?;
        Ok(raw.compile)
    }

    /// Renders the options as a TOML document with a `[compile]` table.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        let raw = RawConfig { compile: *self };
        toml::to_string(&raw).map_err(|source| ConfigError::Serialize { source })
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawConfig {
    #[serde(default)]
    compile: CompileOptions,
}

/// Failure to load or store compile options.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read compile options {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse compile options{}: {source}", display_path(.path))]
    Parse {
        path: Option<PathBuf>,
        source: toml::de::Error,
    },
    #[error("failed to serialize compile options: {source}")]
    Serialize { source: toml::ser::Error },
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" {}", path.display()),
        None => String::new(),
    }
}
