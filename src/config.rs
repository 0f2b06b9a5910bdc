use crate::{codec::node::MAX_TREE_DEPTH, error::FigparseError};
use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, write},
    path::PathBuf,
};

pub const DEFAULT_MAX_DEPTH: usize = 256;
pub const DEFAULT_API_BASE: &str = "https://api.figma.com/v1";
pub const DEFAULT_DB_FILE: &str = "figparse.db";

/// Which extraction source wins when the API component maps and the tree describe the same
/// node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentPriority {
    #[default]
    ApiMap,
    Tree,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Deepest node level the walker accepts; the root is level 0.
    pub max_depth: usize,
    pub component_priority: ComponentPriority,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        ExtractionConfig {
            max_depth: DEFAULT_MAX_DEPTH,
            component_priority: ComponentPriority::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: DEFAULT_API_BASE.to_string(),
            timeout_secs: 30,
            user_agent: concat!("figparse/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            db_path: PathBuf::from(DEFAULT_DB_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Everything tunable about a parser process. Credentials are deliberately absent: they are
/// passed with each fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub extraction: ExtractionConfig,
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
}

pub trait ConfigProvider: Send + Sync {
    fn load(&self) -> Result<ParserConfig, FigparseError>;
    fn store(&self, config: &ParserConfig) -> Result<(), FigparseError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TomlConfigProvider {
    path: PathBuf,
}

impl TomlConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlConfigProvider { path }
    }
}

impl ConfigProvider for TomlConfigProvider {
    fn load(&self) -> Result<ParserConfig, FigparseError> {
        tracing::debug!("Attempting to read config from: {:?}", &self.path);
        if !self.path.exists() {
            tracing::debug!("Config file not found, using defaults.");
            return Ok(ParserConfig::default());
        }
        let content = read_to_string(&self.path)?;
        let config: ParserConfig = toml::from_str(&content)?;
        if config.extraction.max_depth == 0 {
            return Err(FigparseError::Config(
                "extraction.max_depth must be at least 1".to_string(),
            ));
        }
        if config.extraction.max_depth > MAX_TREE_DEPTH {
            return Err(FigparseError::Config(format!(
                "extraction.max_depth must not exceed {MAX_TREE_DEPTH}"
            )));
        }
        Ok(config)
    }

    fn store(&self, config: &ParserConfig) -> Result<(), FigparseError> {
        tracing::debug!("Attempting to write config to: {:?}", &self.path);
        let toml_string = toml::to_string(config)?;
        write(&self.path, toml_string)?;
        Ok(())
    }
}
