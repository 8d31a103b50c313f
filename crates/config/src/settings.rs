// Pipeline settings
// Loaded from ~/.config/geoquiz/settings.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ConfigError;
use crate::queries::{
    DEFAULT_DBPEDIA_ENDPOINT, DEFAULT_DBPEDIA_QUERY, DEFAULT_WIKIDATA_ENDPOINT, DEFAULT_WIKIDATA_QUERY,
};

/// Which knowledge graphs feed the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    Wikidata,
    Dbpedia,
    /// Wikidata primary, DBpedia backfills its gaps
    #[default]
    Both,
}

impl SourceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceMode::Wikidata => "wikidata",
            SourceMode::Dbpedia => "dbpedia",
            SourceMode::Both => "both",
        }
    }
}

impl FromStr for SourceMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wikidata" => Ok(SourceMode::Wikidata),
            "dbpedia" => Ok(SourceMode::Dbpedia),
            "both" => Ok(SourceMode::Both),
            other => Err(ConfigError::Invalid(format!(
                "unknown source mode '{other}' (expected wikidata, dbpedia or both)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub mode: SourceMode,
    pub wikidata_endpoint: String,
    pub dbpedia_endpoint: String,
    pub wikidata_query: String,
    pub dbpedia_query: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            mode: SourceMode::Both,
            wikidata_endpoint: DEFAULT_WIKIDATA_ENDPOINT.to_string(),
            dbpedia_endpoint: DEFAULT_DBPEDIA_ENDPOINT.to_string(),
            wikidata_query: DEFAULT_WIKIDATA_QUERY.to_string(),
            dbpedia_query: DEFAULT_DBPEDIA_QUERY.to_string(),
            timeout_secs: 60,
            max_retries: 3,
        }
    }
}

/// AI provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AIProvider {
    /// Suggestions disabled (default)
    #[default]
    None,
    /// OpenAI-compatible chat completions API
    #[serde(rename = "openai")]
    OpenAI,
}

impl AIProvider {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, AIProvider::None)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AIProvider::None => "none",
            AIProvider::OpenAI => "openai",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            AIProvider::None => "",
            AIProvider::OpenAI => "gpt-4o",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            AIProvider::None => "",
            AIProvider::OpenAI => "https://api.openai.com/v1",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AISettings {
    pub provider: AIProvider,

    /// Model identifier. Empty = provider default.
    pub model: String,

    /// Base URL, `/chat/completions` is appended. `None` = provider default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for AISettings {
    fn default() -> Self {
        Self {
            provider: AIProvider::None,
            model: String::new(),
            endpoint: None,
            timeout_secs: 60,
            max_retries: 3,
        }
    }
}

impl AISettings {
    pub fn effective_model(&self) -> &str {
        if self.model.is_empty() {
            self.provider.default_model()
        } else {
            &self.model
        }
    }

    pub fn effective_endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.provider.default_endpoint())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    /// A run lock older than this may be taken over.
    pub stale_after_secs: u64,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self { stale_after_secs: 3600 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SQLite database path. Empty = `<data dir>/geoquiz/geoquiz.db`.
    pub database: String,
    pub sources: SourceSettings,
    pub ai: AISettings,
    pub lock: LockSettings,
}

/// Environment variables consulted after the settings file.
pub const ENV_CONFIG: &str = "GEOQUIZ_CONFIG";
pub const ENV_DATABASE: &str = "GEOQUIZ_DATABASE";
pub const ENV_SOURCE_MODE: &str = "GEOQUIZ_SOURCE_MODE";
pub const ENV_WIKIDATA_QUERY: &str = "GEOQUIZ_WIKIDATA_QUERY";
pub const ENV_DBPEDIA_QUERY: &str = "GEOQUIZ_DBPEDIA_QUERY";

impl Settings {
    /// Settings file path: `$GEOQUIZ_CONFIG`, else the user config dir.
    pub fn config_path() -> PathBuf {
        if let Some(path) = std::env::var_os(ENV_CONFIG).filter(|p| !p.is_empty()) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("geoquiz")
            .join("settings.toml")
    }

    /// Load from `explicit` (or the default path), then apply environment
    /// overrides. A missing file yields defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = explicit.map(Path::to_path_buf).unwrap_or_else(Self::config_path);
        let mut settings = Self::load_from(&path)?;
        settings.apply_env(|name| std::env::var(name).ok())?;
        Ok(settings)
    }

    /// Load one file without environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("no settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Apply `GEOQUIZ_*` overrides. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(db) = get(ENV_DATABASE) {
            self.database = db;
        }
        if let Some(mode) = get(ENV_SOURCE_MODE) {
            self.sources.mode = mode.parse()?;
        }
        if let Some(query) = get(ENV_WIKIDATA_QUERY) {
            self.sources.wikidata_query = query;
        }
        if let Some(query) = get(ENV_DBPEDIA_QUERY) {
            self.sources.dbpedia_query = query;
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |e: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let text = toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        fs::write(path, text).map_err(io_err)
    }

    /// Effective database path.
    pub fn database_path(&self) -> PathBuf {
        if !self.database.is_empty() {
            return PathBuf::from(&self.database);
        }
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("geoquiz")
            .join("geoquiz.db")
    }
}
