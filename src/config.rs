use crate::defaults;
use crate::error::{AsrError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    /// Stage instances keyed by the name pipelines refer to them by.
    pub stages: BTreeMap<String, ComponentConfig>,
    /// Engine instances keyed by the name requests select them by.
    pub engines: BTreeMap<String, ComponentConfig>,
}

/// Facade-level settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_engine: Option<String>,
    pub default_stages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_timeout_ms: Option<u64>,
    /// When false, streaming sessions that would drain a stream (batch-only
    /// stage or engine) are rejected instead of silently degraded.
    pub allow_degraded_streaming: bool,
    pub chunk_buffer: usize,
}

/// One `[stages.<name>]` or `[engines.<name>]` section.
///
/// `type` selects the factory; every other key is handed to it untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub params: toml::Table,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_engine: Some("echo".to_string()),
            default_stages: Vec::new(),
            engine_timeout_ms: None,
            allow_degraded_streaming: true,
            chunk_buffer: defaults::CHUNK_BUFFER,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let stages = ["gain", "smooth", "normalize"]
            .into_iter()
            .map(|kind| (kind.to_string(), ComponentConfig::new(kind)))
            .collect();
        let engines = [("echo".to_string(), ComponentConfig::new("echo"))]
            .into_iter()
            .collect();
        Self {
            service: ServiceConfig::default(),
            stages,
            engines,
        }
    }
}

impl ServiceConfig {
    pub fn engine_timeout(&self) -> Option<Duration> {
        self.engine_timeout_ms.map(Duration::from_millis)
    }
}

impl ComponentConfig {
    /// Section of the given kind with no parameters.
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            params: toml::Table::new(),
        }
    }

    /// Builder-style parameter setter, mostly for programmatic registries.
    pub fn with(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn get_f32(&self, key: &str) -> Result<Option<f32>> {
        match self.params.get(key) {
            None => Ok(None),
            Some(toml::Value::Float(v)) => Ok(Some(*v as f32)),
            Some(toml::Value::Integer(v)) => Ok(Some(*v as f32)),
            Some(other) => Err(type_mismatch(key, "a number", other)),
        }
    }

    pub fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        match self.params.get(key) {
            None => Ok(None),
            Some(toml::Value::Integer(v)) => u64::try_from(*v)
                .map(Some)
                .map_err(|_| AsrError::ConfigInvalidValue {
                    key: key.to_string(),
                    message: format!("expected a non-negative integer, got {}", v),
                }),
            Some(other) => Err(type_mismatch(key, "an integer", other)),
        }
    }

    pub fn get_usize(&self, key: &str) -> Result<Option<usize>> {
        self.get_u64(key)?
            .map(|v| {
                usize::try_from(v).map_err(|_| AsrError::ConfigInvalidValue {
                    key: key.to_string(),
                    message: format!("{} does not fit in usize", v),
                })
            })
            .transpose()
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.params.get(key) {
            None => Ok(None),
            Some(toml::Value::Boolean(v)) => Ok(Some(*v)),
            Some(other) => Err(type_mismatch(key, "a boolean", other)),
        }
    }

    pub fn get_str(&self, key: &str) -> Result<Option<&str>> {
        match self.params.get(key) {
            None => Ok(None),
            Some(toml::Value::String(v)) => Ok(Some(v.as_str())),
            Some(other) => Err(type_mismatch(key, "a string", other)),
        }
    }
}

fn type_mismatch(key: &str, expected: &str, got: &toml::Value) -> AsrError {
    AsrError::ConfigInvalidValue {
        key: key.to_string(),
        message: format!("expected {}, got {}", expected, got.type_str()),
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing sections and fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AsrError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                AsrError::Io(e)
            }
        })?;
        Self::parse(&contents)
    }

    /// Parse configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(AsrError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - ASRCORE_DEFAULT_ENGINE → service.default_engine
    /// - ASRCORE_STAGES → service.default_stages (comma separated)
    /// - ASRCORE_ENGINE_TIMEOUT_MS → service.engine_timeout_ms
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(engine) = std::env::var(env_key("DEFAULT_ENGINE"))
            && !engine.is_empty()
        {
            self.service.default_engine = Some(engine);
        }

        if let Ok(stages) = std::env::var(env_key("STAGES")) {
            self.service.default_stages = parse_stage_list(&stages);
        }

        if let Ok(timeout) = std::env::var(env_key("ENGINE_TIMEOUT_MS"))
            && !timeout.is_empty()
        {
            match timeout.parse::<u64>() {
                Ok(ms) => self.service.engine_timeout_ms = Some(ms),
                Err(_) => tracing::warn!(
                    value = %timeout,
                    "ignoring {}: not a number of milliseconds",
                    env_key("ENGINE_TIMEOUT_MS")
                ),
            }
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/asrcore/config.toml on Linux
    #[cfg(feature = "cli")]
    pub fn default_path() -> Option<std::path::PathBuf> {
        dirs::config_dir().map(|dir| dir.join("asrcore").join("config.toml"))
    }

    /// Serialize back to TOML, e.g. for `asrcore config show`.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AsrError::ConfigParse {
            message: e.to_string(),
        })
    }
}

/// Split a comma separated stage list, dropping blanks.
pub fn parse_stage_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_key(suffix: &str) -> String {
    format!("{}_{}", defaults::ENV_PREFIX, suffix)
}
