//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.edustat.toml` files.

use crate::cli::{Args, Command, OutputFormat};
use crate::narrative::{ChatConfig, LlmProvider};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".edustat.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Storage settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Narrative (LLM) settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default country of the scope.
    #[serde(default)]
    pub country_id: Option<i64>,

    /// Default academic year. The active year is used when unset.
    #[serde(default)]
    pub academic_year_id: Option<i64>,

    /// Default report format.
    #[serde(default)]
    pub format: OutputFormat,
}

/// Where survey rows are persisted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// JSON files, one per table
    #[default]
    File,
    /// Supabase/PostgREST endpoint
    Rest,
    /// Process memory; nothing survives the run
    Memory,
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Directory of the file backend.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Base URL of the REST backend.
    #[serde(default)]
    pub rest_url: Option<String>,

    /// API key of the REST backend.
    #[serde(default)]
    pub api_key: Option<String>,

    /// REST request timeout in seconds.
    #[serde(default = "default_store_timeout")]
    pub timeout_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            data_dir: default_data_dir(),
            rest_url: None,
            api_key: None,
            timeout_seconds: default_store_timeout(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("edustat-data")
}

fn default_store_timeout() -> u64 {
    30
}

/// LLM settings for narrative insights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: LlmProvider,

    /// Endpoint base URL; the provider default when unset.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Model name; the provider default when unset.
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens in response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: None,
            model: None,
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: None,
        }
    }
}

fn default_provider() -> LlmProvider {
    LlmProvider::OpenAi
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

impl LlmConfig {
    /// Resolve provider defaults into a client configuration.
    pub fn to_chat_config(&self) -> ChatConfig {
        ChatConfig {
            provider: self.provider,
            base_url: self
                .base_url
                .clone()
                .unwrap_or_else(|| self.provider.default_base_url().to_string()),
            model: self
                .model
                .clone()
                .unwrap_or_else(|| self.provider.default_model().to_string()),
            api_key: self.api_key.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout_seconds: self.timeout_seconds,
        }
    }
}

/// Report generation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Include rows whose total is zero.
    #[serde(default)]
    pub include_empty_rows: bool,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments (and their environment variables) take precedence, but
    /// only when explicitly provided.
    pub fn merge_with_args(&mut self, args: &Args) {
        if args.country.is_some() {
            self.general.country_id = args.country;
        }
        if args.year.is_some() {
            self.general.academic_year_id = args.year;
        }

        if let Some(backend) = args.store {
            self.store.backend = backend;
        }
        if let Some(ref dir) = args.data_dir {
            self.store.data_dir = dir.clone();
        }
        if args.rest_url.is_some() {
            self.store.rest_url = args.rest_url.clone();
        }
        if args.rest_key.is_some() {
            self.store.api_key = args.rest_key.clone();
        }

        match &args.command {
            Command::Show {
                format,
                include_empty,
                ..
            } => {
                if let Some(format) = format {
                    self.general.format = *format;
                }
                if *include_empty {
                    self.report.include_empty_rows = true;
                }
            }
            Command::Ask {
                provider,
                model,
                llm_url,
                api_key,
                temperature,
                timeout,
                ..
            } => {
                if let Some(provider) = provider {
                    self.llm.provider = *provider;
                }
                if model.is_some() {
                    self.llm.model = model.clone();
                }
                if llm_url.is_some() {
                    self.llm.base_url = llm_url.clone();
                }
                if api_key.is_some() {
                    self.llm.api_key = api_key.clone();
                }
                if let Some(t) = temperature {
                    self.llm.temperature = *t;
                }
                if timeout.is_some() {
                    self.llm.timeout_seconds = *timeout;
                }
            }
            Command::Status { format } | Command::Regional { format } => {
                if let Some(format) = format {
                    self.general.format = *format;
                }
            }
            _ => {}
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
