use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO)
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Target language code (ISO)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Sync engine settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Durable translation cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: Ollama
    #[default]
    Ollama,
    // @provider: Anthropic
    Anthropic,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Ollama => "Ollama",
            Self::Anthropic => "Anthropic",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Ollama => "ollama".to_string(),
            Self::Anthropic => "anthropic".to_string(),
        }
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "anthropic" => Ok(Self::Anthropic),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model used for the fast tier
    #[serde(default = "String::new")]
    pub model: String,

    // @field: Model used for large blocks; empty falls back to `model`
    #[serde(default = "String::new")]
    pub high_accuracy_model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Rate limit (requests per minute), overrides `sync.requests_per_minute`
    #[serde(default)]
    pub rate_limit: Option<u32>,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        match provider_type {
            TranslationProvider::Ollama => Self {
                provider_type: "ollama".to_string(),
                model: default_ollama_model(),
                high_accuracy_model: String::new(),
                api_key: String::new(),
                endpoint: default_ollama_endpoint(),
                timeout_secs: default_timeout_secs(),
                rate_limit: None,
            },
            TranslationProvider::Anthropic => Self {
                provider_type: "anthropic".to_string(),
                model: default_anthropic_model(),
                high_accuracy_model: default_anthropic_high_accuracy_model(),
                api_key: String::new(),
                endpoint: default_anthropic_endpoint(),
                timeout_secs: default_anthropic_timeout_secs(),
                rate_limit: default_anthropic_rate_limit(),
            },
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

/// Style guide applied to documents under a path prefix
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PathStyleGuide {
    /// Document path prefix, e.g. `docs/api/`
    pub prefix: String,
    /// Style guide file
    pub path: PathBuf,
}

/// Common translation settings applicable to all providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// System prompt template for translation
    /// Placeholders: {source_language}, {target_language}
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Retry count for failed requests
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Backoff multiplier for retries (in milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Upper bound for a single backoff delay
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Random jitter applied to each delay, as a fraction of the delay
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Style guide appended to every translation prompt
    #[serde(default)]
    pub style_guide_path: Option<PathBuf>,

    /// Additional style guides for documents under a prefix; they win over the base guide
    #[serde(default)]
    pub path_style_guides: Vec<PathStyleGuide>,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter_ratio: default_jitter_ratio(),
            temperature: default_temperature(),
            style_guide_path: None,
            path_style_guides: Vec::new(),
        }
    }
}

/// Sync engine configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SyncConfig {
    /// Translation units per oracle request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// In-flight oracle requests
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Oracle requests per minute; None or 0 disables the limiter
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: Option<u32>,

    /// Per-call timeout
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Similarity at or above which a replace is cosmetic
    #[serde(default = "default_minor_change_similarity")]
    pub minor_change_similarity: f64,

    /// Allowed relative token-count difference for a cosmetic replace
    #[serde(default = "default_token_parity_tolerance")]
    pub token_parity_tolerance: f64,

    /// Oracle attempts for one semantic judgment before the heuristic is used
    #[serde(default = "default_semantic_judge_attempts")]
    pub semantic_judge_attempts: u32,

    /// Batches larger than this many characters use the high-accuracy model
    #[serde(default = "default_high_accuracy_char_threshold")]
    pub high_accuracy_char_threshold: usize,

    /// Batches larger than this many lines use the high-accuracy model
    #[serde(default = "default_high_accuracy_line_threshold")]
    pub high_accuracy_line_threshold: usize,

    /// Characters of neighbouring text sent as context
    #[serde(default = "default_context_chars")]
    pub context_chars: usize,

    /// Files processed concurrently in directory mode
    #[serde(default = "default_file_concurrency")]
    pub file_concurrency: usize,

    /// Stop issuing oracle requests after this many; the rest of the run is aborted
    #[serde(default)]
    pub max_oracle_requests: Option<usize>,

    /// Document extensions picked up in directory mode
    #[serde(default = "default_file_extensions")]
    pub file_extensions: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_concurrent_requests: default_max_concurrent_requests(),
            requests_per_minute: default_requests_per_minute(),
            request_timeout_secs: default_timeout_secs(),
            minor_change_similarity: default_minor_change_similarity(),
            token_parity_tolerance: default_token_parity_tolerance(),
            semantic_judge_attempts: default_semantic_judge_attempts(),
            high_accuracy_char_threshold: default_high_accuracy_char_threshold(),
            high_accuracy_line_threshold: default_high_accuracy_line_threshold(),
            context_chars: default_context_chars(),
            file_concurrency: default_file_concurrency(),
            max_oracle_requests: None,
            file_extensions: default_file_extensions(),
        }
    }
}

/// Durable cache configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// SQLite file; defaults to the user's local data directory
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            database_path: None,
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_target_language() -> String {
    "ja".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_anthropic_timeout_secs() -> u64 {
    60
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000 // doubled on each retry
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_jitter_ratio() -> f64 {
    0.2
}

fn default_temperature() -> f32 {
    0.2
}

fn default_true() -> bool {
    true
}

fn default_batch_size() -> usize {
    20
}

fn default_max_concurrent_requests() -> usize {
    8
}

fn default_requests_per_minute() -> Option<u32> {
    Some(60)
}

fn default_minor_change_similarity() -> f64 {
    0.98
}

fn default_token_parity_tolerance() -> f64 {
    0.2
}

fn default_semantic_judge_attempts() -> u32 {
    2
}

fn default_high_accuracy_char_threshold() -> usize {
    4000
}

fn default_high_accuracy_line_threshold() -> usize {
    80
}

fn default_context_chars() -> usize {
    400
}

fn default_file_concurrency() -> usize {
    4
}

fn default_file_extensions() -> Vec<String> {
    vec!["md".to_string(), "mdx".to_string(), "markdown".to_string()]
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_ollama_model() -> String {
    "llama3".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-5-haiku-latest".to_string()
}

fn default_anthropic_high_accuracy_model() -> String {
    "claude-3-5-sonnet-latest".to_string()
}

fn default_system_prompt() -> String {
    "You are a professional technical translator. Translate documentation from {source_language} to {target_language}. Preserve markdown formatting and keep the original meaning and tone.".to_string()
}

fn default_anthropic_rate_limit() -> Option<u32> {
    // slightly below the 50 requests per minute tier limit
    Some(45)
}

fn check_ratio(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(anyhow!("{} must be between 0 and 1, got {}", name, value));
    }
    Ok(())
}

impl Config {
    /// Load the configuration file, writing defaults first when it does not exist
    pub fn load_or_create(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let file = File::open(config_path)
                .context(format!("Failed to open config file: {}", config_path.display()))?;
            let reader = BufReader::new(file);
            let config: Config = serde_json::from_reader(reader)
                .context(format!("Failed to parse config file: {}", config_path.display()))?;
            return Ok(config);
        }

        warn!("Config file not found at '{}', creating default config.", config_path.display());
        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(config_path, config_json)
            .context(format!("Failed to write default config to file: {}", config_path.display()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        let _source_name = crate::language_utils::get_language_name(&self.source_language)?;
        let _target_name = crate::language_utils::get_language_name(&self.target_language)?;

        if self.translation.provider == TranslationProvider::Anthropic && self.translation.get_api_key().is_empty() {
            return Err(anyhow!(
                "Translation API key is required for Anthropic provider (set it in the config or ANTHROPIC_API_KEY)"
            ));
        }

        if self.sync.batch_size == 0 {
            return Err(anyhow!("sync.batch_size must be at least 1"));
        }
        if self.sync.max_concurrent_requests == 0 {
            return Err(anyhow!("sync.max_concurrent_requests must be at least 1"));
        }
        if self.sync.file_concurrency == 0 {
            return Err(anyhow!("sync.file_concurrency must be at least 1"));
        }
        check_ratio("sync.minor_change_similarity", self.sync.minor_change_similarity)?;
        check_ratio("sync.token_parity_tolerance", self.sync.token_parity_tolerance)?;
        check_ratio("translation.common.jitter_ratio", self.translation.common.jitter_ratio)?;

        Ok(())
    }

    /// Durable cache location
    pub fn cache_database_path(&self) -> Result<PathBuf> {
        match &self.cache.database_path {
            Some(path) => Ok(path.clone()),
            None => crate::database::DatabaseConnection::default_database_path(),
        }
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_language: default_target_language(),
            translation: TranslationConfig::default(),
            sync: SyncConfig::default(),
            cache: CacheConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        let provider_str = self.provider.to_lowercase_string();
        self.available_providers.iter().find(|p| p.provider_type == provider_str)
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.model.is_empty() {
                return provider_config.model.clone();
            }
        }

        match self.provider {
            TranslationProvider::Ollama => default_ollama_model(),
            TranslationProvider::Anthropic => default_anthropic_model(),
        }
    }

    /// Get the high-accuracy model for the active provider
    pub fn get_high_accuracy_model(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.high_accuracy_model.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.get_model())
    }

    /// Get the API key for the active provider, falling back to the environment
    pub fn get_api_key(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.api_key.is_empty() {
                return provider_config.api_key.clone();
            }
        }

        match self.provider {
            TranslationProvider::Anthropic => std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            // Ollama doesn't use API keys
            TranslationProvider::Ollama => String::new(),
        }
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.endpoint.is_empty() {
                return provider_config.endpoint.clone();
            }
        }

        match self.provider {
            TranslationProvider::Ollama => default_ollama_endpoint(),
            TranslationProvider::Anthropic => default_anthropic_endpoint(),
        }
    }

    /// Get the timeout for the active provider
    pub fn get_timeout_secs(&self) -> u64 {
        self.get_active_provider_config()
            .map(|p| p.timeout_secs)
            .unwrap_or_else(default_timeout_secs)
    }

    /// Get the provider-specific rate limit, if any
    pub fn get_rate_limit(&self) -> Option<u32> {
        self.get_active_provider_config().and_then(|p| p.rate_limit)
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: vec![
                ProviderConfig::new(TranslationProvider::Ollama),
                ProviderConfig::new(TranslationProvider::Anthropic),
            ],
            common: TranslationCommonConfig::default(),
        }
    }
}
