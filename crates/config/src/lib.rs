//! Configuration loading, validation, and management for Recollect.
//!
//! Loads configuration from `~/.recollect/config.toml` with environment
//! variable overrides. Validates all settings at startup so that budget
//! misconfiguration is reported before the first request.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Cache backends understood by the store factory.
pub const CACHE_BACKENDS: [&str; 3] = ["memory", "file", "none"];

/// The root configuration structure.
///
/// Maps directly to `~/.recollect/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Token counting
    #[serde(default)]
    pub tokenizer: TokenizerConfig,

    /// Prompt token budget
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Semantic cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// System prompt sources
    #[serde(default)]
    pub prompts: PromptConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizerConfig {
    /// Encoder name passed to the tokenizer (e.g. "heuristic", "cl100k_base")
    #[serde(default = "default_encoder")]
    pub encoder: String,

    /// Directory of HuggingFace `<encoder>.json` tokenizer files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer_dir: Option<PathBuf>,
}

fn default_encoder() -> String {
    "heuristic".into()
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            encoder: default_encoder(),
            tokenizer_dir: None,
        }
    }
}

/// Token budget for one assembled prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Model context size
    #[serde(default = "default_max_total_tokens")]
    pub max_total_tokens: usize,

    /// Tokens withheld for the model's answer
    #[serde(default = "default_completion_reserve_tokens")]
    pub completion_reserve_tokens: usize,

    /// Slack for formatting and concatenation overhead
    #[serde(default = "default_safety_buffer_tokens")]
    pub safety_buffer_tokens: usize,

    #[serde(default = "default_system_max_tokens")]
    pub system_max_tokens: usize,

    #[serde(default)]
    pub memory_min_tokens: usize,

    #[serde(default = "default_memory_max_tokens")]
    pub memory_max_tokens: usize,

    #[serde(default)]
    pub messages_min_tokens: usize,

    #[serde(default = "default_messages_max_tokens")]
    pub messages_max_tokens: usize,
}

fn default_max_total_tokens() -> usize {
    4096
}
fn default_completion_reserve_tokens() -> usize {
    500
}
fn default_safety_buffer_tokens() -> usize {
    50
}
fn default_system_max_tokens() -> usize {
    1500
}
fn default_memory_max_tokens() -> usize {
    2000
}
fn default_messages_max_tokens() -> usize {
    1500
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_total_tokens: default_max_total_tokens(),
            completion_reserve_tokens: default_completion_reserve_tokens(),
            safety_buffer_tokens: default_safety_buffer_tokens(),
            system_max_tokens: default_system_max_tokens(),
            memory_min_tokens: 0,
            memory_max_tokens: default_memory_max_tokens(),
            messages_min_tokens: 0,
            messages_max_tokens: default_messages_max_tokens(),
        }
    }
}

impl BudgetConfig {
    /// Check the budget invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let reserved = self
            .completion_reserve_tokens
            .saturating_add(self.safety_buffer_tokens);
        if self.max_total_tokens <= reserved {
            return Err(ConfigError::ValidationError(format!(
                "budget.max_total_tokens ({}) must exceed completion_reserve_tokens + safety_buffer_tokens ({})",
                self.max_total_tokens, reserved
            )));
        }
        if self.memory_min_tokens > self.memory_max_tokens {
            return Err(ConfigError::ValidationError(
                "budget.memory_min_tokens must not exceed memory_max_tokens".into(),
            ));
        }
        if self.messages_min_tokens > self.messages_max_tokens {
            return Err(ConfigError::ValidationError(
                "budget.messages_min_tokens must not exceed messages_max_tokens".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// "memory", "file" or "none"
    #[serde(default = "default_cache_backend")]
    pub backend: String,

    /// JSONL file for the "file" backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Vector store partition holding cache rows
    #[serde(default = "default_partition_key")]
    pub partition_key: String,

    /// Minimum similarity for both the repeat check and the row lookup
    #[serde(default = "default_min_relevance")]
    pub min_relevance: f32,

    /// Token cap of the conversation context used as lookup key
    #[serde(default = "default_conversation_context_max_tokens")]
    pub conversation_context_max_tokens: usize,

    /// Upper bound on stored rows per partition; unbounded when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,
}

fn default_true() -> bool {
    true
}
fn default_cache_backend() -> String {
    "memory".into()
}
fn default_partition_key() -> String {
    "semantic-cache".into()
}
fn default_min_relevance() -> f32 {
    0.95
}
fn default_conversation_context_max_tokens() -> usize {
    100
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: default_cache_backend(),
            path: None,
            partition_key: default_partition_key(),
            min_relevance: default_min_relevance(),
            conversation_context_max_tokens: default_conversation_context_max_tokens(),
            max_entries: None,
        }
    }
}

impl CacheConfig {
    /// The JSONL path used by the "file" backend.
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            AppConfig::config_dir().join("cache").join("entries.jsonl")
        })
    }

    /// The backend actually used, honouring `enabled`.
    pub fn effective_backend(&self) -> &str {
        if self.enabled { self.backend.as_str() } else { "none" }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Directory of `<name>.md` system prompts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    #[serde(default = "default_prompt_name")]
    pub default_name: String,
}

fn default_prompt_name() -> String {
    "default".into()
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            dir: None,
            default_name: default_prompt_name(),
        }
    }
}

impl PromptConfig {
    /// A file-backed provider when a prompt directory is configured.
    pub fn file_provider(&self) -> Option<recollect_core::FilePromptProvider> {
        self.dir
            .as_ref()
            .map(|dir| recollect_core::FilePromptProvider::new(dir.clone()))
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.recollect/config.toml).
    ///
    /// Environment variables override the file:
    /// - `RECOLLECT_ENCODER`
    /// - `RECOLLECT_CACHE_BACKEND`
    /// - `RECOLLECT_MIN_RELEVANCE`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        tracing::info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(encoder) = std::env::var("RECOLLECT_ENCODER") {
            self.tokenizer.encoder = encoder;
        }

        if let Ok(backend) = std::env::var("RECOLLECT_CACHE_BACKEND") {
            self.cache.backend = backend;
        }

        if let Ok(raw) = std::env::var("RECOLLECT_MIN_RELEVANCE") {
            self.cache.min_relevance = raw.parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "RECOLLECT_MIN_RELEVANCE is not a number: {raw}"
                ))
            })?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".recollect")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tokenizer.encoder.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "tokenizer.encoder must not be empty".into(),
            ));
        }

        self.budget.validate()?;

        if !(-1.0..=1.0).contains(&self.cache.min_relevance) {
            return Err(ConfigError::ValidationError(
                "cache.min_relevance must be between -1.0 and 1.0".into(),
            ));
        }

        if !CACHE_BACKENDS.contains(&self.cache.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "cache.backend must be one of {:?}, got '{}'",
                CACHE_BACKENDS, self.cache.backend
            )));
        }

        if self.cache.conversation_context_max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "cache.conversation_context_max_tokens must be > 0".into(),
            ));
        }

        if self.cache.max_entries == Some(0) {
            return Err(ConfigError::ValidationError(
                "cache.max_entries must be > 0 when set".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for recollect_core::Error {
    fn from(err: ConfigError) -> Self {
        recollect_core::Error::Config {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tokenizer.encoder, "heuristic");
        assert_eq!(config.cache.backend, "memory");
        assert_eq!(config.budget.max_total_tokens, 4096);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.budget, config.budget);
        assert_eq!(parsed.cache.partition_key, config.cache.partition_key);
    }

    #[test]
    fn reserve_plus_buffer_must_fit_in_total() {
        let config = AppConfig {
            budget: BudgetConfig {
                max_total_tokens: 500,
                completion_reserve_tokens: 450,
                safety_buffer_tokens: 50,
                ..BudgetConfig::default()
            },
            ..AppConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_total_tokens"));
    }

    #[test]
    fn huge_reserves_rejected_without_overflow() {
        let budget = BudgetConfig {
            max_total_tokens: usize::MAX,
            completion_reserve_tokens: usize::MAX,
            safety_buffer_tokens: usize::MAX,
            ..BudgetConfig::default()
        };
        let err = budget.validate().unwrap_err();
        assert!(err.to_string().contains("max_total_tokens"));
    }

    #[test]
    fn floors_above_caps_rejected() {
        let budget = BudgetConfig {
            memory_min_tokens: 3000,
            memory_max_tokens: 2000,
            ..BudgetConfig::default()
        };
        assert!(budget.validate().is_err());

        let budget = BudgetConfig {
            messages_min_tokens: 10,
            messages_max_tokens: 5,
            ..BudgetConfig::default()
        };
        assert!(budget.validate().is_err());
    }

    #[test]
    fn invalid_relevance_rejected() {
        let mut config = AppConfig::default();
        config.cache.min_relevance = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_backend_rejected() {
        let mut config = AppConfig::default();
        config.cache.backend = "redis".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("redis"));
    }

    #[test]
    fn zero_max_entries_rejected() {
        let mut config = AppConfig::default();
        config.cache.max_entries = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/recollect/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().cache.min_relevance, 0.95);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(
            tmp,
            r#"
[budget]
max_total_tokens = 8192
memory_min_tokens = 1000

[cache]
backend = "file"
min_relevance = 0.85
max_entries = 500
"#
        )
        .unwrap();

        let config = AppConfig::load_from(tmp.path()).unwrap();
        assert_eq!(config.budget.max_total_tokens, 8192);
        assert_eq!(config.budget.memory_min_tokens, 1000);
        assert_eq!(config.budget.completion_reserve_tokens, 500);
        assert_eq!(config.cache.backend, "file");
        assert_eq!(config.cache.max_entries, Some(500));
        assert_eq!(config.cache.partition_key, "semantic-cache");
        assert_eq!(config.tokenizer.encoder, "heuristic");
    }

    #[test]
    fn invalid_file_reports_parse_error() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(tmp, "[budget\nmax_total_tokens = ").unwrap();
        let err = AppConfig::load_from(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn disabled_cache_uses_none_backend() {
        let mut config = AppConfig::default();
        config.cache.enabled = false;
        assert_eq!(config.cache.effective_backend(), "none");
    }

    #[test]
    fn prompt_dir_yields_file_provider() {
        use recollect_core::SystemPromptProvider;

        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("default.md"), "Be brief.").unwrap();

        let prompts = PromptConfig {
            dir: Some(dir.path().to_path_buf()),
            ..PromptConfig::default()
        };
        let provider = prompts.file_provider().unwrap();
        assert_eq!(provider.get(&prompts.default_name).unwrap(), "Be brief.");
        assert!(PromptConfig::default().file_provider().is_none());
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("semantic-cache"));
        assert!(toml_str.contains("4096"));
    }

    #[test]
    fn config_error_converts_to_core_error() {
        let err: recollect_core::Error = ConfigError::ValidationError("bad".into()).into();
        assert!(err.to_string().contains("bad"));
    }
}
