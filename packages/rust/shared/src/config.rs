//! Application configuration for ArticleForge.
//!
//! User config lives at `~/.articleforge/articleforge.toml`.
//! CLI flags override config file values, which override defaults.
//! The API key itself is never stored in the file; only the name of the
//! environment variable holding it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ArticleForgeError, Result};
use crate::types::{ContentLength, ContentStyle, GenerationOptions, TargetAudience};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "articleforge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".articleforge";

// ---------------------------------------------------------------------------
// ApiKey
// ---------------------------------------------------------------------------

/// An opaque API credential. Redacted in `Debug` output so it can never
/// leak through logs or error chains.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Expose the secret for the one place that needs it: the HTTP
    /// Authorization header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

// ---------------------------------------------------------------------------
// Config structs (matching articleforge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Generation API settings.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Retry/backoff policy.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default output directory for exported documents.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Default number of sub-keywords (and thus articles) per batch.
    #[serde(default = "default_keyword_count")]
    pub keyword_count: u32,

    /// Default concurrent generation jobs.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Default article options.
    #[serde(default)]
    pub content_style: ContentStyle,
    #[serde(default)]
    pub content_length: ContentLength,
    #[serde(default)]
    pub target_audience: TargetAudience,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            keyword_count: default_keyword_count(),
            concurrency: default_concurrency(),
            content_style: ContentStyle::default(),
            content_length: ContentLength::default(),
            target_audience: TargetAudience::default(),
        }
    }
}

fn default_output_dir() -> String {
    "~/articleforge-out".into()
}
fn default_keyword_count() -> u32 {
    10
}
fn default_concurrency() -> u32 {
    3
}

/// `[generator]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the generation API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier sent with each request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-call timeout in seconds, enforced by the HTTP client.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_key_env() -> String {
    "ARTICLEFORGE_API_KEY".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api".into()
}
fn default_model() -> String {
    "moonshotai/kimi-k2.5".into()
}
fn default_timeout_secs() -> u64 {
    60
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts per remote call (first try included).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff delay in ms.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff cap in ms.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    8_000
}

// ---------------------------------------------------------------------------
// Batch config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime batch configuration — merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Number of sub-keywords to derive from the seed.
    pub keyword_count: u32,
    /// Maximum concurrent generation jobs (the limit `K`).
    pub concurrency: u32,
    /// Options applied to every article.
    pub options: GenerationOptions,
}

impl From<&AppConfig> for BatchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            keyword_count: config.defaults.keyword_count,
            concurrency: config.defaults.concurrency,
            options: GenerationOptions {
                content_style: config.defaults.content_style,
                content_length: config.defaults.content_length,
                target_audience: config.defaults.target_audience,
            },
        }
    }
}

impl RetryConfig {
    /// Initial backoff delay.
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Backoff cap.
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.articleforge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ArticleForgeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.articleforge/articleforge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ArticleForgeError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ArticleForgeError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ArticleForgeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ArticleForgeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ArticleForgeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the API key from the env var named in config.
///
/// Fails with a config error if the variable is unset or empty; the key
/// value itself never appears in the error.
pub fn load_api_key(config: &AppConfig) -> Result<ApiKey> {
    let var_name = &config.generator.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(ApiKey::new(val)),
        _ => Err(ArticleForgeError::config(format!(
            "generation API key not found. Set the {var_name} environment variable."
        ))),
    }
}
