//! TOML configuration.
//!
//! ```toml
//! [data]
//! csv_path = "data/sample_nc_log.csv"
//!
//! [retrieval]
//! top_k = 5
//! mode = "semantic"          # lexical | semantic
//!
//! [credentials]
//! api_key_env = "OPENAI_API_KEY"
//!
//! [embedding]
//! remote_model = "text-embedding-3-small"
//! local_model = "all-minilm-l6-v2"
//!
//! [generation]
//! model = "gpt-4o-mini"
//!
//! [server]
//! bind = "127.0.0.1:7341"
//! ```
//!
//! Every section is optional; [`Config::minimal`] is the all-defaults
//! configuration used when no file exists.

use anyhow::{Context, Result};
use nc_analyzer_core::rank::RequestedMode;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
        }
    }
}

fn default_csv_path() -> PathBuf {
    PathBuf::from("data/sample_nc_log.csv")
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_mode")]
    pub mode: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            mode: default_mode(),
        }
    }
}

impl RetrievalConfig {
    pub fn requested_mode(&self) -> Result<RequestedMode> {
        self.mode.parse::<RequestedMode>().map_err(anyhow::Error::msg)
    }
}

fn default_top_k() -> usize {
    nc_analyzer_core::rank::DEFAULT_TOP_K
}
fn default_mode() -> String {
    "lexical".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CredentialsConfig {
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_remote_model")]
    pub remote_model: String,
    #[serde(default = "default_local_model")]
    pub local_model: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            remote_model: default_remote_model(),
            local_model: default_local_model(),
            base_url: default_openai_base_url(),
            timeout_secs: default_timeout_secs(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_remote_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_local_model() -> String {
    "all-minilm-l6-v2".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_batch_size() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// Use the generative backend when a credential is present.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: default_generation_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            base_url: default_openai_base_url(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_generation_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f64 {
    0.2
}
fn default_max_tokens() -> u32 {
    800
}
fn default_generation_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

/// An API key. `Debug` and `Display` never print the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a key; blank strings count as no credential.
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            None
        } else {
            Some(Self(key.trim().to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl Config {
    /// All-defaults configuration.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Resolve the credential: an explicit override wins, then the
    /// configured environment variable. Absence is not an error.
    pub fn resolve_credential(&self, override_key: Option<&str>) -> Option<Credential> {
        if let Some(key) = override_key {
            if let Some(c) = Credential::new(key) {
                return Some(c);
            }
        }
        std::env::var(&self.credentials.api_key_env)
            .ok()
            .and_then(Credential::new)
    }

    fn validate(&self) -> Result<()> {
        if self.retrieval.top_k == 0 {
            anyhow::bail!("retrieval.top_k must be >= 1");
        }
        self.retrieval.requested_mode()?;

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
        }
        if self.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }
        crate::embedding::validate_local_model(&self.embedding.local_model)?;
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Relative data paths are resolved against the config file's directory.
    if config.data.csv_path.is_relative() {
        if let Some(dir) = path.parent() {
            config.data.csv_path = dir.join(&config.data.csv_path);
        }
    }

    config.validate()?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to [`Config::minimal`].
pub fn load_or_minimal(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::info!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::minimal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(body: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let f = write_config("");
        let cfg = load_config(f.path()).unwrap();
        assert_eq!(cfg.retrieval.top_k, 5);
        assert_eq!(cfg.retrieval.requested_mode().unwrap(), RequestedMode::Lexical);
        assert_eq!(cfg.embedding.remote_model, "text-embedding-3-small");
        assert_eq!(cfg.generation.model, "gpt-4o-mini");
        assert_eq!(cfg.generation.max_tokens, 800);
    }

    #[test]
    fn test_relative_csv_path_resolved_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ncx.toml");
        std::fs::write(&path, "[data]\ncsv_path = \"log.csv\"\n").unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.data.csv_path, dir.path().join("log.csv"));
    }

    #[test]
    fn test_rejects_zero_top_k() {
        let f = write_config("[retrieval]\ntop_k = 0\n");
        let err = load_config(f.path()).unwrap_err();
        assert!(err.to_string().contains("top_k"));
    }

    #[test]
    fn test_rejects_unknown_mode() {
        let f = write_config("[retrieval]\nmode = \"hybrid\"\n");
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_rejects_bad_temperature() {
        let f = write_config("[generation]\ntemperature = 3.5\n");
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_rejects_unknown_local_model() {
        let f = write_config("[embedding]\nlocal_model = \"not-a-model\"\n");
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_minimal() {
        let cfg = load_or_minimal(Path::new("/nonexistent/ncx.toml")).unwrap();
        assert_eq!(cfg.server.bind, "127.0.0.1:7341");
    }

    #[test]
    fn test_credential_override_and_blank() {
        let mut cfg = Config::minimal();
        cfg.credentials.api_key_env = "NCX_TEST_KEY_THAT_IS_NEVER_SET".into();
        assert!(cfg.resolve_credential(None).is_none());
        assert!(cfg.resolve_credential(Some("   ")).is_none());
        let c = cfg.resolve_credential(Some("sk-123")).unwrap();
        assert_eq!(c.expose(), "sk-123");
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let c = Credential::new("sk-secret").unwrap();
        assert!(!format!("{:?}", c).contains("secret"));
        assert!(!c.to_string().contains("secret"));
    }
}
