use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

pub const OPENAI_API_KEY_VARS: &[&str] = &["OPENAI_API_KEY", "OPENAI_KEY", "OPENAI_APIKEY"];
pub const OPENAI_ORG_VARS: &[&str] = &["OPENAI_ORG_ID", "OPENAI_ORG", "OPENAI_ORGANIZATION"];
pub const GOOGLE_API_KEY_VARS: &[&str] = &["GOOGLE_API_KEY", "GEMINI_API_KEY"];
pub const OLLAMA_HOST_VARS: &[&str] = &["OLLAMA_HOST"];
pub const APPLE_BRIDGE_VARS: &[&str] = &["FM_BRIDGE_URL"];

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
const DEFAULT_GOOGLE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_APPLE_URL: &str = "http://localhost:11435";

/// Configuration for building a provider service.
///
/// Credentials left unset here are looked up in the environment when the
/// service is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Provider type: "openai", "google", "ollama" or "apple"
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Default model for callers that do not pick one
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub apple: AppleConfig,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub organization: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoogleConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub base_url: Option<String>,
}

/// Foundation Models HTTP bridge running next to the on-device model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppleConfig {
    pub base_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            openai: OpenAiConfig::default(),
            google: GoogleConfig::default(),
            ollama: OllamaConfig::default(),
            apple: AppleConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from `commonai.yaml` if it exists, otherwise use defaults.
    pub fn load_or_default() -> Self {
        Self::load("commonai.yaml").unwrap_or_default()
    }

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_openai_key(mut self, api_key: impl Into<String>) -> Self {
        self.openai.api_key = Some(api_key.into());
        self
    }

    pub fn with_openai_organization(mut self, organization: impl Into<String>) -> Self {
        self.openai.organization = Some(organization.into());
        self
    }

    pub fn with_google_key(mut self, api_key: impl Into<String>) -> Self {
        self.google.api_key = Some(api_key.into());
        self
    }

    /// Set the base URL of the selected provider.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = Some(url.into());
        match self.provider.to_lowercase().as_str() {
            "google" => self.google.base_url = url,
            "ollama" => self.ollama.base_url = url,
            "apple" => self.apple.base_url = url,
            _ => self.openai.base_url = url,
        }
        self
    }
}

/// Returns the first present, non-blank value: `explicit` first, then each
/// variable in `names` in order.
pub fn resolve_first<F>(explicit: Option<&str>, names: &[&str], lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let non_blank = |value: String| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    };

    explicit
        .map(str::to_string)
        .and_then(non_blank)
        .or_else(|| names.iter().find_map(|name| lookup(name).and_then(non_blank)))
}

/// [`resolve_first`] against the process environment.
pub fn resolve_env(explicit: Option<&str>, names: &[&str]) -> Option<String> {
    resolve_first(explicit, names, |name| std::env::var(name).ok())
}

/// Pre-resolved OpenAI credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenAiCredentials {
    pub api_key: Option<String>,
    pub organization: Option<String>,
}

impl OpenAiCredentials {
    pub fn resolve(config: &OpenAiConfig) -> Self {
        Self::resolve_with(config, |name| std::env::var(name).ok())
    }

    pub fn resolve_with<F>(config: &OpenAiConfig, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            api_key: resolve_first(config.api_key.as_deref(), OPENAI_API_KEY_VARS, &lookup),
            organization: resolve_first(
                config.organization.as_deref(),
                OPENAI_ORG_VARS,
                &lookup,
            ),
        }
    }
}

impl OpenAiConfig {
    pub fn base_url(&self) -> String {
        resolve_first(self.base_url.as_deref(), &[], |_| None)
            .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string())
    }
}

impl GoogleConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_env(self.api_key.as_deref(), GOOGLE_API_KEY_VARS)
    }

    pub fn base_url(&self) -> String {
        resolve_first(self.base_url.as_deref(), &[], |_| None)
            .unwrap_or_else(|| DEFAULT_GOOGLE_URL.to_string())
    }
}

impl OllamaConfig {
    /// Explicit URL, then `OLLAMA_HOST`, then the local default.
    pub fn base_url(&self) -> String {
        resolve_env(self.base_url.as_deref(), OLLAMA_HOST_VARS)
            .map(with_scheme)
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string())
    }
}

impl AppleConfig {
    /// Explicit URL, then `FM_BRIDGE_URL`, then the local default.
    pub fn base_url(&self) -> String {
        resolve_env(self.base_url.as_deref(), APPLE_BRIDGE_VARS)
            .map(with_scheme)
            .unwrap_or_else(|| DEFAULT_APPLE_URL.to_string())
    }
}

// OLLAMA_HOST is commonly set as a bare host:port.
fn with_scheme(url: String) -> String {
    let url = url.trim_end_matches('/').to_string();
    if url.contains("://") {
        url
    } else {
        format!("http://{url}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.provider, "openai");
        assert!(config.openai.api_key.is_none());
        assert_eq!(config.openai.base_url(), "https://api.openai.com/v1");
        assert_eq!(
            config.google.base_url(),
            "https://generativelanguage.googleapis.com/v1beta"
        );
    }

    #[test]
    fn test_explicit_value_wins() {
        let lookup = env(&[("OPENAI_API_KEY", "from-env")]);
        let value = resolve_first(Some("explicit"), OPENAI_API_KEY_VARS, lookup);
        assert_eq!(value.as_deref(), Some("explicit"));
    }

    #[test]
    fn test_blank_values_are_skipped() {
        let lookup = env(&[("OPENAI_API_KEY", "  "), ("OPENAI_KEY", "second")]);
        let value = resolve_first(Some(""), OPENAI_API_KEY_VARS, lookup);
        assert_eq!(value.as_deref(), Some("second"));
    }

    #[test]
    fn test_nothing_resolves_to_none() {
        assert_eq!(resolve_first(None, OPENAI_API_KEY_VARS, env(&[])), None);
    }

    #[test]
    fn test_openai_credentials_follow_fallback_chain() {
        let lookup = env(&[("OPENAI_APIKEY", "sk-3"), ("OPENAI_ORGANIZATION", "org-3")]);
        let credentials = OpenAiCredentials::resolve_with(&OpenAiConfig::default(), lookup);
        assert_eq!(credentials.api_key.as_deref(), Some("sk-3"));
        assert_eq!(credentials.organization.as_deref(), Some("org-3"));
    }

    #[test]
    fn test_with_base_url_targets_selected_provider() {
        let config = Config::new()
            .with_provider("ollama")
            .with_base_url("http://gpu-box:11434");
        assert_eq!(config.ollama.base_url(), "http://gpu-box:11434");
        assert!(config.openai.base_url.is_none());
    }

    #[test]
    fn test_bare_host_gets_scheme() {
        let config = OllamaConfig {
            base_url: Some("127.0.0.1:11434/".to_string()),
        };
        assert_eq!(config.base_url(), "http://127.0.0.1:11434");
    }

    #[test]
    fn test_load_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "provider: google\nmodel: gemini-1.5-flash\ngoogle:\n  api_key: g-key\n"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.provider, "google");
        assert_eq!(config.model, "gemini-1.5-flash");
        assert_eq!(config.google.api_key.as_deref(), Some("g-key"));
        assert!(config.apple.base_url.is_none());
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let err = Config::load("/nonexistent/commonai.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileRead(_)));
    }

    #[test]
    fn test_load_malformed_yaml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "provider: [unterminated").unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }
}
