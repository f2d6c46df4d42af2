use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL override for OpenAI-compatible servers (vLLM, llama.cpp).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Number of ranked candidates requested per step.
    #[serde(default = "default_top_logprobs")]
    pub top_logprobs: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            url: None,
            temperature: 0.7,
            top_logprobs: 5,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_temperature() -> f64 {
    0.7
}
fn default_top_logprobs() -> u32 {
    5
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// Accepted-token budget per request.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Weight assigned to a forced closing delimiter (log-probability).
    #[serde(default = "default_forced_close_logprob")]
    pub forced_close_logprob: f64,
    /// Weight assigned to each `{` / `[` seed candidate (log-probability).
    #[serde(default = "default_seed_logprob")]
    pub seed_logprob: f64,
    /// Consecutive source failures tolerated before a request fails.
    #[serde(default = "default_max_source_failures")]
    pub max_source_failures: u32,
    /// Backstop timeout around each generation step.
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 100,
            forced_close_logprob: -10.0,
            seed_logprob: -1.0,
            max_source_failures: 2,
            step_timeout_secs: 120,
        }
    }
}

fn default_max_tokens() -> usize {
    100
}
fn default_forced_close_logprob() -> f64 {
    -10.0
}
fn default_seed_logprob() -> f64 {
    -1.0
}
fn default_max_source_failures() -> u32 {
    2
}
fn default_step_timeout_secs() -> u64 {
    120
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
    "127.0.0.1:7431".to_string()
}

impl ProviderConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl Config {
    /// Built-in defaults, for commands that run without a config file.
    pub fn minimal() -> Self {
        Self {
            provider: ProviderConfig::default(),
            generation: GenerationConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate generation
    if config.generation.max_tokens == 0 {
        anyhow::bail!("generation.max_tokens must be > 0");
    }

    if config.generation.forced_close_logprob > 0.0 {
        anyhow::bail!("generation.forced_close_logprob must be <= 0");
    }

    if config.generation.seed_logprob > 0.0 {
        anyhow::bail!("generation.seed_logprob must be <= 0");
    }

    // Validate provider
    if config.provider.top_logprobs == 0 {
        anyhow::bail!("provider.top_logprobs must be >= 1");
    }

    if !(0.0..=2.0).contains(&config.provider.temperature) {
        anyhow::bail!("provider.temperature must be in [0.0, 2.0]");
    }

    if config.provider.is_enabled() && config.provider.model.is_none() {
        anyhow::bail!(
            "provider.model must be specified when provider is '{}'",
            config.provider.provider
        );
    }

    match config.provider.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown token provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("rail.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        (tmp, path)
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let (_tmp, path) = write_config("");
        let config = load_config(&path).unwrap();

        assert_eq!(config.provider.provider, "disabled");
        assert!(!config.provider.is_enabled());
        assert_eq!(config.provider.top_logprobs, 5);
        assert_eq!(config.generation.max_tokens, 100);
        assert_eq!(config.generation.forced_close_logprob, -10.0);
        assert_eq!(config.generation.seed_logprob, -1.0);
        assert_eq!(config.server.bind, "127.0.0.1:7431");
    }

    #[test]
    fn test_full_config_parses() {
        let (_tmp, path) = write_config(
            r#"[provider]
provider = "openai"
model = "gpt-4-turbo"
url = "http://localhost:8000"
temperature = 0.2
top_logprobs = 8

[generation]
max_tokens = 256
forced_close_logprob = -12.5
seed_logprob = -0.5

[server]
bind = "0.0.0.0:9000"
"#,
        );

        let config = load_config(&path).unwrap();
        assert!(config.provider.is_enabled());
        assert_eq!(config.provider.model.as_deref(), Some("gpt-4-turbo"));
        assert_eq!(config.provider.url.as_deref(), Some("http://localhost:8000"));
        assert_eq!(config.generation.max_tokens, 256);
        assert_eq!(config.generation.forced_close_logprob, -12.5);
        assert_eq!(config.server.bind, "0.0.0.0:9000");
    }

    #[test]
    fn test_missing_file_is_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = load_config(&tmp.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_zero_max_tokens_rejected() {
        let (_tmp, path) = write_config("[generation]\nmax_tokens = 0\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_positive_fallback_weight_rejected() {
        let (_tmp, path) = write_config("[generation]\nforced_close_logprob = 1.5\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_enabled_provider_requires_model() {
        let (_tmp, path) = write_config("[provider]\nprovider = \"openai\"\n");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("provider.model"));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let (_tmp, path) = write_config("[provider]\nprovider = \"oracle\"\nmodel = \"m\"\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_out_of_range_temperature_rejected() {
        let (_tmp, path) = write_config(
            "[provider]\nprovider = \"openai\"\nmodel = \"m\"\ntemperature = 3.0\n",
        );
        assert!(load_config(&path).is_err());
    }
}
