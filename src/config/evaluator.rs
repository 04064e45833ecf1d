// src/config/evaluator.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_api_version() -> String {
    "2024-06-01".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_daily_limit() -> u32 {
    500
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache/evaluator")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// "openai" | "azure" | "mock" | "disabled" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model name (OpenAI) or deployment name (Azure).
    #[serde(default = "default_model")]
    pub model: String,
    /// Base URL. OpenAI defaults to the public API; Azure requires the resource endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// "ENV" means: read from OPENAI_API_KEY / AZURE_OPENAI_API_KEY (by provider)
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Real provider calls per day; cache hits do not count.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            endpoint: None,
            api_version: default_api_version(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
            daily_limit: default_daily_limit(),
            cache_dir: default_cache_dir(),
        }
    }
}

impl EvaluatorConfig {
    /// Normalize the provider name and resolve `"ENV"` keys.
    pub fn resolve(mut self) -> anyhow::Result<Self> {
        self.provider = self.provider.trim().to_lowercase();

        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = match self.provider.as_str() {
                "openai" => env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow::anyhow!("Missing OPENAI_API_KEY env var"))?,
                "azure" => env::var("AZURE_OPENAI_API_KEY")
                    .map_err(|_| anyhow::anyhow!("Missing AZURE_OPENAI_API_KEY env var"))?,
                // mock/disabled never send a key
                _ => String::new(),
            };
        }

        if self.endpoint.as_deref().is_some_and(|e| e.trim().is_empty()) {
            self.endpoint = None;
        }

        if self.provider == "azure" && self.endpoint.is_none() {
            self.endpoint = env::var("AZURE_OPENAI_ENDPOINT").ok();
            if self.endpoint.is_none() {
                anyhow::bail!("azure provider needs `endpoint` or AZURE_OPENAI_ENDPOINT");
            }
        }

        if self.timeout_secs == 0 {
            self.timeout_secs = default_timeout_secs();
        }

        Ok(self)
    }
}
