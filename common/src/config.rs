use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_API_URL: &str = "https://api.siliconflow.cn/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "deepseek-ai/DeepSeek-R1-Distill-Qwen-32B";
pub const DEFAULT_TRIAL_LIMIT: u32 = 3;
pub const DEFAULT_RECOMMENDATION_COUNT: usize = 6;
pub const MAX_RECOMMENDATION_COUNT: usize = 6;
pub const DEFAULT_PORT: u16 = 3000;

pub const ENV_API_KEY: &str = "SILICONFLOW_API_KEY";
pub const ENV_API_URL: &str = "SILICONFLOW_API_URL";
pub const ENV_MODEL: &str = "INSIGHTBLAST_MODEL";

/// Application configuration. Every field is optional in the file; the
/// accessors supply defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Remote completion credential. Absent means synthetic mode.
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub model: Option<String>,
    pub trial_limit: Option<u32>,
    pub recommendation_count: Option<usize>,
    pub storage_path: Option<PathBuf>,
    pub catalog_path: Option<PathBuf>,
    /// Serve a synthetic analysis when the remote call fails
    pub synthetic_fallback: Option<bool>,
    /// Artificial delay for synthetic completions
    pub synthetic_latency_ms: Option<u64>,
    pub port: Option<u16>,
}

impl AppConfig {
    /// Read a JSON config file. A missing or unreadable file yields the
    /// default config.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Self::default(),
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Ignoring malformed config {:?}: {}", path, e);
            Self::default()
        })
    }

    /// Overlay values from a variable lookup (normally the process env).
    pub fn apply_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
        if let Some(key) = non_empty(ENV_API_KEY) {
            self.api_key = Some(key);
        }
        if let Some(url) = non_empty(ENV_API_URL) {
            self.api_url = Some(url);
        }
        if let Some(model) = non_empty(ENV_MODEL) {
            self.model = Some(model);
        }
        self
    }

    pub fn from_env() -> Self {
        Self::default().apply_env(|k| std::env::var(k).ok())
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn trial_limit(&self) -> u32 {
        self.trial_limit.unwrap_or(DEFAULT_TRIAL_LIMIT)
    }

    /// Clamped to `1..=6`.
    pub fn recommendation_count(&self) -> usize {
        self.recommendation_count
            .unwrap_or(DEFAULT_RECOMMENDATION_COUNT)
            .clamp(1, MAX_RECOMMENDATION_COUNT)
    }

    /// Serve a synthetic analysis when the provider fails. On unless
    /// explicitly disabled.
    pub fn synthetic_fallback(&self) -> bool {
        self.synthetic_fallback.unwrap_or(true)
    }

    pub fn synthetic_latency_ms(&self) -> u64 {
        self.synthetic_latency_ms.unwrap_or(0)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}
