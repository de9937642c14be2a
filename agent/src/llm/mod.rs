//! Completion providers.
//!
//! One provider is chosen at startup: the remote chat-completion client
//! when a credential is configured, the synthetic generator otherwise.

pub mod remote;
pub mod synthetic;

pub use remote::RemoteProvider;
pub use synthetic::SyntheticProvider;

use async_trait::async_trait;
use common::AppConfig;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::CompletionError;

pub const RECOMMENDATION_MAX_TOKENS: u32 = 150;
pub const ANALYSIS_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_THINKING_BUDGET: u32 = 4096;
pub const ANALYSIS_THINKING_BUDGET: u32 = 6144;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderMode {
    Remote,
    Synthetic,
}

impl ProviderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderMode::Remote => "remote",
            ProviderMode::Synthetic => "synthetic",
        }
    }
}

impl fmt::Display for ProviderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a completion is requested. The synthetic provider needs the
/// model name and question to fill its templates.
#[derive(Debug, Clone, PartialEq)]
pub enum Purpose {
    Recommendation,
    Analysis { model_name: String, question: String },
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub purpose: Purpose,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub enable_thinking: bool,
    pub thinking_budget: u32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, purpose: Purpose) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            purpose,
            max_tokens: 512,
            temperature: 0.7,
            top_p: 0.9,
            enable_thinking: true,
            thinking_budget: DEFAULT_THINKING_BUDGET,
        }
    }

    /// Short id-list request.
    pub fn recommendation(prompt: impl Into<String>) -> Self {
        Self::new(prompt, Purpose::Recommendation).with_max_tokens(RECOMMENDATION_MAX_TOKENS)
    }

    /// Long-form analysis request.
    pub fn analysis(prompt: impl Into<String>, model_name: impl Into<String>, question: impl Into<String>) -> Self {
        Self::new(
            prompt,
            Purpose::Analysis {
                model_name: model_name.into(),
                question: question.into(),
            },
        )
        .with_max_tokens(ANALYSIS_MAX_TOKENS)
        .with_thinking_budget(ANALYSIS_THINKING_BUDGET)
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_thinking_budget(mut self, budget: u32) -> Self {
        self.thinking_budget = budget;
        self
    }

    pub fn without_thinking(mut self) -> Self {
        self.enable_thinking = false;
        self
    }
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn mode(&self) -> ProviderMode;

    /// Provider name for logging/identification
    fn name(&self) -> &str;

    /// Trimmed completion text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;

    async fn health_check(&self) -> Result<(), CompletionError>;
}

/// Pick the provider once, from credential presence.
pub fn provider_from_config(config: &AppConfig) -> Result<Arc<dyn CompletionProvider>, CompletionError> {
    match config.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
        Some(key) => {
            let provider = RemoteProvider::new(key, config.api_url(), config.model())?;
            tracing::info!(model = %config.model(), "Using remote completion provider");
            Ok(Arc::new(provider))
        }
        None => {
            tracing::info!("No API key configured, using synthetic completions");
            let latency = Duration::from_millis(config.synthetic_latency_ms());
            Ok(Arc::new(SyntheticProvider::new().with_latency(latency)))
        }
    }
}
