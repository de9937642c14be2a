use std::sync::Arc;

use agent::{Analyzer, CompletionProvider, ProviderMode, Recommender};
use common::{AppConfig, ModelCatalog};

/// Shared handles for the HTTP routes. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub catalog: Arc<ModelCatalog>,
    pub provider: Arc<dyn CompletionProvider>,
    pub recommender: Arc<Recommender>,
    pub analyzer: Analyzer,
}

impl AppState {
    pub fn new(config: AppConfig, catalog: Arc<ModelCatalog>, provider: Arc<dyn CompletionProvider>) -> Self {
        let recommender = Recommender::new(catalog.clone(), provider.clone()).with_count(config.recommendation_count());
        Self {
            analyzer: Analyzer::new(catalog.clone(), provider.clone()),
            recommender: Arc::new(recommender),
            config: Arc::new(config),
            catalog,
            provider,
        }
    }

    /// True when no credential is configured and every answer is synthetic.
    pub fn debug_mode(&self) -> bool {
        self.provider.mode() == ProviderMode::Synthetic
    }
}
