pub mod catalog;
pub mod config;
pub mod model;
pub mod protocol;
pub mod storage;
pub mod validation;

pub use catalog::{CatalogError, ModelCatalog};
pub use config::AppConfig;
pub use model::{AnalysisResult, Difficulty, ModelCategory, ThinkingModel};
pub use storage::LocalStorage;
pub use validation::ValidationError;
