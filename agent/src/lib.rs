pub mod analysis;
pub mod app;
pub mod classify;
pub mod error;
pub mod flow;
pub mod llm;
pub mod prompts;
pub mod recommend;

pub use analysis::{AnalysisBoard, Analyzer, BatchOutcome, ModelProgress};
pub use app::{AppError, InsightApp};
pub use classify::{classify, ClassifiedError, ErrorType};
pub use error::{CompletionError, FailureKind};
pub use flow::{FlowError, FlowState, Step};
pub use llm::{provider_from_config, CompletionProvider, CompletionRequest, ProviderMode};
pub use recommend::{Recommendation, RecommendationSource, Recommender, RecommendError};
