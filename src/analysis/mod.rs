/// Job application classification and statistics
pub mod aggregator;
pub mod classifier;
pub mod models;
pub mod retriever;

pub use aggregator::aggregate;
pub use classifier::{Classifier, DEFAULT_KEYWORDS};
pub use models::{AnalysisResult, MessageMetadata, MessageRef, RunOutcome, RunStatus};
pub use retriever::{retrieve_classified, FailurePolicy, FetchOptions, Retrieval};
