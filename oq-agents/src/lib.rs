//! Specialist agent adapters: context retrieval, regulatory research, and
//! SME assessment, backed by LLM completion, vector search, and
//! regulatory-API clients (spec §6 External Interfaces).

pub mod dispatch;
pub mod llm;
pub mod rate_limit;
pub mod regulatory;
pub mod retry;
pub mod vector;

pub use dispatch::AgentDispatcher;
pub use llm::{CompletionClient, CompletionRequest, CompletionResponse};
pub use rate_limit::TokenBucket;
pub use regulatory::{RegulatoryClient, RegulatorySource};
pub use retry::RetryPolicy;
pub use vector::VectorSearchClient;
