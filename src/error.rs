use thiserror::Error;

/// Errors produced by the pipeline components.
///
/// Every component returns a tagged variant instead of a broad error type so
/// the orchestrator can match on the kind and pick the right degraded
/// response. None of these escape [`crate::pipeline::RagPipeline::retrieve_answer`];
/// they are all converted into a well-formed `RagResponse` with an
/// `error_type` tag.
#[derive(Debug, Error)]
pub enum RagError {
    /// Bad caller input (empty text, out-of-range top_k / batch_size).
    /// Rejected immediately, never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The requested collection is not one of the two configured names.
    #[error("invalid collection: {0}")]
    InvalidCollection(String),

    /// The embedding provider failed (rate limit, auth, network).
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The vector database could not be reached. Distinct from an empty
    /// result set, which is a successful search.
    #[error("vector database unavailable: {0}")]
    RetrievalUnavailable(String),

    /// Unexpected failure during answer synthesis (e.g. a malformed provider
    /// response). Provider transport errors are retried and then degraded
    /// inside the generator; this variant is for everything else.
    #[error("answer generation failed: {0}")]
    Generation(String),
}

impl RagError {
    /// Tag used in `RagResponse.metadata.error_type` for degraded responses.
    pub fn error_type(&self) -> &'static str {
        match self {
            RagError::InvalidInput(_) | RagError::InvalidCollection(_) => "invalid_input",
            RagError::Embedding(_) => "embedding",
            RagError::RetrievalUnavailable(_) => "database",
            RagError::Generation(_) => "rag",
        }
    }
}
