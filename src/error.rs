//! Error types for the energy roadmap pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Query synthesis error: {0}")]
    Synthesis(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Web search error: {0}")]
    Search(String),

    #[error("Grading error: {0}")]
    Grading(String),

    #[error("Roadmap generation error: {0}")]
    Generation(String),

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
