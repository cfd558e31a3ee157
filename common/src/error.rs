use async_openai::error::OpenAIError;
use thiserror::Error;
use tokio::task::JoinError;

/// Failure modes of the external completion service as surfaced through the
/// invocation queue. Throttled and Transient are recoverable inside the
/// queue; Fatal propagates immediately.
#[derive(Error, Debug)]
pub enum InvocationError {
    #[error("backend throttled the request: {0}")]
    Throttled(String),
    #[error("transient backend failure: {0}")]
    Transient(String),
    #[error("fatal backend failure: {0}")]
    Fatal(String),
    #[error("retries exhausted after {attempts} attempts, last failure: {last}")]
    RetriesExhausted { attempts: usize, last: String },
}

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Invocation error: {0}")]
    Invocation(#[from] InvocationError),
    #[error("Retrieval collaborator unavailable: {0}")]
    RetrievalUnavailable(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("LLM parsing error: {0}")]
    LLMParsing(String),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("Internal service error: {0}")]
    InternalError(String),
}
