//! Error types for the server binary.
//!
//! [`AppError`] wraps every failure that can stop the process during
//! startup or while serving, so `main` can propagate with `?`.

/// Top-level error for the server binary.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: simarena_core::config::ConfigError,
    },

    /// The data directory could not be opened.
    #[error("storage error: {source}")]
    Storage {
        /// The underlying store error.
        #[from]
        source: simarena_store::StoreError,
    },

    /// The HTTP client for the completion API could not be built.
    #[error("LLM client error: {message}")]
    LlmClient {
        /// Description of the client failure.
        message: String,
    },

    /// Prompt templates failed to load.
    #[error("prompt template error: {source}")]
    Prompt {
        /// The underlying template error.
        #[from]
        source: simarena_core::context::PromptError,
    },

    /// The API server failed to bind or serve.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: simarena_observer::ServerError,
    },
}
